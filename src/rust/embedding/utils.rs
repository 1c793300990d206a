use ndarray::{Array1, ArrayView2};

pub(crate) fn normalize_vector(vec: &Array1<f32>) -> Array1<f32> {
    let norm: f32 = vec.iter().map(|&x| x * x).sum::<f32>().sqrt();
    if norm > 1e-10 {
        vec / norm
    } else {
        Array1::zeros(vec.len())
    }
}

/// Averages token embeddings whose attention mask is set.
pub(crate) fn mean_pool(token_embeddings: ArrayView2<f32>, attention_mask: &[i64]) -> Array1<f32> {
    let mut sum = Array1::<f32>::zeros(token_embeddings.ncols());
    let mut count = 0usize;
    for (row, &mask) in token_embeddings.rows().into_iter().zip(attention_mask) {
        if mask != 0 {
            sum += &row;
            count += 1;
        }
    }
    if count > 0 {
        sum / count as f32
    } else {
        sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_normalize_vector() {
        let v = normalize_vector(&array![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(normalize_vector(&array![0.0, 0.0]), array![0.0f32, 0.0]);
    }

    #[test]
    fn test_mean_pool_skips_padding() {
        let tokens = array![[1.0, 2.0], [3.0, 4.0], [100.0, 100.0]];
        let pooled = mean_pool(tokens.view(), &[1, 1, 0]);
        assert_eq!(pooled, array![2.0f32, 3.0]);
    }
}
