use ndarray::Array1;
use sha2::{Digest, Sha256};

use super::utils::normalize_vector;
use super::{Embedder, EmbeddingIdentity};
use crate::classifier::ClassifierError;

/// Feature-hashed bag-of-words embedder.
///
/// Each lowercase word (and each adjacent word pair) is hashed with SHA-256
/// into one of `dimension` buckets with a ±1 sign, and the resulting vector
/// is L2-normalised. Output depends only on the text, so it is stable across
/// processes and platforms and needs no model download.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub const DEFAULT_DIMENSION: usize = 512;

    pub fn new(dimension: usize) -> Result<Self, ClassifierError> {
        if dimension == 0 {
            return Err(ClassifierError::ValidationError(
                "Hashing embedder dimension must be at least 1".into(),
            ));
        }
        Ok(Self { dimension })
    }

    fn accumulate(&self, vector: &mut Array1<f32>, feature: &str) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&digest[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[bucket] += sign;
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self { dimension: Self::DEFAULT_DIMENSION }
    }
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|w| w.trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

impl Embedder for HashingEmbedder {
    fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity {
            model_id: format!("hashing-bow-{}", self.dimension),
            dimension: self.dimension,
        }
    }

    fn embed(&self, text: &str) -> Result<Array1<f32>, ClassifierError> {
        if text.trim().is_empty() {
            return Err(ClassifierError::ValidationError("Input text cannot be empty".into()));
        }
        let tokens = words(text);
        let mut vector = Array1::<f32>::zeros(self.dimension);
        for token in &tokens {
            self.accumulate(&mut vector, token);
        }
        for pair in tokens.windows(2) {
            self.accumulate(&mut vector, &format!("{} {}", pair[0], pair[1]));
        }
        Ok(normalize_vector(&vector))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(128).unwrap();
        let a = embedder.embed("I feel anxious at work").unwrap();
        let b = embedder.embed("I feel anxious at work").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 128);
        assert!((a.dot(&a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let embedder = HashingEmbedder::default();
        assert_eq!(
            embedder.embed("Can't SLEEP at night!").unwrap(),
            embedder.embed("can't sleep at night").unwrap()
        );
    }

    #[test]
    fn test_shared_words_are_closer() {
        let embedder = HashingEmbedder::default();
        let work = embedder.embed("anxious about work").unwrap();
        let job = embedder.embed("anxious about my job at work").unwrap();
        let sleep = embedder.embed("cannot fall asleep").unwrap();
        assert!(work.dot(&job) > work.dot(&sleep));
    }

    #[test]
    fn test_empty_text_rejected() {
        let embedder = HashingEmbedder::default();
        assert!(embedder.embed("").is_err());
        assert!(embedder.embed("   ").is_err());
        assert!(HashingEmbedder::new(0).is_err());
    }

    #[test]
    fn test_identity() {
        let identity = HashingEmbedder::new(64).unwrap().identity();
        assert_eq!(identity.model_id, "hashing-bow-64");
        assert_eq!(identity.dimension, 64);
    }
}
