use ndarray::{Array1, Array2, ArrayView1, ArrayView2, ArrayViewMut1, Axis};
use serde::{Deserialize, Serialize};
use log::{debug, info, warn};

use super::error::ClassifierError;

/// How training samples are weighted in the loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample has weight 1
    Uniform,
    /// `n_samples / (n_classes * count(class))`, offsetting label-frequency skew
    #[default]
    Balanced,
}

/// Hyper-parameters for [`LogisticRegression::fit`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegressionConfig {
    /// Inverse L2 regularisation strength
    pub c: f32,
    /// Hard cap on gradient-descent iterations
    pub max_iter: usize,
    /// Stop once the largest absolute gradient component falls below this
    pub tol: f32,
    pub learning_rate: f32,
    pub class_weight: ClassWeight,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            learning_rate: 1.0,
            class_weight: ClassWeight::Balanced,
        }
    }
}

impl LogisticRegressionConfig {
    pub fn with_c(mut self, c: f32) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_tol(mut self, tol: f32) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f32) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(ClassifierError::ValidationError(format!("C must be positive, got {}", self.c)));
        }
        if self.max_iter == 0 {
            return Err(ClassifierError::ValidationError("max_iter must be at least 1".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(ClassifierError::ValidationError(
                format!("Learning rate must be positive, got {}", self.learning_rate)
            ));
        }
        Ok(())
    }
}

/// Outcome of the optimisation loop, stored alongside the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitSummary {
    pub iterations: usize,
    pub converged: bool,
    pub final_loss: f32,
}

/// Multinomial (softmax) logistic regression with an L2 penalty.
///
/// Minimises the sample-weighted mean cross-entropy plus
/// `||W||² / (2 · C · Σw)` by full-batch gradient descent starting from zero
/// weights, so fitting is deterministic for a given input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Shape `[num_classes, num_features]`
    weights: Array2<f32>,
    bias: Array1<f32>,
    fit_summary: FitSummary,
}

impl LogisticRegression {
    /// Fits the classifier on row-major features `x` and class indices `y`.
    ///
    /// `num_classes` may exceed the number of classes present in `y`; absent
    /// classes keep a row in the weight matrix and are pushed towards zero
    /// probability by the bias gradient.
    ///
    /// # Errors
    /// * `ValidationError` for empty input, mismatched lengths, out-of-range
    ///   labels, non-finite features or invalid hyper-parameters
    /// * `TrainingError` if fewer than two classes are present or the loss diverges
    pub fn fit(
        x: ArrayView2<f32>,
        y: &[usize],
        num_classes: usize,
        config: &LogisticRegressionConfig,
    ) -> Result<Self, ClassifierError> {
        config.validate()?;
        let (n_samples, n_features) = x.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(ClassifierError::ValidationError("Training matrix cannot be empty".into()));
        }
        if y.len() != n_samples {
            return Err(ClassifierError::ValidationError(format!(
                "Got {} samples but {} labels", n_samples, y.len()
            )));
        }
        if let Some(&bad) = y.iter().find(|&&c| c >= num_classes) {
            return Err(ClassifierError::UnknownIndex { index: bad, num_classes });
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ClassifierError::ValidationError("Training features contain NaN or Inf".into()));
        }

        let counts = class_counts(y, num_classes);
        let present = counts.iter().filter(|&&c| c > 0).count();
        if present < 2 {
            return Err(ClassifierError::TrainingError(format!(
                "Need samples from at least 2 classes, found {}", present
            )));
        }

        let sample_weights = sample_weights(y, &counts, present, config.class_weight);
        let total_weight = sample_weights.sum();
        let reg = 1.0 / (config.c * total_weight);

        let mut targets = Array2::<f32>::zeros((n_samples, num_classes));
        for (i, &c) in y.iter().enumerate() {
            targets[[i, c]] = 1.0;
        }

        let mut weights = Array2::<f32>::zeros((num_classes, n_features));
        let mut bias = Array1::<f32>::zeros(num_classes);
        let column_weights = sample_weights.view().insert_axis(Axis(1));

        info!(
            "Fitting logistic regression: {} samples, {} features, {} classes ({} present)",
            n_samples, n_features, num_classes, present
        );

        let mut iterations = 0;
        let mut converged = false;
        while iterations < config.max_iter {
            iterations += 1;

            let mut residual = softmax_rows(x.dot(&weights.t()) + &bias) - &targets;
            residual *= &column_weights;
            residual /= total_weight;

            let grad_w = residual.t().dot(&x) + &(&weights * reg);
            let grad_b = residual.sum_axis(Axis(0));

            let max_grad = grad_w
                .iter()
                .chain(grad_b.iter())
                .fold(0.0f32, |m, g| m.max(g.abs()));
            if !max_grad.is_finite() {
                return Err(ClassifierError::TrainingError(
                    format!("Gradient diverged at iteration {}", iterations)
                ));
            }
            if max_grad < config.tol {
                converged = true;
                break;
            }

            weights.scaled_add(-config.learning_rate, &grad_w);
            bias.scaled_add(-config.learning_rate, &grad_b);

            if iterations % 100 == 0 {
                debug!("Iteration {}: max |gradient| = {:.6}", iterations, max_grad);
            }
        }

        let final_loss = objective(x, &targets, &sample_weights, &weights, &bias, reg);
        if !final_loss.is_finite() {
            return Err(ClassifierError::TrainingError("Loss is not finite after fitting".into()));
        }
        if converged {
            info!("Converged after {} iterations (loss {:.4})", iterations, final_loss);
        } else {
            warn!(
                "Did not converge within {} iterations (loss {:.4}); consider raising max_iter",
                config.max_iter, final_loss
            );
        }

        Ok(Self {
            weights,
            bias,
            fit_summary: FitSummary { iterations, converged, final_loss },
        })
    }

    pub fn num_classes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.weights.ncols()
    }

    pub fn fit_summary(&self) -> &FitSummary {
        &self.fit_summary
    }

    /// Checks that the weight matrix and bias agree; used after deserialising.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.bias.len() != self.weights.nrows() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.weights.nrows(),
                actual: self.bias.len(),
            });
        }
        if self.weights.is_empty() {
            return Err(ClassifierError::ModelError("Classifier has no weights".into()));
        }
        Ok(())
    }

    /// Probability distribution over all classes for a single feature vector.
    pub fn predict_proba_one(&self, x: ArrayView1<f32>) -> Result<Array1<f32>, ClassifierError> {
        self.check_width(x.len())?;
        let mut logits = self.weights.dot(&x) + &self.bias;
        softmax_in_place(logits.view_mut());
        Ok(logits)
    }

    /// Row-wise probability distributions, shape `[n_samples, num_classes]`.
    pub fn predict_proba(&self, x: ArrayView2<f32>) -> Result<Array2<f32>, ClassifierError> {
        self.check_width(x.ncols())?;
        Ok(softmax_rows(x.dot(&self.weights.t()) + &self.bias))
    }

    /// Most probable class index for each row.
    pub fn predict(&self, x: ArrayView2<f32>) -> Result<Vec<usize>, ClassifierError> {
        let probas = self.predict_proba(x)?;
        Ok(probas.rows().into_iter().map(argmax).collect())
    }

    fn check_width(&self, width: usize) -> Result<(), ClassifierError> {
        if width != self.num_features() {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.num_features(),
                actual: width,
            });
        }
        Ok(())
    }
}

fn class_counts(y: &[usize], num_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; num_classes];
    for &c in y {
        counts[c] += 1;
    }
    counts
}

fn sample_weights(y: &[usize], counts: &[usize], present: usize, mode: ClassWeight) -> Array1<f32> {
    match mode {
        ClassWeight::Uniform => Array1::ones(y.len()),
        ClassWeight::Balanced => {
            let n = y.len() as f32;
            y.iter()
                .map(|&c| n / (present as f32 * counts[c] as f32))
                .collect()
        }
    }
}

fn objective(
    x: ArrayView2<f32>,
    targets: &Array2<f32>,
    sample_weights: &Array1<f32>,
    weights: &Array2<f32>,
    bias: &Array1<f32>,
    reg: f32,
) -> f32 {
    let probas = softmax_rows(x.dot(&weights.t()) + bias);
    let total_weight = sample_weights.sum();
    let cross_entropy: f32 = probas
        .rows()
        .into_iter()
        .zip(targets.rows())
        .zip(sample_weights.iter())
        .map(|((p, t), &w)| {
            let p_true: f32 = p.dot(&t);
            -w * p_true.max(f32::MIN_POSITIVE).ln()
        })
        .sum();
    cross_entropy / total_weight + 0.5 * reg * weights.iter().map(|v| v * v).sum::<f32>()
}

pub(crate) fn softmax_in_place(mut row: ArrayViewMut1<f32>) {
    let max = row.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    row.mapv_inplace(|v| (v - max).exp());
    let sum = row.sum();
    if sum > 0.0 {
        row /= sum;
    }
}

fn softmax_rows(mut logits: Array2<f32>) -> Array2<f32> {
    for row in logits.rows_mut() {
        softmax_in_place(row);
    }
    logits
}

pub(crate) fn argmax(row: ArrayView1<f32>) -> usize {
    row.iter()
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn toy_data() -> (Array2<f32>, Vec<usize>) {
        let x = array![
            [1.0, 0.0, 0.0],
            [0.9, 0.1, 0.0],
            [0.8, 0.0, 0.2],
            [0.0, 1.0, 0.0],
            [0.1, 0.9, 0.0],
            [0.0, 0.0, 1.0],
        ];
        (x, vec![0, 0, 0, 1, 1, 2])
    }

    #[test]
    fn test_fit_separable_data() {
        let (x, y) = toy_data();
        let config = LogisticRegressionConfig::default().with_max_iter(2000);
        let model = LogisticRegression::fit(x.view(), &y, 3, &config).unwrap();
        assert_eq!(model.num_classes(), 3);
        assert_eq!(model.num_features(), 3);
        assert_eq!(model.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let (x, y) = toy_data();
        let model = LogisticRegression::fit(x.view(), &y, 3, &LogisticRegressionConfig::default()).unwrap();
        let probas = model.predict_proba(x.view()).unwrap();
        for row in probas.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
            assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
        }
        let single = model.predict_proba_one(x.row(0)).unwrap();
        assert!((single.sum() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_class_absent_from_training_gets_low_mass() {
        let (x, y) = toy_data();
        let model = LogisticRegression::fit(x.view(), &y, 4, &LogisticRegressionConfig::default()).unwrap();
        let probas = model.predict_proba_one(x.row(0)).unwrap();
        assert_eq!(probas.len(), 4);
        assert!(probas[0] > probas[3]);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = toy_data();
        let config = LogisticRegressionConfig::default().with_max_iter(50);
        let a = LogisticRegression::fit(x.view(), &y, 3, &config).unwrap();
        let b = LogisticRegression::fit(x.view(), &y, 3, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_balanced_weights() {
        let y = vec![0, 0, 0, 1];
        let counts = class_counts(&y, 2);
        let weights = sample_weights(&y, &counts, 2, ClassWeight::Balanced);
        assert!((weights[0] - 4.0 / 6.0).abs() < 1e-6);
        assert!((weights[3] - 2.0).abs() < 1e-6);
        assert!((weights.sum() - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_single_class_is_rejected() {
        let x = array![[1.0, 0.0], [0.9, 0.1]];
        let result = LogisticRegression::fit(x.view(), &[0, 0], 2, &LogisticRegressionConfig::default());
        assert!(matches!(result, Err(ClassifierError::TrainingError(_))));
    }

    #[test]
    fn test_dimension_mismatch() {
        let (x, y) = toy_data();
        let model = LogisticRegression::fit(x.view(), &y, 3, &LogisticRegressionConfig::default()).unwrap();
        let wrong = array![1.0, 0.0];
        assert!(matches!(
            model.predict_proba_one(wrong.view()),
            Err(ClassifierError::DimensionMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn test_invalid_config() {
        let (x, y) = toy_data();
        let config = LogisticRegressionConfig::default().with_c(0.0);
        assert!(matches!(
            LogisticRegression::fit(x.view(), &y, 3, &config),
            Err(ClassifierError::ValidationError(_))
        ));
    }

    #[test]
    fn test_argmax_prefers_lower_index_on_ties() {
        let row = array![0.25, 0.5, 0.5, 0.0];
        assert_eq!(argmax(row.view()), 1);
    }
}
