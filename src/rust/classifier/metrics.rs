use std::fmt;

use serde::Serialize;

use super::error::ClassifierError;

/// Fraction of predictions equal to the true label. Empty input scores 0.
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f32, ClassifierError> {
    check_lengths(y_true, y_pred)?;
    if y_true.is_empty() {
        return Ok(0.0);
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f32 / y_true.len() as f32)
}

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: usize,
}

/// Per-class report over a fixed label range.
///
/// Every label passed to [`ClassificationReport::new`] gets a row, even if it
/// never occurs in `y_true` or `y_pred`; undefined ratios are reported as 0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f32,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn new<S: AsRef<str>>(
        y_true: &[usize],
        y_pred: &[usize],
        labels: &[S],
    ) -> Result<Self, ClassifierError> {
        check_lengths(y_true, y_pred)?;
        let num_classes = labels.len();
        if let Some(&bad) = y_true.iter().chain(y_pred).find(|&&c| c >= num_classes) {
            return Err(ClassifierError::UnknownIndex { index: bad, num_classes });
        }

        let mut true_pos = vec![0usize; num_classes];
        let mut predicted = vec![0usize; num_classes];
        let mut support = vec![0usize; num_classes];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            support[t] += 1;
            predicted[p] += 1;
            if t == p {
                true_pos[t] += 1;
            }
        }

        let classes: Vec<ClassMetrics> = labels
            .iter()
            .enumerate()
            .map(|(i, label)| {
                let precision = safe_div(true_pos[i], predicted[i]);
                let recall = safe_div(true_pos[i], support[i]);
                ClassMetrics {
                    label: label.as_ref().to_string(),
                    precision,
                    recall,
                    f1: f1_score(precision, recall),
                    support: support[i],
                }
            })
            .collect();

        let total_support: usize = support.iter().sum();
        let macro_avg = average(&classes, "macro avg", |_| 1.0, num_classes as f32, total_support);
        let weighted_avg = average(
            &classes,
            "weighted avg",
            |m| m.support as f32,
            total_support as f32,
            total_support,
        );

        Ok(Self {
            classes,
            accuracy: accuracy(y_true, y_pred)?,
            macro_avg,
            weighted_avg,
        })
    }

    pub fn class(&self, label: &str) -> Option<&ClassMetrics> {
        self.classes.iter().find(|m| m.label == label)
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|m| m.label.len())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or(0);

        writeln!(f, "{:>width$} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        writeln!(f)?;
        for m in &self.classes {
            write_row(f, m, width)?;
        }
        writeln!(f)?;
        let total = self.weighted_avg.support;
        writeln!(f, "{:>width$} {:>9} {:>9} {:>9.2} {:>9}", "accuracy", "", "", self.accuracy, total)?;
        write_row(f, &self.macro_avg, width)?;
        write_row(f, &self.weighted_avg, width)
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, m: &ClassMetrics, width: usize) -> fmt::Result {
    writeln!(
        f,
        "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
        m.label, m.precision, m.recall, m.f1, m.support
    )
}

fn average(
    classes: &[ClassMetrics],
    label: &str,
    weight: impl Fn(&ClassMetrics) -> f32,
    denominator: f32,
    support: usize,
) -> ClassMetrics {
    let mean = |field: fn(&ClassMetrics) -> f32| {
        if denominator > 0.0 {
            classes.iter().map(|m| field(m) * weight(m)).sum::<f32>() / denominator
        } else {
            0.0
        }
    };
    ClassMetrics {
        label: label.to_string(),
        precision: mean(|m| m.precision),
        recall: mean(|m| m.recall),
        f1: mean(|m| m.f1),
        support,
    }
}

fn safe_div(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}

fn f1_score(precision: f32, recall: f32) -> f32 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

fn check_lengths(y_true: &[usize], y_pred: &[usize]) -> Result<(), ClassifierError> {
    if y_true.len() != y_pred.len() {
        return Err(ClassifierError::ValidationError(format!(
            "y_true has {} entries but y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    Ok(())
}
