use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::error::ClassifierError;

/// Bijective mapping between topic labels and dense class indices.
///
/// Classes are kept in sorted order, so fitting the same set of labels always
/// yields the same indices regardless of the order they were observed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "EncoderState", into = "EncoderState")]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

#[derive(Serialize, Deserialize)]
struct EncoderState {
    classes: Vec<String>,
}

impl From<EncoderState> for LabelEncoder {
    fn from(state: EncoderState) -> Self {
        Self::from_classes(state.classes)
    }
}

impl From<LabelEncoder> for EncoderState {
    fn from(encoder: LabelEncoder) -> Self {
        EncoderState { classes: encoder.classes }
    }
}

impl LabelEncoder {
    /// Fits the encoder on every distinct label in `labels`.
    ///
    /// # Errors
    /// * `ValidationError` if no labels are given or a label is empty
    pub fn fit<I, S>(labels: I) -> Result<Self, ClassifierError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut distinct = BTreeSet::new();
        for label in labels {
            let label = label.as_ref();
            if label.is_empty() {
                return Err(ClassifierError::ValidationError("Labels cannot be empty".into()));
            }
            distinct.insert(label.to_string());
        }
        if distinct.is_empty() {
            return Err(ClassifierError::ValidationError(
                "At least one label is required to fit the encoder".into(),
            ));
        }
        Ok(Self::from_classes(distinct.into_iter().collect()))
    }

    fn from_classes(mut classes: Vec<String>) -> Self {
        classes.sort();
        classes.dedup();
        let index = classes
            .iter()
            .enumerate()
            .map(|(i, label)| (label.clone(), i))
            .collect();
        Self { classes, index }
    }

    /// Sorted class labels; position is the class index.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Maps a single label to its class index.
    pub fn encode(&self, label: &str) -> Result<usize, ClassifierError> {
        self.index
            .get(label)
            .copied()
            .ok_or_else(|| ClassifierError::UnknownLabel(label.to_string()))
    }

    /// Maps a single class index back to its label.
    pub fn decode(&self, index: usize) -> Result<&str, ClassifierError> {
        self.classes
            .get(index)
            .map(String::as_str)
            .ok_or(ClassifierError::UnknownIndex {
                index,
                num_classes: self.classes.len(),
            })
    }

    pub fn transform<S: AsRef<str>>(&self, labels: &[S]) -> Result<Vec<usize>, ClassifierError> {
        labels.iter().map(|label| self.encode(label.as_ref())).collect()
    }

    pub fn inverse_transform(&self, indices: &[usize]) -> Result<Vec<String>, ClassifierError> {
        indices
            .iter()
            .map(|&i| self.decode(i).map(str::to_string))
            .collect()
    }
}
