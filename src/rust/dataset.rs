use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::classifier::ClassifierError;

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Invalid JSON in {path:?} at line {line}: {source}")]
    Json {
        path: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[error("Expected a JSON array of objects in {0:?}")]
    NotAnArray(PathBuf),
}

/// One labeled question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub topic: String,
}

impl TrainingExample {
    /// Surrounding whitespace is stripped from the topic so that
    /// `"anxiety "` and `"anxiety"` name the same label.
    pub fn new(text: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            topic: topic.into().trim().to_string(),
        }
    }
}

/// Names of the text and label fields in raw records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFields {
    pub text_field: String,
    pub label_field: String,
}

impl Default for CorpusFields {
    fn default() -> Self {
        Self {
            text_field: "questionText".to_string(),
            label_field: "topic".to_string(),
        }
    }
}

/// Labeled training corpus. Examples always have non-blank text and topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    examples: Vec<TrainingExample>,
}

impl Corpus {
    /// Builds a corpus, trimming topics and dropping examples whose text or
    /// topic is blank.
    pub fn new(examples: impl IntoIterator<Item = TrainingExample>) -> Self {
        Self {
            examples: examples
                .into_iter()
                .map(|e| TrainingExample::new(e.text, e.topic))
                .filter(|e| !e.text.trim().is_empty() && !e.topic.is_empty())
                .collect(),
        }
    }

    /// Extracts examples from raw JSON records. Records with a missing, null,
    /// non-string or blank text (or topic) are skipped; returns the corpus
    /// and the number of skipped records.
    pub fn from_records(records: impl IntoIterator<Item = Value>, fields: &CorpusFields) -> (Self, usize) {
        let mut examples = Vec::new();
        let mut dropped = 0;
        for record in records {
            let text = record.get(&fields.text_field).and_then(Value::as_str);
            let topic = record.get(&fields.label_field).and_then(Value::as_str);
            match (text, topic) {
                (Some(text), Some(topic)) if !text.trim().is_empty() && !topic.trim().is_empty() => {
                    examples.push(TrainingExample::new(text, topic));
                }
                _ => dropped += 1,
            }
        }
        (Self { examples }, dropped)
    }

    /// Loads a `.json` array of objects or a JSON Lines file (any other extension).
    pub fn load(path: impl AsRef<Path>, fields: &CorpusFields) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| DatasetError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json_array = path.extension().and_then(|e| e.to_str()) == Some("json");
        let records: Vec<Value> = if is_json_array {
            match serde_json::from_str(&content).map_err(|source| DatasetError::Json {
                path: path.to_path_buf(),
                line: source.line(),
                source,
            })? {
                Value::Array(items) => items,
                _ => return Err(DatasetError::NotAnArray(path.to_path_buf())),
            }
        } else {
            content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(i, line)| {
                    serde_json::from_str(line).map_err(|source| DatasetError::Json {
                        path: path.to_path_buf(),
                        line: i + 1,
                        source,
                    })
                })
                .collect::<Result<_, _>>()?
        };

        let total = records.len();
        let (corpus, dropped) = Self::from_records(records, fields);
        if dropped > 0 {
            warn!("Dropped {} of {} records with missing '{}' or '{}'", dropped, total, fields.text_field, fields.label_field);
        }
        info!("Loaded {} examples from {:?}", corpus.len(), path);
        Ok(corpus)
    }

    pub fn examples(&self) -> &[TrainingExample] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.text.as_str()).collect()
    }

    pub fn topics(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.topic.as_str()).collect()
    }

    /// Shuffles with `seed` and holds out `ceil(len * test_size)` examples.
    ///
    /// # Errors
    /// * `ValidationError` if `test_size` is outside `[0, 1)` or the split
    ///   would leave no training examples
    pub fn train_test_split(&self, test_size: f32, seed: u64) -> Result<(Corpus, Corpus), ClassifierError> {
        if !(0.0..1.0).contains(&test_size) {
            return Err(ClassifierError::ValidationError(format!(
                "test_size must be in [0, 1), got {}", test_size
            )));
        }
        let n = self.examples.len();
        let n_test = (n as f32 * test_size).ceil() as usize;
        if n_test >= n {
            return Err(ClassifierError::ValidationError(format!(
                "Corpus of {} examples is too small for test_size {}", n, test_size
            )));
        }

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(seed));
        let (test_idx, train_idx) = indices.split_at(n_test);
        let pick = |idx: &[usize]| Corpus {
            examples: idx.iter().map(|&i| self.examples[i].clone()).collect(),
        };
        Ok((pick(train_idx), pick(test_idx)))
    }
}
