use std::path::{Path, PathBuf};

use crate::classifier::LogisticRegressionConfig;
use crate::dataset::CorpusFields;

pub const CLASSIFIER_FILE: &str = "topic_classifier.json";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.state.json";
pub const LABELS_EXPORT_FILE: &str = "label_encoder.json";

/// Locations of the persisted training artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub classifier: PathBuf,
    pub label_encoder: PathBuf,
    /// Where the label list is exported for the front-end on load; `None` disables it
    pub labels_export: Option<PathBuf>,
}

impl ArtifactPaths {
    /// Standard file names inside `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            classifier: dir.join(CLASSIFIER_FILE),
            label_encoder: dir.join(LABEL_ENCODER_FILE),
            labels_export: Some(dir.join(LABELS_EXPORT_FILE)),
            dir,
        }
    }

    pub fn with_labels_export(mut self, path: Option<PathBuf>) -> Self {
        self.labels_export = path;
        self
    }
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::new("weights")
    }
}

/// Settings for a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    /// Fraction of the corpus held out for validation, in `[0, 1)`
    pub test_size: f32,
    /// Seed for the train/validation shuffle
    pub seed: u64,
    /// Texts per embedding call
    pub batch_size: usize,
    /// Record keys read by [`Trainer::run_from_path`](crate::Trainer::run_from_path)
    pub fields: CorpusFields,
    pub logistic: LogisticRegressionConfig,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            seed: 42,
            batch_size: 32,
            fields: CorpusFields::default(),
            logistic: LogisticRegressionConfig::default(),
        }
    }
}

impl TrainConfig {
    pub fn with_test_size(mut self, test_size: f32) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_fields(mut self, fields: CorpusFields) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_logistic(mut self, logistic: LogisticRegressionConfig) -> Self {
        self.logistic = logistic;
        self
    }
}

/// Listen address of the predictor service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 6000,
        }
    }
}

impl ServeConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
