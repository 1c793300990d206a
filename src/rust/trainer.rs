use std::path::Path;
use std::sync::Arc;

use log::{info, warn};
use serde::Serialize;

use crate::artifacts::{self, ArtifactError, ClassifierArtifact};
use crate::classifier::{argmax, ClassificationReport, ClassifierError, FitSummary, LabelEncoder, LogisticRegression};
use crate::config::{ArtifactPaths, TrainConfig};
use crate::dataset::{Corpus, DatasetError};
use crate::embedding::{embed_all, Embedder, EmbeddingIdentity};
use crate::predictor::TopicPredictor;

#[derive(Debug, thiserror::Error)]
pub enum TrainerError {
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

/// Summary of a training run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub embedding: EmbeddingIdentity,
    pub labels: Vec<String>,
    pub num_train: usize,
    pub num_validation: usize,
    pub fit: FitSummary,
    /// `None` when the validation split is empty
    pub evaluation: Option<ClassificationReport>,
}

/// A fitted classifier that has not been persisted yet.
#[derive(Debug)]
pub struct TrainedModel {
    pub model: LogisticRegression,
    pub encoder: LabelEncoder,
    pub report: TrainingReport,
    pub validation: Corpus,
}

/// Fits the topic classifier on embeddings produced by one embedder.
#[derive(Debug)]
pub struct Trainer {
    embedder: Arc<dyn Embedder>,
    config: TrainConfig,
}

impl Trainer {
    pub fn new(embedder: Arc<dyn Embedder>, config: TrainConfig) -> Self {
        Self { embedder, config }
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Splits, embeds, fits and evaluates. Nothing is written to disk.
    pub fn fit(&self, corpus: &Corpus) -> Result<TrainedModel, ClassifierError> {
        if corpus.is_empty() {
            return Err(ClassifierError::ValidationError("Training corpus is empty".into()));
        }
        let (train, validation) = corpus.train_test_split(self.config.test_size, self.config.seed)?;
        info!("Split {} examples into {} train / {} validation", corpus.len(), train.len(), validation.len());

        let encoder = LabelEncoder::fit(corpus.topics())?;
        info!("Found {} topics", encoder.len());

        info!("Embedding training texts with {}", self.embedder.identity());
        let x_train = embed_all(self.embedder.as_ref(), &train.texts(), self.config.batch_size)?;
        let y_train = encoder.transform(&train.topics())?;

        info!("Fitting logistic regression on {} examples", train.len());
        let model = LogisticRegression::fit(x_train.view(), &y_train, encoder.len(), &self.config.logistic)?;

        let evaluation = if validation.is_empty() {
            warn!("Validation split is empty; skipping evaluation");
            None
        } else {
            let x_val = embed_all(self.embedder.as_ref(), &validation.texts(), self.config.batch_size)?;
            let y_val = encoder.transform(&validation.topics())?;
            let y_pred = model.predict(x_val.view())?;
            let report = ClassificationReport::new(&y_val, &y_pred, encoder.classes())?;
            info!("Validation accuracy: {:.4}", report.accuracy);
            info!("Classification report:\n{}", report);
            Some(report)
        };

        let report = TrainingReport {
            embedding: self.embedder.identity(),
            labels: encoder.classes().to_vec(),
            num_train: train.len(),
            num_validation: validation.len(),
            fit: model.fit_summary().clone(),
            evaluation,
        };
        Ok(TrainedModel { model, encoder, report, validation })
    }

    /// Loads the corpus at `path` with the configured field names, then [`run`](Self::run)s.
    pub fn run_from_path(&self, path: &Path, paths: &ArtifactPaths) -> Result<TrainingReport, TrainerError> {
        let corpus = Corpus::load(path, &self.config.fields)?;
        self.run(&corpus, paths)
    }

    /// Fits, saves the artifacts and runs a sample prediction on the first
    /// validation example.
    pub fn run(&self, corpus: &Corpus, paths: &ArtifactPaths) -> Result<TrainingReport, TrainerError> {
        let TrainedModel { model, encoder, report, validation } = self.fit(corpus)?;

        let artifact = ClassifierArtifact::new(model.clone(), self.embedder.identity());
        artifacts::save_artifacts(paths, &artifact, &encoder)?;

        if let Some(sample) = validation.examples().first() {
            let predictor = TopicPredictor::new(self.embedder.clone(), model, encoder)?;
            let predicted = predictor.predict_topic(&sample.text)?;
            info!("Sample question: {}", sample.text);
            info!("Predicted topic: {} (actual: {})", predicted, sample.topic);
        }
        Ok(report)
    }
}

/// Scores `predictor` on a labeled corpus.
///
/// # Errors
/// * `UnknownLabel` if the corpus contains a topic the predictor was not trained on
pub fn evaluate(
    predictor: &TopicPredictor,
    corpus: &Corpus,
    batch_size: usize,
) -> Result<ClassificationReport, ClassifierError> {
    if batch_size == 0 {
        return Err(ClassifierError::ValidationError("Batch size must be at least 1".into()));
    }
    let y_true = predictor.encoder().transform(&corpus.topics())?;
    let texts = corpus.texts();
    let mut y_pred = Vec::with_capacity(texts.len());
    for chunk in texts.chunks(batch_size) {
        let probabilities = predictor.predict_proba_batch(chunk)?;
        y_pred.extend(probabilities.rows().into_iter().map(argmax));
    }
    ClassificationReport::new(&y_true, &y_pred, predictor.labels())
}
