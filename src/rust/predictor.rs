use std::sync::Arc;

use log::{debug, info};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::artifacts::{self, ArtifactError};
use crate::classifier::{argmax, ClassifierError, LabelEncoder, LogisticRegression};
use crate::config::ArtifactPaths;
use crate::embedding::{Embedder, EmbeddingIdentity};

pub const DEFAULT_TOP_K: usize = 5;

/// A topic label and the probability the classifier assigns to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicPrediction {
    pub topic: String,
    pub confidence: f32,
}

/// Embedder, fitted classifier and label encoder bundled for inference.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug)]
pub struct TopicPredictor {
    embedder: Arc<dyn Embedder>,
    model: LogisticRegression,
    encoder: LabelEncoder,
}

impl TopicPredictor {
    /// # Errors
    /// * `DimensionMismatch` if the classifier and encoder disagree on the
    ///   number of classes, or the classifier and embedder on the vector width
    pub fn new(
        embedder: Arc<dyn Embedder>,
        model: LogisticRegression,
        encoder: LabelEncoder,
    ) -> Result<Self, ClassifierError> {
        model.validate()?;
        if model.num_classes() != encoder.len() {
            return Err(ClassifierError::DimensionMismatch {
                expected: encoder.len(),
                actual: model.num_classes(),
            });
        }
        let dimension = embedder.identity().dimension;
        if model.num_features() != dimension {
            return Err(ClassifierError::DimensionMismatch {
                expected: dimension,
                actual: model.num_features(),
            });
        }
        Ok(Self { embedder, model, encoder })
    }

    /// Loads the persisted artifacts, checks them against `embedder` and
    /// exports the label list when `paths.labels_export` is set.
    pub fn from_artifacts(embedder: Arc<dyn Embedder>, paths: &ArtifactPaths) -> Result<Self, ArtifactError> {
        let artifact = artifacts::load_classifier(&paths.classifier)?;
        let encoder = artifacts::load_label_encoder(&paths.label_encoder)?;
        artifact.ensure_compatible(&embedder.identity(), &encoder)?;

        if let Some(export) = &paths.labels_export {
            artifacts::export_labels(export, &encoder)?;
        }
        info!(
            "Loaded classifier with {} topics (trained on {}, {} iterations)",
            encoder.len(),
            artifact.metadata.embedding,
            artifact.metadata.fit.iterations
        );
        Ok(Self::new(embedder, artifact.model, encoder)?)
    }

    pub fn labels(&self) -> &[String] {
        self.encoder.classes()
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    pub fn embedding_identity(&self) -> EmbeddingIdentity {
        self.embedder.identity()
    }

    /// Full probability distribution over every label, in label-index order.
    pub fn predict_proba(&self, text: &str) -> Result<Array1<f32>, ClassifierError> {
        check_text(text)?;
        let embedding = self.embedder.embed(text)?;
        let probabilities = self.model.predict_proba_one(embedding.view())?;
        check_finite(probabilities.iter())?;
        Ok(probabilities)
    }

    /// One distribution row per text.
    pub fn predict_proba_batch(&self, texts: &[&str]) -> Result<Array2<f32>, ClassifierError> {
        for text in texts {
            check_text(text)?;
        }
        let embeddings = self.embedder.embed_batch(texts)?;
        let probabilities = self.model.predict_proba(embeddings.view())?;
        check_finite(probabilities.iter())?;
        Ok(probabilities)
    }

    /// The `top_k` most probable topics, most probable first.
    ///
    /// Equal probabilities are ordered by label index. A `top_k` above the
    /// number of labels returns every label.
    ///
    /// # Errors
    /// * `ValidationError` for blank text or a `top_k` of zero
    /// * `PredictionError` if the embedding yields a non-finite distribution
    pub fn predict(&self, text: &str, top_k: usize) -> Result<Vec<TopicPrediction>, ClassifierError> {
        if top_k == 0 {
            return Err(ClassifierError::ValidationError("top_k must be at least 1".into()));
        }
        let probabilities = self.predict_proba(text)?;

        let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(top_k);

        let predictions = ranked
            .into_iter()
            .map(|(index, confidence)| {
                Ok(TopicPrediction {
                    topic: self.encoder.decode(index)?.to_string(),
                    confidence,
                })
            })
            .collect::<Result<Vec<_>, ClassifierError>>()?;
        debug!("Predicted {} topics for {} chars of text", predictions.len(), text.len());
        Ok(predictions)
    }

    /// The single most probable topic.
    pub fn predict_topic(&self, text: &str) -> Result<String, ClassifierError> {
        let probabilities = self.predict_proba(text)?;
        Ok(self.encoder.decode(argmax(probabilities.view()))?.to_string())
    }
}

fn check_text(text: &str) -> Result<(), ClassifierError> {
    if text.trim().is_empty() {
        return Err(ClassifierError::ValidationError("Input text cannot be empty".into()));
    }
    Ok(())
}

fn check_finite<'a>(mut values: impl Iterator<Item = &'a f32>) -> Result<(), ClassifierError> {
    if values.all(|p| p.is_finite()) {
        Ok(())
    } else {
        Err(ClassifierError::PredictionError(
            "Classifier produced a non-finite probability; the embedding is likely corrupt".into(),
        ))
    }
}
