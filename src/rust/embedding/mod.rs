//! Text embedding backends.
//!
//! An [`Embedder`] turns text into a fixed-size, L2-normalised vector. The
//! classifier is only meaningful together with the exact embedder it was
//! trained on, so every embedder reports an [`EmbeddingIdentity`] that is
//! stored in the classifier artifact and checked again at load time.

mod hashing;
mod onnx;
pub(crate) mod utils;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use log::info;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierError;
use crate::model_manager::ModelManager;
use crate::models::BuiltinModel;
use crate::runtime::RuntimeConfig;

pub use hashing::HashingEmbedder;
pub use onnx::OnnxEmbedder;

/// Which embedding model produced a vector, and how wide it is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EmbeddingIdentity {
    pub model_id: String,
    pub dimension: usize,
}

impl fmt::Display for EmbeddingIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}d)", self.model_id, self.dimension)
    }
}

/// Deterministic text-to-vector encoder shared read-only across threads.
pub trait Embedder: Send + Sync + fmt::Debug {
    fn identity(&self) -> EmbeddingIdentity;

    fn embed(&self, text: &str) -> Result<Array1<f32>, ClassifierError>;

    /// Embeds several texts at once, one row per text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Array2<f32>, ClassifierError> {
        let dimension = self.identity().dimension;
        let mut matrix = Array2::<f32>::zeros((texts.len(), dimension));
        for (mut row, text) in matrix.rows_mut().into_iter().zip(texts) {
            let embedding = self.embed(text)?;
            if embedding.len() != dimension {
                return Err(ClassifierError::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            row.assign(&embedding);
        }
        Ok(matrix)
    }
}

/// Embeds `texts` in chunks of `batch_size`, logging progress.
pub fn embed_all<S: AsRef<str>>(
    embedder: &dyn Embedder,
    texts: &[S],
    batch_size: usize,
) -> Result<Array2<f32>, ClassifierError> {
    if batch_size == 0 {
        return Err(ClassifierError::ValidationError("Batch size must be at least 1".into()));
    }
    let dimension = embedder.identity().dimension;
    let mut matrix = Array2::<f32>::zeros((texts.len(), dimension));
    let num_batches = texts.len().div_ceil(batch_size);

    for (batch_index, chunk) in texts.chunks(batch_size).enumerate() {
        let batch: Vec<&str> = chunk.iter().map(AsRef::as_ref).collect();
        let embeddings = embedder.embed_batch(&batch)?;
        if embeddings.dim() != (batch.len(), dimension) {
            return Err(ClassifierError::DimensionMismatch {
                expected: dimension,
                actual: embeddings.ncols(),
            });
        }
        let start = batch_index * batch_size;
        matrix
            .slice_mut(ndarray::s![start..start + batch.len(), ..])
            .assign(&embeddings);

        if (batch_index + 1) % 10 == 0 || batch_index + 1 == num_batches {
            info!("Embedded batch {}/{} ({} texts)", batch_index + 1, num_batches, start + batch.len());
        }
    }
    Ok(matrix)
}

/// Selects and configures the embedding backend.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingConfig {
    /// A built-in ONNX model, downloaded into the model cache on first use
    Builtin(BuiltinModel),
    /// An ONNX model and tokenizer on local disk
    Custom {
        model_id: String,
        model_path: PathBuf,
        tokenizer_path: PathBuf,
        max_sequence_length: Option<usize>,
    },
    /// Feature-hashed bag of words; needs no model files
    Hashing { dimension: usize },
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self::Builtin(BuiltinModel::MiniLM)
    }
}

impl EmbeddingConfig {
    /// Builds the embedder, downloading a built-in model when `download` is set.
    pub async fn load(
        &self,
        runtime: &RuntimeConfig,
        manager: &ModelManager,
        download: bool,
    ) -> Result<Arc<dyn Embedder>, ClassifierError> {
        let embedder: Arc<dyn Embedder> = match self {
            Self::Builtin(model) => {
                if download {
                    manager.ensure_model_downloaded(*model).await?;
                } else {
                    manager.require_downloaded(*model)?;
                }
                Arc::new(OnnxEmbedder::from_builtin(*model, manager, runtime)?)
            }
            Self::Custom { model_id, model_path, tokenizer_path, max_sequence_length } => Arc::new(
                OnnxEmbedder::from_files(model_id, model_path, tokenizer_path, *max_sequence_length, runtime)?,
            ),
            Self::Hashing { dimension } => Arc::new(HashingEmbedder::new(*dimension)?),
        };
        info!("Embedding model ready: {}", embedder.identity());
        Ok(embedder)
    }
}
