use std::collections::HashMap;
use std::path::Path;

use log::{error, info};
use ndarray::{s, Array1, Array2, Ix2, Ix3};
use ort::session::Session;
use ort::value::Tensor;
use tokenizers::{PaddingParams, Tokenizer, TruncationParams};

use super::utils::{mean_pool, normalize_vector};
use super::{Embedder, EmbeddingIdentity};
use crate::classifier::ClassifierError;
use crate::model_manager::ModelManager;
use crate::models::{BuiltinModel, ModelCharacteristics};
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Sentence encoder backed by an ONNX Runtime session and a HuggingFace tokenizer.
///
/// The ONNX model is expected to:
/// - Accept `input_ids` and `attention_mask` (and optionally `token_type_ids`),
///   each of shape `[batch_size, sequence_length]`
/// - Output token embeddings `[batch_size, sequence_length, embedding_size]`,
///   or already pooled embeddings `[batch_size, embedding_size]`
///
/// Token embeddings are mean-pooled over the attention mask. Input longer
/// than the model's maximum sequence length is truncated.
#[derive(Debug)]
pub struct OnnxEmbedder {
    model_id: String,
    tokenizer: Tokenizer,
    session: Session,
    characteristics: ModelCharacteristics,
    uses_token_type_ids: bool,
}

// Shared across request handlers behind an `Arc`
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<OnnxEmbedder>();
    }
};

impl OnnxEmbedder {
    /// Loads a built-in model that has already been downloaded by `manager`.
    pub fn from_builtin(
        model: BuiltinModel,
        manager: &ModelManager,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        manager.require_downloaded(model)?;
        let model_path = manager.get_model_path(model);
        let tokenizer_path = manager.get_tokenizer_path(model);
        Self::load(
            model.model_id().to_string(),
            &model_path,
            &tokenizer_path,
            Some(model.characteristics()),
            None,
            runtime,
        )
    }

    /// Loads an ONNX model and tokenizer from arbitrary paths.
    ///
    /// The embedding size is inferred by embedding a probe sentence;
    /// `max_sequence_length` defaults to 256 tokens.
    pub fn from_files(
        model_id: &str,
        model_path: &Path,
        tokenizer_path: &Path,
        max_sequence_length: Option<usize>,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        if model_id.trim().is_empty() {
            return Err(ClassifierError::ValidationError("Embedding model id cannot be empty".into()));
        }
        if !model_path.exists() {
            return Err(ClassifierError::ModelError(format!("Model file not found: {:?}", model_path)));
        }
        if !tokenizer_path.exists() {
            return Err(ClassifierError::TokenizerError(format!("Tokenizer file not found: {:?}", tokenizer_path)));
        }
        Self::load(model_id.to_string(), model_path, tokenizer_path, None, max_sequence_length, runtime)
    }

    fn load(
        model_id: String,
        model_path: &Path,
        tokenizer_path: &Path,
        characteristics: Option<ModelCharacteristics>,
        max_sequence_length: Option<usize>,
        runtime: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let max_length = characteristics
            .as_ref()
            .map(|c| c.max_sequence_length)
            .or(max_sequence_length)
            .unwrap_or(256);

        let mut tokenizer = Tokenizer::from_file(tokenizer_path).map_err(|e| {
            error!("Failed to load tokenizer: {}", e);
            ClassifierError::TokenizerError(format!("Failed to load tokenizer: {}", e))
        })?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| ClassifierError::TokenizerError(format!("Invalid truncation settings: {}", e)))?;
        tokenizer.with_padding(Some(PaddingParams::default()));
        info!("Tokenizer loaded from {:?}", tokenizer_path);

        let session = create_session_builder(runtime)?.commit_from_file(model_path)?;
        Self::validate_model(&session)?;
        let uses_token_type_ids = session.inputs.iter().any(|input| input.name == "token_type_ids");
        info!("Model loaded from {:?}", model_path);

        let mut embedder = Self {
            model_id,
            tokenizer,
            session,
            characteristics: ModelCharacteristics {
                embedding_size: 0,
                max_sequence_length: max_length,
                model_size_mb: 0,
            },
            uses_token_type_ids,
        };

        embedder.characteristics = match characteristics {
            Some(known) => known,
            None => {
                let probe = embedder.encode(&["Test input to infer embedding size"])?;
                info!("Inferred embedding size from model: {}", probe.ncols());
                ModelCharacteristics {
                    embedding_size: probe.ncols(),
                    max_sequence_length: max_length,
                    model_size_mb: 0,
                }
            }
        };
        Ok(embedder)
    }

    pub fn characteristics(&self) -> &ModelCharacteristics {
        &self.characteristics
    }

    /// Number of tokens the text occupies after truncation
    pub fn count_tokens(&self, text: &str) -> Result<usize, ClassifierError> {
        self.tokenizer
            .encode(text, true)
            .map(|encoding| encoding.get_ids().len())
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))
    }

    fn validate_model(session: &Session) -> Result<(), ClassifierError> {
        if session.inputs.len() < 2 {
            return Err(ClassifierError::ModelError(format!(
                "Model must have at least 2 inputs (input_ids and attention_mask), found {}",
                session.inputs.len()
            )));
        }
        if session.outputs.is_empty() {
            return Err(ClassifierError::ModelError(
                "Model must have at least 1 output for embeddings".to_string(),
            ));
        }
        Ok(())
    }

    /// Tokenizes, runs the model and pools; rows are L2-normalised.
    fn encode(&self, texts: &[&str]) -> Result<Array2<f32>, ClassifierError> {
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(ClassifierError::ValidationError(format!("Input text {} cannot be empty", pos + 1)));
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| ClassifierError::TokenizerError(e.to_string()))?;
        let batch = encodings.len();
        let seq_len = encodings.iter().map(|e| e.get_ids().len()).max().unwrap_or(0);

        let mut input_ids = Array2::<i64>::zeros((batch, seq_len));
        let mut attention_mask = Array2::<i64>::zeros((batch, seq_len));
        let mut token_type_ids = Array2::<i64>::zeros((batch, seq_len));
        for (i, encoding) in encodings.iter().enumerate() {
            for (j, ((&id, &mask), &type_id)) in encoding
                .get_ids()
                .iter()
                .zip(encoding.get_attention_mask())
                .zip(encoding.get_type_ids())
                .enumerate()
            {
                input_ids[[i, j]] = i64::from(id);
                attention_mask[[i, j]] = i64::from(mask);
                token_type_ids[[i, j]] = i64::from(type_id);
            }
        }

        let mut input_tensors = HashMap::new();
        input_tensors.insert("input_ids", Tensor::from_array(input_ids)?);
        input_tensors.insert("attention_mask", Tensor::from_array(attention_mask.clone())?);
        if self.uses_token_type_ids {
            input_tensors.insert("token_type_ids", Tensor::from_array(token_type_ids)?);
        }

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let output = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let pooled: Vec<Array1<f32>> = match output.ndim() {
            3 => {
                let tokens = output
                    .into_dimensionality::<Ix3>()
                    .map_err(|e| ClassifierError::ModelError(e.to_string()))?;
                (0..batch)
                    .map(|i| {
                        let mask = attention_mask.row(i).to_vec();
                        mean_pool(tokens.slice(s![i, .., ..]), &mask)
                    })
                    .collect()
            }
            2 => {
                let sentences = output
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| ClassifierError::ModelError(e.to_string()))?;
                sentences.rows().into_iter().map(|row| row.to_owned()).collect()
            }
            other => {
                return Err(ClassifierError::ModelError(format!(
                    "Unexpected output rank {} (expected 2 or 3)",
                    other
                )))
            }
        };

        let dimension = pooled.first().map(Array1::len).unwrap_or(0);
        let mut matrix = Array2::<f32>::zeros((batch, dimension));
        for (mut row, embedding) in matrix.rows_mut().into_iter().zip(&pooled) {
            row.assign(&normalize_vector(embedding));
        }
        Ok(matrix)
    }
}

impl Embedder for OnnxEmbedder {
    fn identity(&self) -> EmbeddingIdentity {
        EmbeddingIdentity {
            model_id: self.model_id.clone(),
            dimension: self.characteristics.embedding_size,
        }
    }

    fn embed(&self, text: &str) -> Result<Array1<f32>, ClassifierError> {
        let matrix = self.encode(&[text])?;
        Ok(matrix.row(0).to_owned())
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Array2<f32>, ClassifierError> {
        if texts.is_empty() {
            return Ok(Array2::zeros((0, self.characteristics.embedding_size)));
        }
        let matrix = self.encode(texts)?;
        if matrix.ncols() != self.characteristics.embedding_size {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.characteristics.embedding_size,
                actual: matrix.ncols(),
            });
        }
        Ok(matrix)
    }
}
