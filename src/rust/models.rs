use std::fmt;
use std::str::FromStr;

/// Represents the available built-in embedding models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinModel {
    /// Small and efficient sentence encoder based on the MiniLM architecture
    ///
    /// Characteristics:
    /// - Embedding size: 384
    /// - Max sequence length: 256
    /// - Size: ~85MB
    MiniLM,
}

/// Characteristics of a model including its capabilities and requirements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCharacteristics {
    /// Size of the embedding vectors produced by the model
    pub embedding_size: usize,
    /// Maximum sequence length the model can handle; longer input is truncated
    pub max_sequence_length: usize,
    /// Approximate size of the model in memory
    pub model_size_mb: usize,
}

/// Where to fetch a model from and how to verify it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelInfo {
    /// Directory name inside the models cache
    pub name: String,
    pub model_url: String,
    pub tokenizer_url: String,
    /// Lowercase hex SHA-256 of the ONNX file
    pub model_hash: String,
    /// Lowercase hex SHA-256 of the tokenizer file
    pub tokenizer_hash: String,
}

impl BuiltinModel {
    pub const ALL: [BuiltinModel; 1] = [BuiltinModel::MiniLM];

    /// Stable identifier recorded in classifier artifacts
    pub fn model_id(&self) -> &'static str {
        match self {
            Self::MiniLM => "axar-ai/minilm",
        }
    }

    pub fn characteristics(&self) -> ModelCharacteristics {
        match self {
            Self::MiniLM => ModelCharacteristics {
                embedding_size: 384,
                max_sequence_length: 256,
                model_size_mb: 85,
            },
        }
    }

    pub fn get_model_info(&self) -> ModelInfo {
        match self {
            Self::MiniLM => ModelInfo {
                name: "minilm".to_string(),
                model_url: "https://huggingface.co/axar-ai/minilm/resolve/main/model.onnx".to_string(),
                tokenizer_url: "https://huggingface.co/axar-ai/minilm/resolve/main/tokenizer.json".to_string(),
                model_hash: "37f1ea074b7166e87295fce31299287d5fb79f76b8b7227fccc8a9f2f1ba4e16".to_string(),
                tokenizer_hash: "da0e79933b9ed51798a3ae27893d3c5fa4a201126cef75586296df9b4d2c62a0".to_string(),
            },
        }
    }
}

impl fmt::Display for BuiltinModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.get_model_info().name)
    }
}

impl FromStr for BuiltinModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.get_model_info().name == wanted || m.model_id() == wanted)
            .ok_or_else(|| format!("Unknown built-in model '{}'", s))
    }
}
