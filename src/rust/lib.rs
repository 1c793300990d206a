//! Topic prediction for a mental-health chatbot.
//!
//! Questions are embedded with a sentence encoder and scored by a
//! multinomial logistic-regression classifier. The [`Trainer`] fits and
//! persists the classifier; the [`TopicPredictor`] loads it back and powers
//! the HTTP service in [`server`].
//!
//! # Basic Usage
//!
//! ```rust
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use clarity_topics::{Corpus, Embedder, HashingEmbedder, TopicPredictor, TrainConfig, Trainer, TrainingExample};
//!
//! let corpus = Corpus::new(vec![
//!     TrainingExample::new("I feel anxious before every exam", "anxiety"),
//!     TrainingExample::new("My heart races and I worry all day", "anxiety"),
//!     TrainingExample::new("I can't fall asleep at night", "sleep"),
//!     TrainingExample::new("I wake up at 4am and stay awake", "sleep"),
//! ]);
//!
//! let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
//! let trained = Trainer::new(embedder.clone(), TrainConfig::default().with_test_size(0.0)).fit(&corpus)?;
//! let predictor = TopicPredictor::new(embedder, trained.model, trained.encoder)?;
//!
//! let predictions = predictor.predict("I can't sleep", 2)?;
//! assert_eq!(predictions.len(), 2);
//! println!("Most likely topic: {}", predictions[0].topic);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`TopicPredictor`] is immutable after construction and can be shared
//! across threads (or request handlers) behind an `Arc`.

pub mod artifacts;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod embedding;
pub mod model_manager;
pub mod models;
pub mod personas;
pub mod predictor;
mod runtime;
pub mod server;
pub mod trainer;

pub use artifacts::{ArtifactError, ArtifactMetadata, ClassifierArtifact};
pub use classifier::{ClassificationReport, ClassifierError, LabelEncoder, LogisticRegression, LogisticRegressionConfig};
pub use config::{ArtifactPaths, ServeConfig, TrainConfig};
pub use dataset::{Corpus, CorpusFields, DatasetError, TrainingExample};
pub use embedding::{Embedder, EmbeddingConfig, EmbeddingIdentity, HashingEmbedder, OnnxEmbedder};
pub use model_manager::{ModelError, ModelManager};
pub use models::{BuiltinModel, ModelCharacteristics, ModelInfo};
pub use personas::{Patient, Person, Therapist};
pub use predictor::{TopicPrediction, TopicPredictor, DEFAULT_TOP_K};
pub use runtime::{create_session_builder, OptimizationLevel, RuntimeConfig};
pub use server::ServiceState;
pub use trainer::{evaluate, Trainer, TrainerError, TrainingReport};

pub fn init_logger() {
    env_logger::init();
}
