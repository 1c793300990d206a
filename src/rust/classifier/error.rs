use ort::Error as OrtError;

/// Represents the different types of errors that can occur while embedding text,
/// training the topic classifier or running predictions.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// Error occurred while loading or using the tokenizer
    #[error("Tokenizer error: {0}")]
    TokenizerError(String),
    /// Error occurred while loading or running the ONNX model
    #[error("Model error: {0}")]
    ModelError(String),
    /// Error occurred while fitting the classifier
    #[error("Training error: {0}")]
    TrainingError(String),
    /// Error occurred while making predictions
    #[error("Prediction error: {0}")]
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// A label that was not seen when the label encoder was fit
    #[error("Unknown label: '{0}'")]
    UnknownLabel(String),
    /// A class index outside of the label encoder's range
    #[error("Label index {index} out of range (num_classes={num_classes})")]
    UnknownIndex { index: usize, num_classes: usize },
    /// An embedding or weight matrix did not have the expected width
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// A built-in embedding model could not be fetched or verified
    #[error(transparent)]
    ModelDownload(#[from] crate::model_manager::ModelError),
}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}
