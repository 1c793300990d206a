//! Topic classifier: label encoding, multinomial logistic regression and
//! evaluation metrics, all operating on embedding vectors.

mod error;
mod label_encoder;
mod logistic;
pub mod metrics;

pub use error::ClassifierError;
pub use label_encoder::LabelEncoder;
pub use logistic::{ClassWeight, FitSummary, LogisticRegression, LogisticRegressionConfig};
pub use metrics::{accuracy, ClassMetrics, ClassificationReport};

pub(crate) use logistic::argmax;
