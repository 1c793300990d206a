//! Persistence of the fitted classifier and label encoder.
//!
//! Both artifacts are JSON documents carrying a format version. Each file is
//! written to a temporary sibling and then renamed over the target, so a
//! reader never observes a half-written artifact.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::info;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::classifier::{ClassifierError, FitSummary, LabelEncoder, LogisticRegression};
use crate::config::ArtifactPaths;
use crate::embedding::EmbeddingIdentity;

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact I/O failed for {path:?}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("Malformed artifact {path:?}: {source}")]
    Serde {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Unsupported artifact format version {found} in {path:?} (expected {expected})")]
    UnsupportedVersion { path: PathBuf, found: u32, expected: u32 },
    #[error("Classifier was trained on embeddings from {expected}, but the loaded embedder is {found}")]
    EmbeddingMismatch {
        expected: EmbeddingIdentity,
        found: EmbeddingIdentity,
    },
    #[error("Classifier has {classifier} classes but the label encoder has {encoder}")]
    ClassCountMismatch { classifier: usize, encoder: usize },
    #[error("Invalid artifact: {0}")]
    Invalid(#[from] ClassifierError),
}

/// Provenance stored next to the classifier weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub format_version: u32,
    pub embedding: EmbeddingIdentity,
    pub num_classes: usize,
    pub fit: FitSummary,
    pub trained_at_unix: u64,
}

/// The fitted classifier together with the embedder it expects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierArtifact {
    pub metadata: ArtifactMetadata,
    pub model: LogisticRegression,
}

impl ClassifierArtifact {
    pub fn new(model: LogisticRegression, embedding: EmbeddingIdentity) -> Self {
        let trained_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            metadata: ArtifactMetadata {
                format_version: ARTIFACT_FORMAT_VERSION,
                embedding,
                num_classes: model.num_classes(),
                fit: model.fit_summary().clone(),
                trained_at_unix,
            },
            model,
        }
    }

    /// Fails unless this classifier can score vectors from `embedding` and
    /// its classes line up with `encoder`.
    pub fn ensure_compatible(
        &self,
        embedding: &EmbeddingIdentity,
        encoder: &LabelEncoder,
    ) -> Result<(), ArtifactError> {
        if &self.metadata.embedding != embedding {
            return Err(ArtifactError::EmbeddingMismatch {
                expected: self.metadata.embedding.clone(),
                found: embedding.clone(),
            });
        }
        if self.model.num_classes() != encoder.len() {
            return Err(ArtifactError::ClassCountMismatch {
                classifier: self.model.num_classes(),
                encoder: encoder.len(),
            });
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct EncoderFile {
    format_version: u32,
    classes: Vec<String>,
}

/// Writes both artifacts, creating the output directory if needed.
pub fn save_artifacts(
    paths: &ArtifactPaths,
    artifact: &ClassifierArtifact,
    encoder: &LabelEncoder,
) -> Result<(), ArtifactError> {
    fs::create_dir_all(&paths.dir).map_err(|source| ArtifactError::Io {
        path: paths.dir.clone(),
        source,
    })?;
    write_json_atomic(&paths.classifier, artifact)?;
    write_json_atomic(
        &paths.label_encoder,
        &EncoderFile {
            format_version: ARTIFACT_FORMAT_VERSION,
            classes: encoder.classes().to_vec(),
        },
    )?;
    info!("Saved classifier to {:?}", paths.classifier);
    info!("Saved label encoder to {:?}", paths.label_encoder);
    Ok(())
}

pub fn load_classifier(path: &Path) -> Result<ClassifierArtifact, ArtifactError> {
    let artifact: ClassifierArtifact = read_json(path)?;
    check_version(path, artifact.metadata.format_version)?;
    artifact.model.validate()?;
    if artifact.metadata.num_classes != artifact.model.num_classes() {
        return Err(ArtifactError::Invalid(ClassifierError::DimensionMismatch {
            expected: artifact.metadata.num_classes,
            actual: artifact.model.num_classes(),
        }));
    }
    if artifact.metadata.embedding.dimension != artifact.model.num_features() {
        return Err(ArtifactError::Invalid(ClassifierError::DimensionMismatch {
            expected: artifact.metadata.embedding.dimension,
            actual: artifact.model.num_features(),
        }));
    }
    Ok(artifact)
}

pub fn load_label_encoder(path: &Path) -> Result<LabelEncoder, ArtifactError> {
    let file: EncoderFile = read_json(path)?;
    check_version(path, file.format_version)?;
    let encoder = LabelEncoder::fit(&file.classes)?;
    if encoder.classes() != file.classes.as_slice() {
        return Err(ArtifactError::Invalid(ClassifierError::ValidationError(format!(
            "Label encoder classes in {:?} are not sorted and unique",
            path
        ))));
    }
    Ok(encoder)
}

/// Writes the label list as `{"classes": [...]}` for the chat front-end.
pub fn export_labels(path: &Path, encoder: &LabelEncoder) -> Result<(), ArtifactError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| ArtifactError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    write_json_atomic(path, encoder)?;
    info!("Exported {} labels to {:?}", encoder.len(), path);
    Ok(())
}

fn check_version(path: &Path, found: u32) -> Result<(), ArtifactError> {
    if found != ARTIFACT_FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedVersion {
            path: path.to_path_buf(),
            found,
            expected: ARTIFACT_FORMAT_VERSION,
        });
    }
    Ok(())
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let content = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ArtifactError::Serde {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let json = serde_json::to_vec_pretty(value).map_err(|source| ArtifactError::Serde {
        path: path.to_path_buf(),
        source,
    })?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    let io_err = |source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Err(e) = fs::write(&tmp, &json) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        io_err(e)
    })
}
