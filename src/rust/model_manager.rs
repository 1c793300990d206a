use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use crate::models::{BuiltinModel, ModelInfo};

/// Environment variable overriding the cache root for downloaded models
pub const CACHE_ENV_VAR: &str = "CLARITY_CACHE";

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Model not downloaded: {0}")]
    NotDownloaded(String),
    #[error("Download error: {0}")]
    DownloadError(#[from] reqwest::Error),
    #[error("Download of {url} failed with HTTP status {status}")]
    HttpStatus { url: String, status: reqwest::StatusCode },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
}

#[derive(Debug, Clone, Copy)]
enum ModelFile {
    Model,
    Tokenizer,
}

impl ModelFile {
    fn label(self) -> &'static str {
        match self {
            Self::Model => "model",
            Self::Tokenizer => "tokenizer",
        }
    }

    fn file_name(self) -> &'static str {
        match self {
            Self::Model => "model.onnx",
            Self::Tokenizer => "tokenizer.json",
        }
    }

    fn url(self, info: &ModelInfo) -> &str {
        match self {
            Self::Model => &info.model_url,
            Self::Tokenizer => &info.tokenizer_url,
        }
    }

    fn hash(self, info: &ModelInfo) -> &str {
        match self {
            Self::Model => &info.model_hash,
            Self::Tokenizer => &info.tokenizer_hash,
        }
    }
}

/// Downloads, verifies and locates built-in embedding models on disk.
#[derive(Debug, Clone)]
pub struct ModelManager {
    models_dir: PathBuf,
    download_lock: Arc<Mutex<()>>,
}

impl ModelManager {
    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Resolves the models directory: `$CLARITY_CACHE/models`, then the
    /// platform cache dir, then `~/.cache`, then the temp dir.
    pub fn get_default_models_dir() -> PathBuf {
        if let Ok(path) = env::var(CACHE_ENV_VAR) {
            return PathBuf::from(path).join("models");
        }
        if let Some(cache_dir) = dirs::cache_dir() {
            return cache_dir.join("clarity-topics").join("models");
        }
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".cache").join("clarity-topics").join("models");
        }
        env::temp_dir().join("clarity-topics").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            download_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    fn file_path(&self, model: BuiltinModel, file: ModelFile) -> PathBuf {
        self.models_dir.join(model.get_model_info().name).join(file.file_name())
    }

    pub fn get_model_path(&self, model: BuiltinModel) -> PathBuf {
        self.file_path(model, ModelFile::Model)
    }

    pub fn get_tokenizer_path(&self, model: BuiltinModel) -> PathBuf {
        self.file_path(model, ModelFile::Tokenizer)
    }

    pub fn is_model_downloaded(&self, model: BuiltinModel) -> bool {
        let model_path = self.get_model_path(model);
        let tokenizer_path = self.get_tokenizer_path(model);
        log::debug!(
            "Model {} files: {:?} (exists: {}), {:?} (exists: {})",
            model,
            model_path,
            model_path.exists(),
            tokenizer_path,
            tokenizer_path.exists()
        );
        model_path.exists() && tokenizer_path.exists()
    }

    /// Returns `Ok(false)` if either file is missing or its hash differs.
    pub fn verify_model(&self, model: BuiltinModel) -> Result<bool, ModelError> {
        let info = model.get_model_info();
        for file in [ModelFile::Model, ModelFile::Tokenizer] {
            let path = self.file_path(model, file);
            if !path.exists() {
                log::info!("{} file {:?} does not exist", file.label(), path);
                return Ok(false);
            }
            if !verify_file(&path, file.hash(&info))? {
                log::warn!("{} file {:?} failed hash verification", file.label(), path);
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Downloads any missing or corrupt file of `model`. On failure both
    /// files are removed so a later call starts clean.
    pub async fn download_model(&self, model: BuiltinModel) -> Result<(), ModelError> {
        let info = model.get_model_info();
        let _lock = self.download_lock.lock().await;

        let model_dir = self.models_dir.join(&info.name);
        log::info!("Preparing model directory {:?}", model_dir);
        fs::create_dir_all(&model_dir)?;

        for file in [ModelFile::Model, ModelFile::Tokenizer] {
            if let Err(e) = self.ensure_file(model, &info, file).await {
                log::error!("Failed to set up {} file: {}", file.label(), e);
                if let Err(cleanup) = self.remove_download(model) {
                    log::warn!("Cleanup after failed download also failed: {}", cleanup);
                }
                return Err(e);
            }
        }

        log::info!("Model {} ready to use", model);
        Ok(())
    }

    async fn ensure_file(&self, model: BuiltinModel, info: &ModelInfo, file: ModelFile) -> Result<(), ModelError> {
        let path = self.file_path(model, file);
        if path.exists() {
            if verify_file(&path, file.hash(info))? {
                log::info!("Existing {} file verified", file.label());
                return Ok(());
            }
            log::warn!("{} file verification failed, redownloading", file.label());
        }
        download_and_verify(file.url(info), &path, file.hash(info), file.label()).await
    }

    pub fn remove_download(&self, model: BuiltinModel) -> Result<(), ModelError> {
        for file in [ModelFile::Model, ModelFile::Tokenizer] {
            let path = self.file_path(model, file);
            if path.exists() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Downloads the model if absent and re-downloads it if verification fails.
    pub async fn ensure_model_downloaded(&self, model: BuiltinModel) -> Result<(), ModelError> {
        if self.is_model_downloaded(model) && self.verify_model(model)? {
            log::info!("Model {} present and verified", model);
            return Ok(());
        }
        log::info!("Model {} missing or unverified, downloading...", model);
        self.download_model(model).await
    }

    /// Fails with `NotDownloaded` instead of fetching anything.
    pub fn require_downloaded(&self, model: BuiltinModel) -> Result<(), ModelError> {
        if self.is_model_downloaded(model) {
            Ok(())
        } else {
            Err(ModelError::NotDownloaded(format!(
                "{} (expected under {:?}); run the `download` command first",
                model, self.models_dir
            )))
        }
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn verify_file(path: &Path, expected_hash: &str) -> Result<bool, ModelError> {
    let bytes = fs::read(path)?;
    let hash = sha256_hex(&bytes);
    log::debug!("{:?}: {} bytes, sha256 {} (expected {})", path, bytes.len(), hash, expected_hash);
    Ok(hash == expected_hash)
}

async fn download_and_verify(url: &str, path: &Path, expected_hash: &str, file_type: &str) -> Result<(), ModelError> {
    log::info!("Downloading {} file from {}", file_type, url);
    let response = reqwest::get(url).await?;
    let status = response.status();
    if !status.is_success() {
        return Err(ModelError::HttpStatus { url: url.to_string(), status });
    }
    let bytes = response.bytes().await?;
    log::info!("Downloaded {} bytes", bytes.len());

    let hash = sha256_hex(&bytes);
    if hash != expected_hash {
        return Err(ModelError::HashMismatch {
            file_type: file_type.to_string(),
            expected: expected_hash.to_string(),
            actual: hash,
        });
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = path.with_extension("partial");
    fs::write(&partial, &bytes)?;
    fs::rename(&partial, path)?;
    log::info!("{} file stored at {:?}", file_type, path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_dir() {
        env::set_var(CACHE_ENV_VAR, "/tmp/clarity-test-cache");
        let path = ModelManager::get_default_models_dir();
        assert_eq!(path, PathBuf::from("/tmp/clarity-test-cache/models"));
        env::remove_var(CACHE_ENV_VAR);

        let path = ModelManager::get_default_models_dir();
        assert!(path.to_string_lossy().contains("clarity-topics"));
    }

    #[test]
    fn test_paths_and_verification_of_local_files() -> Result<(), ModelError> {
        let dir = tempfile::tempdir()?;
        let manager = ModelManager::new(dir.path())?;
        let model = BuiltinModel::MiniLM;

        assert!(manager.get_model_path(model).ends_with("minilm/model.onnx"));
        assert!(manager.get_tokenizer_path(model).ends_with("minilm/tokenizer.json"));
        assert!(!manager.is_model_downloaded(model));
        assert!(!manager.verify_model(model)?);
        assert!(matches!(manager.require_downloaded(model), Err(ModelError::NotDownloaded(_))));

        fs::create_dir_all(manager.models_dir().join("minilm"))?;
        fs::write(manager.get_model_path(model), "corrupted data")?;
        fs::write(manager.get_tokenizer_path(model), "{}")?;
        assert!(manager.is_model_downloaded(model));
        assert!(!manager.verify_model(model)?);

        manager.remove_download(model)?;
        assert!(!manager.is_model_downloaded(model));
        Ok(())
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    #[ignore = "downloads the MiniLM model over the network"]
    async fn test_download_model() -> Result<(), ModelError> {
        let dir = tempfile::tempdir()?;
        let manager = ModelManager::new(dir.path())?;
        manager.download_model(BuiltinModel::MiniLM).await?;
        assert!(manager.verify_model(BuiltinModel::MiniLM)?);
        Ok(())
    }
}
