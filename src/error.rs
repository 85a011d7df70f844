use std::path::PathBuf;
use thiserror::Error;

/// Failures produced by this crate. Every variant is fatal to the current
/// operation; nothing in here retries.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    ConfigValidation(String),

    #[error("model not loaded, call load_model() or train() first")]
    ModelNotLoaded,

    #[error("model file not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("dataset structure invalid after preparation, missing: {0:?}")]
    StructuralInvalid(Vec<PathBuf>),

    #[error("dataset download failed: {0}")]
    Download(String),

    #[error("training failed: {0}")]
    Training(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
