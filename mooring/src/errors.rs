//! Error types for the mooring engine

use thiserror::Error;

use crate::containers::manager::ContainerError;

/// Main error type for the mooring engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Container error: {0}")]
    ContainerError(#[from] ContainerError),

    #[error("Invalid transition: {0}")]
    TransitionError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Build error: {0}")]
    BuildError(String),

    #[error("Proxy error: {0}")]
    ProxyError(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        EngineError::Internal(err.to_string())
    }
}
