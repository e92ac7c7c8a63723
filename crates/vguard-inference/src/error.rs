//! Error types for model lifecycle and inference.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for inference operations.
pub type InferenceResult<T> = Result<T, InferenceError>;

/// Errors raised by the registry and its backends.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model not found in catalog: {0}")]
    ModelNotFound(String),

    #[error("Model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("Model artifact missing: {0}")]
    ArtifactMissing(PathBuf),

    #[error("Invalid model input: {0}")]
    InvalidInput(String),

    #[error("Inference runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl InferenceError {
    /// Create a runtime error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::Runtime(message.into())
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

