//! Worker error types.

use thiserror::Error;
use vguard_detect::DetectError;
use vguard_inference::InferenceError;
use vguard_media::MediaError;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// Rejected input (options out of range, unsafe ids).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Unknown job, video or thumbnail.
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Live feed already running for camera {0}")]
    DuplicateFeed(String),

    #[error("Processing failed: {0}")]
    Processing(String),

    #[error("Job store error: {0}")]
    Store(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Detection error: {0}")]
    Detect(#[from] DetectError),

    #[error("Inference error: {0}")]
    Inference(#[from] InferenceError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Check if error is worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Media(e) => e.is_transient(),
            WorkerError::Io(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(WorkerError::Media(MediaError::Timeout(5)).is_retryable());
        assert!(!WorkerError::Media(MediaError::Cancelled).is_retryable());
        assert!(!WorkerError::validation("bad").is_retryable());
        assert!(!WorkerError::DuplicateFeed("cam-1".into()).is_retryable());
    }
}
