//! Detection engine errors.

use thiserror::Error;
use vguard_inference::InferenceError;

/// Result type for detection operations.
pub type DetectResult<T> = Result<T, DetectError>;

#[derive(Debug, Error)]
pub enum DetectError {
    /// Malformed caller input (missing frame data, bad parameters).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Model {model_id} returned unexpected output, expected {expected}")]
    UnexpectedOutput { model_id: String, expected: &'static str },

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DetectError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True when the model was not loaded; callers may load and retry.
    pub fn is_model_not_loaded(&self) -> bool {
        matches!(self, DetectError::Inference(InferenceError::ModelNotLoaded(_)))
    }
}

impl From<image::ImageError> for DetectError {
    fn from(e: image::ImageError) -> Self {
        Self::Decode(e.to_string())
    }
}
