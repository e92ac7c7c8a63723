//! Detector configuration.

use vguard_inference::{FACE_RECOGNITION_MODEL, OBJECT_DETECTION_MODEL};

use crate::faces::DEFAULT_MATCH_THRESHOLD;
use crate::preprocess::DEFAULT_INPUT_SIZE;

/// Detection engine configuration.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Square model input size in pixels
    pub input_size: u32,
    /// Minimum confidence for an object detection to be reported
    pub confidence_threshold: f64,
    /// Maximum encoding distance for a face match
    pub face_match_threshold: f64,
    pub object_model_id: String,
    pub face_model_id: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: 0.5,
            face_match_threshold: DEFAULT_MATCH_THRESHOLD,
            object_model_id: OBJECT_DETECTION_MODEL.to_string(),
            face_model_id: FACE_RECOGNITION_MODEL.to_string(),
        }
    }
}

impl DetectorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            input_size: std::env::var("VGUARD_DETECTOR_INPUT_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&s| s > 0)
                .unwrap_or(defaults.input_size),
            confidence_threshold: std::env::var("VGUARD_CONFIDENCE_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.confidence_threshold),
            face_match_threshold: std::env::var("VGUARD_FACE_MATCH_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.face_match_threshold),
            object_model_id: std::env::var("VGUARD_OBJECT_MODEL")
                .unwrap_or(defaults.object_model_id),
            face_model_id: std::env::var("VGUARD_FACE_MODEL").unwrap_or(defaults.face_model_id),
        }
    }
}
