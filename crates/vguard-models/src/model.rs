//! Inference model descriptors.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Task a model performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    ObjectDetection,
    FaceRecognition,
    AnomalyDetection,
    WeaponDetection,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::ObjectDetection => "object_detection",
            ModelKind::FaceRecognition => "face_recognition",
            ModelKind::AnomalyDetection => "anomaly_detection",
            ModelKind::WeaponDetection => "weapon_detection",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Relative inference speed class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpeed {
    Fast,
    Medium,
    Slow,
}

/// Which backend variant serves a loaded model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// ONNX Runtime session over a model artifact
    Onnx,
    /// Deterministic placeholder output
    Synthetic,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Onnx => "onnx",
            BackendKind::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static description of a catalog model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub kind: ModelKind,
    pub version: String,
    /// Reported accuracy in percent
    pub accuracy: f64,
    pub speed: ModelSpeed,
    /// Input tensor shape as [height, width, channels]
    pub input_shape: [u32; 3],
    /// Location of the model artifact
    pub artifact_path: PathBuf,
    pub supported_detections: Vec<String>,
    /// Loaded by `initialize` and never evicted as idle
    pub is_default: bool,
}

impl ModelDescriptor {
    /// Input height in pixels.
    pub fn input_height(&self) -> u32 {
        self.input_shape[0]
    }

    /// Input width in pixels.
    pub fn input_width(&self) -> u32 {
        self.input_shape[1]
    }

    /// Estimated resident size of a loaded model in bytes (f32 input, doubled
    /// for activations).
    pub fn memory_estimate_bytes(&self) -> u64 {
        let [h, w, c] = self.input_shape;
        h as u64 * w as u64 * c as u64 * 4 * 2
    }

    /// Memory estimate in whole MiB.
    pub fn memory_estimate_mb(&self) -> u64 {
        self.memory_estimate_bytes() / (1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_estimate() {
        let descriptor = ModelDescriptor {
            id: "object_detection_v1".into(),
            name: "YOLO".into(),
            kind: ModelKind::ObjectDetection,
            version: "1.0.0".into(),
            accuracy: 94.7,
            speed: ModelSpeed::Fast,
            input_shape: [416, 416, 3],
            artifact_path: "models/object_detection_v1.onnx".into(),
            supported_detections: vec!["person".into()],
            is_default: true,
        };
        // 416*416*3*4*2 = 4_153_344 bytes
        assert_eq!(descriptor.memory_estimate_bytes(), 4_153_344);
        assert_eq!(descriptor.memory_estimate_mb(), 3);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ModelKind::WeaponDetection).unwrap(),
            "\"weapon_detection\""
        );
        assert_eq!(BackendKind::Synthetic.to_string(), "synthetic");
    }
}
