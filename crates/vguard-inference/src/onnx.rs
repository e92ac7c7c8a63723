//! ONNX Runtime backend.
//!
//! Models are expected to expose their result as `output0`.
//! Object-detection models produce YOLO-style output
//! (`[1, 4 + classes, candidates]`, center-format boxes in input pixels).
//! Other kinds interpret the tensor by model kind:
//! - face recognition: one embedding for the whole input
//! - anomaly: a score, the first element
//! - weapon: the highest class probability

use ndarray::Array;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, Value};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};
use vguard_models::{BackendKind, ModelDescriptor, ModelKind};

use crate::backend::{InferenceBackend, ModelInput, ModelOutput, RawFace, RawObject};
use crate::error::{InferenceError, InferenceResult};

/// Backend-level confidence floor for YOLO candidates.
const CANDIDATE_THRESHOLD: f32 = 0.25;
/// IoU threshold for NMS.
const NMS_THRESHOLD: f32 = 0.45;
/// Box coordinates plus class scores.
const YOLO_BOX_FEATURES: usize = 4;
/// Name of the output tensor read from every model.
const OUTPUT_NAME: &str = "output0";

/// ONNX Runtime session serving one catalog model.
pub struct OnnxBackend {
    session: Mutex<Session>,
    kind: ModelKind,
    input_shape: [u32; 3],
}

impl OnnxBackend {
    /// Load the descriptor's artifact into a new session.
    pub fn load(descriptor: &ModelDescriptor) -> InferenceResult<Self> {
        let path = descriptor.artifact_path.as_path();
        if !path.exists() {
            return Err(InferenceError::ArtifactMissing(path.to_path_buf()));
        }

        let session = create_session(path)?;

        info!(
            model_id = %descriptor.id,
            path = %path.display(),
            "ONNX model loaded"
        );

        Ok(Self {
            session: Mutex::new(session),
            kind: descriptor.kind,
            input_shape: descriptor.input_shape,
        })
    }

    /// Run the session, returning the flattened output tensor.
    fn run_inference(&self, input: &ModelInput) -> InferenceResult<Vec<f32>> {
        let [h, w, c] = self.input_shape;
        if input.shape() != self.input_shape {
            return Err(InferenceError::invalid_input(format!(
                "expected input shape [{}, {}, {}], got {:?}",
                h,
                w,
                c,
                input.shape()
            )));
        }

        let shape = vec![1usize, c as usize, h as usize, w as usize];
        let tensor: Value = Tensor::from_array((shape, input.to_nchw().into_boxed_slice()))
            .map(Value::from)
            .map_err(|e| InferenceError::runtime(format!("Failed to create tensor: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::internal("Session lock poisoned"))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| InferenceError::runtime(format!("ONNX inference failed: {}", e)))?;

        let output = outputs
            .get(OUTPUT_NAME)
            .ok_or_else(|| InferenceError::runtime(format!("Missing {} tensor", OUTPUT_NAME)))?;

        let extracted = output
            .try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::runtime(format!("Failed to extract tensor: {}", e)))?;

        Ok(extracted.1.to_vec())
    }
}

impl InferenceBackend for OnnxBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Onnx
    }

    fn predict(&self, input: &ModelInput) -> InferenceResult<ModelOutput> {
        let raw = self.run_inference(input)?;

        let output = match self.kind {
            ModelKind::ObjectDetection => {
                let objects = decode_yolo(&raw, crate::catalog::COCO_CLASSES.len())?;
                debug!(count = objects.len(), "Object detection completed");
                ModelOutput::Objects(objects)
            }
            ModelKind::FaceRecognition => {
                let [h, w, _] = self.input_shape;
                ModelOutput::Faces(vec![RawFace {
                    confidence: 1.0,
                    x: 0.0,
                    y: 0.0,
                    width: w as f32,
                    height: h as f32,
                    encoding: raw,
                }])
            }
            ModelKind::AnomalyDetection => {
                let score = raw.first().copied().unwrap_or(0.0).clamp(0.0, 1.0);
                ModelOutput::Anomaly {
                    score,
                    anomalous: score > 0.5,
                }
            }
            ModelKind::WeaponDetection => {
                let confidence = raw
                    .iter()
                    .copied()
                    .fold(0.0f32, f32::max)
                    .clamp(0.0, 1.0);
                ModelOutput::Weapon {
                    confidence,
                    present: confidence > 0.5,
                }
            }
        };

        Ok(output)
    }
}

/// Decode YOLO output `[4 + num_classes, N]` and apply per-class NMS.
pub(crate) fn decode_yolo(outputs: &[f32], num_classes: usize) -> InferenceResult<Vec<RawObject>> {
    let num_features = YOLO_BOX_FEATURES + num_classes;
    if outputs.is_empty() || outputs.len() % num_features != 0 {
        return Err(InferenceError::runtime(format!(
            "Unexpected output size {} for {} features",
            outputs.len(),
            num_features
        )));
    }
    let num_boxes = outputs.len() / num_features;

    // Output is [features, boxes]; transpose to [boxes, features]
    let output_array = Array::from_shape_vec((num_features, num_boxes), outputs.to_vec())
        .map_err(|e| InferenceError::runtime(format!("Failed to reshape output: {}", e)))?;
    let transposed = output_array.t();

    let mut candidates = Vec::new();
    for i in 0..num_boxes {
        let cx = transposed[[i, 0]];
        let cy = transposed[[i, 1]];
        let w = transposed[[i, 2]];
        let h = transposed[[i, 3]];

        let mut best_class = 0;
        let mut best_score = 0.0f32;
        for c in 0..num_classes {
            let score = transposed[[i, YOLO_BOX_FEATURES + c]];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }

        if best_score < CANDIDATE_THRESHOLD {
            continue;
        }

        candidates.push(RawObject {
            class_id: best_class,
            confidence: best_score.min(1.0),
            x: (cx - w / 2.0).max(0.0),
            y: (cy - h / 2.0).max(0.0),
            width: w.max(0.0),
            height: h.max(0.0),
        });
    }

    Ok(non_maximum_suppression(candidates, NMS_THRESHOLD))
}

/// Keep the highest-confidence box among same-class overlaps.
pub(crate) fn non_maximum_suppression(mut detections: Vec<RawObject>, threshold: f32) -> Vec<RawObject> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<RawObject> = Vec::new();
    for det in detections {
        let overlaps = keep
            .iter()
            .any(|k| k.class_id == det.class_id && iou(k, &det) > threshold);
        if !overlaps {
            keep.push(det);
        }
    }
    keep
}

fn iou(a: &RawObject, b: &RawObject) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Create ONNX Runtime session, CPU execution provider.
fn create_session(model_path: &Path) -> InferenceResult<Session> {
    let model_bytes = std::fs::read(model_path)?;

    Session::builder()
        .map_err(|e| InferenceError::runtime(format!("Failed to create session builder: {}", e)))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| InferenceError::runtime(format!("Failed to set optimization level: {}", e)))?
        .commit_from_memory(&model_bytes)
        .map_err(|e| InferenceError::runtime(format!("Failed to load ONNX model: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a `[4 + classes, N]` tensor from per-box rows.
    fn yolo_tensor(rows: &[[f32; 6]]) -> Vec<f32> {
        let features = 6;
        let mut out = vec![0.0; features * rows.len()];
        for (i, row) in rows.iter().enumerate() {
            for f in 0..features {
                out[f * rows.len() + i] = row[f];
            }
        }
        out
    }

    #[test]
    fn test_decode_yolo_threshold_and_nms() {
        // cx, cy, w, h, class0, class1
        let raw = yolo_tensor(&[
            [50.0, 50.0, 20.0, 20.0, 0.9, 0.0],
            [51.0, 50.0, 20.0, 20.0, 0.8, 0.0], // overlaps the first, same class
            [51.0, 50.0, 20.0, 20.0, 0.0, 0.7], // overlaps, different class
            [200.0, 200.0, 10.0, 10.0, 0.1, 0.0], // below threshold
        ]);

        let objects = decode_yolo(&raw, 2).unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].class_id, 0);
        assert!((objects[0].confidence - 0.9).abs() < 1e-6);
        assert!((objects[0].x - 40.0).abs() < 1e-6);
        assert_eq!(objects[1].class_id, 1);
    }

    #[test]
    fn test_decode_yolo_rejects_bad_shape() {
        assert!(decode_yolo(&[0.0; 7], 2).is_err());
        assert!(decode_yolo(&[], 2).is_err());
    }

    #[test]
    fn test_missing_artifact() {
        let descriptor = crate::catalog::builtin_catalog(Path::new("/nonexistent"))
            .into_iter()
            .next()
            .unwrap();
        assert!(matches!(
            OnnxBackend::load(&descriptor),
            Err(InferenceError::ArtifactMissing(_))
        ));
    }
}
