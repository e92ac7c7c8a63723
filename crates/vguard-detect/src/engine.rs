//! Threat detector: preprocessing, detection and classification on top of
//! the model registry.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use image::GenericImageView;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;
use vguard_inference::{
    class_name, LoadOptions, ModelInput, ModelOutput, ModelRegistry, PredictOptions,
};
use vguard_models::{BackendKind, BoundingBox, Detection, DetectionCategories};

use crate::anomaly::{self, AnomalyObservation, AnomalyReport, Baseline};
use crate::classify::{self, ClassCategory, RawDetection};
use crate::config::DetectorConfig;
use crate::error::{DetectError, DetectResult};
use crate::faces::{self, Face, FaceRecognition, KnownFace};
use crate::preprocess::{self, FrameInfo, NormalizedFrame};
use crate::tracker::{self, Track, TrackOptions, TrackedFrame};

/// Result of analyzing one frame.
#[derive(Debug, Clone, Serialize)]
pub struct FrameAnalysis {
    pub detections: Vec<Detection>,
    /// Mean detection confidence, 0 without detections
    pub overall_confidence: f64,
    pub processing_time_ms: u64,
    /// Milliseconds; media time for files, wall clock for live frames
    pub timestamp: i64,
    pub frame_info: FrameInfo,
    pub backend: BackendKind,
}

/// One input of [`ThreatDetector::analyze_batch`].
#[derive(Debug, Clone)]
pub struct BatchFrame {
    pub data: Vec<u8>,
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub index: usize,
    pub analysis: Option<FrameAnalysis>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchAnalysis {
    pub results: Vec<BatchItem>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Detection engine bound to a registry.
#[derive(Clone)]
pub struct ThreatDetector {
    registry: Arc<ModelRegistry>,
    config: DetectorConfig,
}

impl ThreatDetector {
    pub fn new(registry: Arc<ModelRegistry>, config: DetectorConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Load the object-detection model if it is not loaded yet.
    pub async fn ensure_ready(&self) -> DetectResult<BackendKind> {
        let result = self
            .registry
            .load(&self.config.object_model_id, LoadOptions::default())
            .await?;
        Ok(result.backend)
    }

    /// Decode and normalize a frame on the blocking pool.
    pub async fn preprocess(&self, raw: &[u8]) -> DetectResult<NormalizedFrame> {
        if raw.is_empty() {
            return Err(DetectError::validation("frame data is empty"));
        }
        let data = raw.to_vec();
        let size = self.config.input_size;

        tokio::task::spawn_blocking(move || preprocess::preprocess(&data, size))
            .await
            .map_err(|e| DetectError::internal(format!("Preprocess task failed: {}", e)))?
    }

    /// Run the object-detection model on a normalized frame.
    ///
    /// Boxes are returned in source-image coordinates, filtered by category
    /// flags and the confidence threshold. Faces are handled by
    /// [`recognize_faces`](Self::recognize_faces).
    pub async fn detect(
        &self,
        frame: &NormalizedFrame,
        categories: &DetectionCategories,
    ) -> DetectResult<Vec<RawDetection>> {
        Ok(self.detect_with_backend(frame, categories).await?.0)
    }

    async fn detect_with_backend(
        &self,
        frame: &NormalizedFrame,
        categories: &DetectionCategories,
    ) -> DetectResult<(Vec<RawDetection>, BackendKind)> {
        let model_id = &self.config.object_model_id;
        let prediction = self
            .registry
            .predict(model_id, frame.input.clone(), PredictOptions::default())
            .await?;

        let ModelOutput::Objects(objects) = prediction.output else {
            return Err(DetectError::UnexpectedOutput {
                model_id: model_id.clone(),
                expected: "objects",
            });
        };

        let (sx, sy) = frame.scale_factors();
        let detections = objects
            .into_iter()
            .filter_map(|obj| {
                let class = class_name(obj.class_id)?;
                let confidence = obj.confidence as f64;
                if confidence < self.config.confidence_threshold
                    || !ClassCategory::of(class).enabled(categories)
                {
                    return None;
                }
                let bbox = BoundingBox::new(
                    obj.x as f64,
                    obj.y as f64,
                    obj.width as f64,
                    obj.height as f64,
                )
                .scale(sx, sy);
                Some(RawDetection {
                    class: class.to_string(),
                    confidence,
                    bbox,
                })
            })
            .collect();

        Ok((detections, prediction.backend))
    }

    /// Assign threat levels and risk scores.
    pub fn classify(&self, detections: Vec<RawDetection>, timestamp_ms: i64) -> Vec<Detection> {
        classify::classify(detections, timestamp_ms)
    }

    /// Preprocess, detect and classify one encoded frame.
    ///
    /// `timestamp_ms` defaults to the current wall-clock time.
    pub async fn analyze_frame(
        &self,
        raw: &[u8],
        categories: &DetectionCategories,
        timestamp_ms: Option<i64>,
    ) -> DetectResult<FrameAnalysis> {
        let start = Instant::now();

        let frame = self.preprocess(raw).await?;
        let (raw_detections, backend) = self.detect_with_backend(&frame, categories).await?;
        let timestamp = timestamp_ms.unwrap_or_else(|| Utc::now().timestamp_millis());
        let detections = self.classify(raw_detections, timestamp);

        let analysis = FrameAnalysis {
            overall_confidence: classify::overall_confidence(&detections),
            detections,
            processing_time_ms: start.elapsed().as_millis() as u64,
            timestamp,
            frame_info: frame.info(),
            backend,
        };

        debug!(
            detections = analysis.detections.len(),
            backend = %backend,
            processing_time_ms = analysis.processing_time_ms,
            "Frame analyzed"
        );

        Ok(analysis)
    }

    /// Analyze several frames, at most `concurrency` at a time. Per-frame
    /// failures are reported in the result rather than failing the batch.
    pub async fn analyze_batch(
        &self,
        frames: Vec<BatchFrame>,
        categories: &DetectionCategories,
        concurrency: usize,
    ) -> BatchAnalysis {
        let results: Vec<BatchItem> = stream::iter(frames.into_iter().enumerate())
            .map(|(index, frame)| async move {
                match self.analyze_frame(&frame.data, categories, frame.timestamp).await {
                    Ok(analysis) => BatchItem {
                        index,
                        analysis: Some(analysis),
                        error: None,
                    },
                    Err(e) => {
                        warn!(index, error = %e, "Batch frame analysis failed");
                        BatchItem {
                            index,
                            analysis: None,
                            error: Some(e.to_string()),
                        }
                    }
                }
            })
            .buffered(concurrency.max(1))
            .collect()
            .await;

        let succeeded = results.iter().filter(|r| r.analysis.is_some()).count();
        BatchAnalysis {
            total: results.len(),
            failed: results.len() - succeeded,
            succeeded,
            results,
        }
    }

    /// Detect faces with the face model and match them against `known`.
    pub async fn recognize_faces(&self, raw: &[u8], known: &[KnownFace]) -> DetectResult<FaceRecognition> {
        if raw.is_empty() {
            return Err(DetectError::validation("frame data is empty"));
        }

        let model_id = &self.config.face_model_id;
        let descriptor = self
            .registry
            .descriptor(model_id)
            .ok_or_else(|| vguard_inference::InferenceError::ModelNotFound(model_id.clone()))?;
        let (width, height) = (descriptor.input_width(), descriptor.input_height());

        let data = raw.to_vec();
        let (input, original) = tokio::task::spawn_blocking(move || -> DetectResult<_> {
            let img = image::load_from_memory(&data)?;
            let dims = img.dimensions();
            Ok((ModelInput::from_image(&img, width, height)?, dims))
        })
        .await
        .map_err(|e| DetectError::internal(format!("Face preprocess task failed: {}", e)))??;

        let prediction = self
            .registry
            .predict(model_id, input, PredictOptions::default())
            .await?;
        let ModelOutput::Faces(raw_faces) = prediction.output else {
            return Err(DetectError::UnexpectedOutput {
                model_id: model_id.clone(),
                expected: "faces",
            });
        };

        let sx = original.0 as f64 / width as f64;
        let sy = original.1 as f64 / height as f64;
        let found: Vec<Face> = raw_faces
            .into_iter()
            .map(|f| Face {
                id: format!("face_{}", Uuid::new_v4().simple()),
                bbox: BoundingBox::new(f.x as f64, f.y as f64, f.width as f64, f.height as f64)
                    .scale(sx, sy),
                confidence: (f.confidence as f64).clamp(0.0, 1.0),
                encoding: f.encoding,
            })
            .collect();

        Ok(faces::match_faces(found, known, self.config.face_match_threshold))
    }

    /// Associate detections across frames.
    pub fn track(&self, frames: &[TrackedFrame], options: TrackOptions) -> Vec<Track> {
        tracker::track(frames, options)
    }

    /// Score an observation stream against a baseline.
    pub fn detect_anomalies(
        &self,
        stream: &[AnomalyObservation],
        baseline: &Baseline,
        sensitivity: f64,
    ) -> DetectResult<AnomalyReport> {
        anomaly::detect_anomalies(stream, baseline, sensitivity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{object, registry_with, solid_jpeg, ScriptedFactory};
    use vguard_inference::{RawFace, FACE_ENCODING_DIM, FACE_RECOGNITION_MODEL};
    use vguard_models::{ModelKind, ThreatLevel};

    fn scripted_objects() -> ScriptedFactory {
        ScriptedFactory::new().with_output(
            ModelKind::ObjectDetection,
            ModelOutput::Objects(vec![
                object(0, 0.95, 0.0, 0.0, 208.0, 208.0),   // person
                object(43, 0.8, 208.0, 208.0, 52.0, 52.0), // knife
                object(2, 0.3, 0.0, 0.0, 10.0, 10.0),      // car below threshold
            ]),
        )
    }

    async fn detector(factory: ScriptedFactory) -> ThreatDetector {
        let detector = ThreatDetector::new(registry_with(factory), DetectorConfig::default());
        detector.ensure_ready().await.unwrap();
        detector
    }

    #[tokio::test]
    async fn test_analyze_frame_scales_and_classifies() {
        let detector = detector(scripted_objects()).await;
        let analysis = detector
            .analyze_frame(&solid_jpeg(832, 624, [10, 10, 10]), &DetectionCategories::all(), Some(5000))
            .await
            .unwrap();

        assert_eq!(analysis.detections.len(), 2);
        assert_eq!(analysis.backend, BackendKind::Synthetic);
        assert_eq!(analysis.frame_info.original_width, 832);
        assert_eq!(analysis.frame_info.width, 416);

        let person = &analysis.detections[0];
        assert_eq!(person.class, "person");
        assert!((person.bbox.width - 416.0).abs() < 1e-3);
        assert!((person.bbox.height - 312.0).abs() < 1e-3);
        assert_eq!(person.timestamp, 5000);

        let knife = &analysis.detections[1];
        assert_eq!(knife.threat_level, ThreatLevel::High);
        assert!(analysis.overall_confidence > 0.8);
    }

    #[tokio::test]
    async fn test_category_flags_filter() {
        let detector = detector(scripted_objects()).await;
        let mut categories = DetectionCategories::all();
        categories.weapons = false;

        let frame = detector.preprocess(&solid_jpeg(64, 64, [0, 0, 0])).await.unwrap();
        let detections = detector.detect(&frame, &categories).await.unwrap();
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class, "person");
    }

    #[tokio::test]
    async fn test_detect_without_loaded_model() {
        let detector = ThreatDetector::new(registry_with(scripted_objects()), DetectorConfig::default());
        let err = detector
            .analyze_frame(&solid_jpeg(64, 64, [0, 0, 0]), &DetectionCategories::all(), None)
            .await
            .unwrap_err();
        assert!(err.is_model_not_loaded());
    }

    #[tokio::test]
    async fn test_empty_frame_is_validation_error() {
        let detector = detector(scripted_objects()).await;
        let err = detector
            .analyze_frame(&[], &DetectionCategories::all(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DetectError::Validation(_)));
    }

    #[tokio::test]
    async fn test_analyze_batch_reports_failures() {
        let detector = detector(scripted_objects()).await;
        let frames = vec![
            BatchFrame {
                data: solid_jpeg(64, 64, [0, 0, 0]),
                timestamp: Some(0),
            },
            BatchFrame {
                data: Vec::new(),
                timestamp: Some(1000),
            },
            BatchFrame {
                data: solid_jpeg(64, 64, [9, 9, 9]),
                timestamp: Some(2000),
            },
        ];

        let batch = detector.analyze_batch(frames, &DetectionCategories::all(), 2).await;
        assert_eq!((batch.total, batch.succeeded, batch.failed), (3, 2, 1));
        assert_eq!(
            batch.results.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
        assert!(batch.results[1].error.is_some());
    }

    #[tokio::test]
    async fn test_recognize_faces_matches_close_encoding() {
        let known_encoding = vec![0.1f32; FACE_ENCODING_DIM];
        let mut observed = known_encoding.clone();
        observed[0] += 0.3;

        let factory = ScriptedFactory::new().with_output(
            ModelKind::FaceRecognition,
            ModelOutput::Faces(vec![RawFace {
                confidence: 0.94,
                x: 40.0,
                y: 40.0,
                width: 80.0,
                height: 80.0,
                encoding: observed,
            }]),
        );
        let detector = ThreatDetector::new(registry_with(factory), DetectorConfig::default());
        detector
            .registry()
            .load(FACE_RECOGNITION_MODEL, LoadOptions::default())
            .await
            .unwrap();

        let known = [KnownFace {
            id: "employee-7".into(),
            name: Some("Front desk".into()),
            encoding: known_encoding,
        }];
        let result = detector
            .recognize_faces(&solid_jpeg(320, 320, [200, 180, 160]), &known)
            .await
            .unwrap();

        assert_eq!(result.faces.len(), 1);
        assert_eq!(result.matches.len(), 1);
        assert!(result.unknown_faces.is_empty());
        assert_eq!(result.matches[0].known.id, "employee-7");
        assert!((result.matches[0].distance - 0.3).abs() < 1e-5);
        // Face model input is 160x160, source is 320x320
        assert!((result.faces[0].bbox.x - 80.0).abs() < 1e-3);
    }
}
