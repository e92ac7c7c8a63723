//! Detection engine.
//!
//! Turns encoded frames into classified [`Detection`](vguard_models::Detection)s
//! using the object-detection model held by a
//! [`ModelRegistry`](vguard_inference::ModelRegistry), and provides the
//! auxiliary analyses: face matching, multi-frame tracking and baseline
//! anomaly scoring.

pub mod anomaly;
pub mod classify;
pub mod config;
pub mod engine;
pub mod error;
pub mod faces;
pub mod preprocess;
pub mod tracker;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use anomaly::{
    detect_anomalies, AnomalyDetection, AnomalyKind, AnomalyObservation, AnomalyReport, Baseline,
    BaselineStats,
};
pub use classify::{classify, ClassCategory, RawDetection};
pub use config::DetectorConfig;
pub use engine::{BatchAnalysis, BatchFrame, BatchItem, FrameAnalysis, ThreatDetector};
pub use error::{DetectError, DetectResult};
pub use faces::{face_distance, match_faces, Face, FaceMatch, FaceRecognition, KnownFace};
pub use preprocess::{preprocess, FrameInfo, NormalizedFrame, DEFAULT_INPUT_SIZE};
pub use tracker::{track, ObjectTracker, Track, TrackOptions, TrackedFrame, Velocity};
