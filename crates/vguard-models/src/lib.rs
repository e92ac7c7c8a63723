//! Shared data models for the VideoGuard analysis core.
//!
//! This crate provides Serde-serializable types for:
//! - Processing jobs, options and stage timings
//! - Video identity and probed metadata
//! - Detections, threat levels and per-video reports
//! - Inference model descriptors
//! - Live camera feed frames and settings

pub mod detection;
pub mod job;
pub mod live;
pub mod model;
pub mod report;
pub mod video;

// Re-export common types
pub use detection::{BoundingBox, Detection, DetectionCategories, ThreatLevel};
pub use job::{JobId, JobStage, JobStatus, ProcessingJob, ProcessingOptions, StageTiming};
pub use live::{FeedSettings, LiveFrame};
pub use model::{BackendKind, ModelDescriptor, ModelKind, ModelSpeed};
pub use report::{DetectionReport, FrameDetections};
pub use video::{VideoId, VideoMetadata};
