//! Processing job definitions and lifecycle transitions.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::{DetectionReport, VideoId, VideoMetadata};

/// Upper bound for `ProcessingOptions::frame_rate`.
pub const MAX_FRAME_RATE: f64 = 60.0;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is actively being processed
    #[default]
    Processing,
    /// Job completed successfully
    Completed,
    /// Job failed with an error
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    Probe,
    FrameExtraction,
    Thumbnails,
    ThreatDetection,
}

impl JobStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStage::Probe => "probe",
            JobStage::FrameExtraction => "frame_extraction",
            JobStage::Thumbnails => "thumbnails",
            JobStage::ThreatDetection => "threat_detection",
        }
    }
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Start/finish timestamps of one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StageTiming {
    pub stage: JobStage,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl StageTiming {
    /// Stage duration in milliseconds, once finished.
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }
}

/// Options recognized by `submit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProcessingOptions {
    /// Sample frames from the source
    pub extract_frames: bool,
    /// Generate evenly spaced thumbnails
    pub generate_thumbnails: bool,
    /// Run extracted frames through the detection engine
    pub detect_threats: bool,
    /// Frames per second of source to sample, in (0, 60]
    pub frame_rate: f64,
}

impl Default for ProcessingOptions {
    fn default() -> Self {
        Self {
            extract_frames: true,
            generate_thumbnails: true,
            detect_threats: true,
            frame_rate: 1.0,
        }
    }
}

impl ProcessingOptions {
    /// Validate option ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !self.frame_rate.is_finite() || self.frame_rate <= 0.0 {
            return Err(format!(
                "frame_rate must be greater than 0, got {}",
                self.frame_rate
            ));
        }

        if self.frame_rate > MAX_FRAME_RATE {
            return Err(format!(
                "frame_rate must not exceed {}, got {}",
                MAX_FRAME_RATE, self.frame_rate
            ));
        }

        Ok(())
    }
}

/// A video processing job and its observable progress.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ProcessingJob {
    /// Unique job ID
    pub id: JobId,

    /// Video being processed
    pub video_id: VideoId,

    /// Source file path
    pub source_path: PathBuf,

    /// Current status
    pub status: JobStatus,

    /// Progress (0-100)
    pub progress: u8,

    /// Stage timings, in execution order
    #[serde(default)]
    pub stages: Vec<StageTiming>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Completed (or failed) at timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Probed source metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<VideoMetadata>,

    /// Advisory processing-time estimate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_processing_secs: Option<u64>,

    /// Number of frames written by frame extraction
    #[serde(default)]
    pub frames_extracted: u32,

    /// Number of thumbnails written
    #[serde(default)]
    pub thumbnails_generated: u32,

    /// Threat report (when detection ran)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<DetectionReport>,

    /// Options the job was submitted with
    pub options: ProcessingOptions,
}

impl ProcessingJob {
    /// Create a new job in the processing state.
    pub fn new(video_id: VideoId, source_path: impl Into<PathBuf>, options: ProcessingOptions) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            video_id,
            source_path: source_path.into(),
            status: JobStatus::Processing,
            progress: 0,
            stages: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
            metadata: None,
            estimated_processing_secs: None,
            frames_extracted: 0,
            thumbnails_generated: 0,
            report: None,
            options,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Raise progress. Lower values and updates after a terminal transition
    /// are ignored; returns whether the job changed.
    pub fn set_progress(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if self.is_terminal() || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        self.updated_at = Utc::now();
        true
    }

    /// Record probed metadata and the derived estimate.
    pub fn set_metadata(&mut self, metadata: VideoMetadata) {
        if self.is_terminal() {
            return;
        }
        self.estimated_processing_secs = Some(metadata.estimated_processing_secs());
        self.metadata = Some(metadata);
        self.updated_at = Utc::now();
    }

    /// Mark a stage as started.
    pub fn begin_stage(&mut self, stage: JobStage) {
        if self.is_terminal() {
            return;
        }
        let now = Utc::now();
        self.stages.push(StageTiming {
            stage,
            started_at: now,
            finished_at: None,
        });
        self.updated_at = now;
    }

    /// Mark the most recent run of a stage as finished.
    pub fn finish_stage(&mut self, stage: JobStage) {
        if self.is_terminal() {
            return;
        }
        let now = Utc::now();
        if let Some(timing) = self
            .stages
            .iter_mut()
            .rev()
            .find(|t| t.stage == stage && t.finished_at.is_none())
        {
            timing.finished_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Timing recorded for a stage, if it ran.
    pub fn stage(&self, stage: JobStage) -> Option<&StageTiming> {
        self.stages.iter().find(|t| t.stage == stage)
    }

    /// Mark job as completed. Returns false if the job was already terminal.
    pub fn complete(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        let now = Utc::now();
        self.status = JobStatus::Completed;
        self.progress = 100;
        self.completed_at = Some(now);
        self.updated_at = now;
        true
    }

    /// Mark job as failed with an error message. Returns false if the job
    /// was already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        let now = Utc::now();
        self.status = JobStatus::Failed;
        self.error = Some(error.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> ProcessingJob {
        ProcessingJob::new(VideoId::from("v1"), "/tmp/v1.mp4", ProcessingOptions::default())
    }

    #[test]
    fn test_options_defaults() {
        let opts: ProcessingOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.extract_frames && opts.generate_thumbnails && opts.detect_threats);
        assert_eq!(opts.frame_rate, 1.0);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_options_reject_bad_frame_rate() {
        for rate in [0.0, -1.0, 61.0, f64::NAN] {
            let opts = ProcessingOptions {
                frame_rate: rate,
                ..Default::default()
            };
            assert!(opts.validate().is_err(), "rate {} accepted", rate);
        }
        let max = ProcessingOptions {
            frame_rate: 60.0,
            ..Default::default()
        };
        assert!(max.validate().is_ok());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut job = job();
        assert!(job.set_progress(40));
        assert!(!job.set_progress(20));
        assert_eq!(job.progress, 40);
        assert!(job.set_progress(250));
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn test_single_terminal_transition() {
        let mut job = job();
        job.set_progress(30);
        assert!(job.fail("probe failed"));
        assert!(!job.complete());
        assert!(!job.set_progress(90));
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, 30);
        assert_eq!(job.error.as_deref(), Some("probe failed"));
    }

    #[test]
    fn test_stage_timings() {
        let mut job = job();
        job.begin_stage(JobStage::Probe);
        job.finish_stage(JobStage::Probe);
        job.begin_stage(JobStage::FrameExtraction);

        assert!(job.stage(JobStage::Probe).unwrap().finished_at.is_some());
        assert!(job.stage(JobStage::FrameExtraction).unwrap().finished_at.is_none());
        assert!(job.stage(JobStage::Thumbnails).is_none());
    }
}
