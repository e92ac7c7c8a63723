//! Structured job logging utilities.
//!
//! Provides consistent, structured logging for pipeline jobs with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use vguard_models::{JobId, JobStage, VideoId};

/// Job logger for lifecycle events with consistent fields
/// (job id, video id, operation).
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    video_id: String,
    operation: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, video_id: &VideoId, operation: &str) -> Self {
        Self {
            job_id: job_id.to_string(),
            video_id: video_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = %self.operation,
            "Job started: {}", message
        );
    }

    pub fn log_stage_start(&self, stage: JobStage) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            stage = stage.as_str(),
            "Stage started"
        );
    }

    pub fn log_stage_complete(&self, stage: JobStage, progress: u8) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            stage = stage.as_str(),
            progress,
            "Stage completed"
        );
    }

    pub fn log_stage_skipped(&self, stage: JobStage) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            stage = stage.as_str(),
            "Stage skipped"
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = %self.operation,
            "Job warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = %self.operation,
            "Job error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = %self.operation,
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Tracing span covering the job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            video_id = %self.video_id,
            operation = %self.operation
        )
    }
}
