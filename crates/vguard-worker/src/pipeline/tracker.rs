//! Shared, observable job state.

use std::sync::Arc;
use tokio::sync::watch;
use vguard_models::{DetectionReport, JobStage, ProcessingJob, VideoMetadata};

/// Handle to a job's state. Every mutation goes through the model's guarded
/// transitions and is published to subscribers.
#[derive(Debug, Clone)]
pub struct JobTracker {
    tx: Arc<watch::Sender<ProcessingJob>>,
}

impl JobTracker {
    pub fn new(job: ProcessingJob) -> Self {
        let (tx, _) = watch::channel(job);
        Self { tx: Arc::new(tx) }
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> ProcessingJob {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ProcessingJob> {
        self.tx.subscribe()
    }

    pub fn is_terminal(&self) -> bool {
        self.tx.borrow().is_terminal()
    }

    fn modify(&self, f: impl FnOnce(&mut ProcessingJob) -> bool) -> bool {
        self.tx.send_if_modified(f)
    }

    pub fn set_progress(&self, progress: u8) -> bool {
        self.modify(|job| job.set_progress(progress))
    }

    /// Current progress.
    pub fn progress(&self) -> u8 {
        self.tx.borrow().progress
    }

    pub fn set_metadata(&self, metadata: VideoMetadata) {
        self.modify(|job| {
            job.set_metadata(metadata);
            true
        });
    }

    pub fn begin_stage(&self, stage: JobStage) {
        self.modify(|job| {
            job.begin_stage(stage);
            true
        });
    }

    pub fn finish_stage(&self, stage: JobStage) {
        self.modify(|job| {
            job.finish_stage(stage);
            true
        });
    }

    pub fn set_frames_extracted(&self, count: u32) {
        self.modify(|job| {
            if job.is_terminal() {
                return false;
            }
            job.frames_extracted = count;
            true
        });
    }

    pub fn set_thumbnails_generated(&self, count: u32) {
        self.modify(|job| {
            if job.is_terminal() {
                return false;
            }
            job.thumbnails_generated = count;
            true
        });
    }

    pub fn set_report(&self, report: DetectionReport) {
        self.modify(|job| {
            if job.is_terminal() {
                return false;
            }
            job.report = Some(report);
            true
        });
    }

    /// Returns false if the job was already terminal.
    pub fn complete(&self) -> bool {
        self.modify(|job| job.complete())
    }

    /// Returns false if the job was already terminal.
    pub fn fail(&self, error: impl Into<String>) -> bool {
        let error = error.into();
        self.modify(|job| job.fail(error))
    }
}
