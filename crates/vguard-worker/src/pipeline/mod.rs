//! Video processing pipeline.
//!
//! A submitted video is probed synchronously, then processed in the
//! background through frame extraction, thumbnail generation and threat
//! detection. Stages are gated by the job's [`ProcessingOptions`]; progress
//! is published to subscribers as each stage advances:
//!
//! | Stage               | Progress   |
//! |---------------------|------------|
//! | Frame extraction    | 0 → 40     |
//! | Thumbnails          | +20, ≤ 60  |
//! | Threat detection    | 60 → 100   |

mod layout;
mod tracker;

pub use layout::{OutputLayout, REPORT_FILE};
pub use tracker::JobTracker;

use futures::stream::{self, StreamExt};
use futures::future::try_join_all;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::{watch, Semaphore};
use tracing::{debug, info, warn, Instrument};

use vguard_detect::ThreatDetector;
use vguard_media::{
    thumbnail_file_name, thumbnail_timestamps, FrameExtractionRequest, MediaError, MediaToolkit,
};
use vguard_models::{
    DetectionCategories, DetectionReport, FrameDetections, JobStage, ProcessingJob,
    ProcessingOptions, VideoId, VideoMetadata,
};

use crate::config::PipelineConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::retry_if;
use crate::store::JobStore;

const FRAMES_PROGRESS_END: f64 = 40.0;
const THUMBNAILS_PROGRESS_STEP: u8 = 20;
const THUMBNAILS_PROGRESS_END: u8 = 60;
const DETECTION_PROGRESS_START: u8 = 60;

/// Orchestrates processing jobs for uploaded videos.
pub struct VideoPipeline {
    config: PipelineConfig,
    media: Arc<dyn MediaToolkit>,
    detector: ThreatDetector,
    store: Arc<dyn JobStore>,
    jobs: RwLock<HashMap<VideoId, JobTracker>>,
    job_permits: Arc<Semaphore>,
}

impl VideoPipeline {
    pub fn new(
        config: PipelineConfig,
        media: Arc<dyn MediaToolkit>,
        detector: ThreatDetector,
        store: Arc<dyn JobStore>,
    ) -> Arc<Self> {
        let job_permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Arc::new(Self {
            config,
            media,
            detector,
            store,
            jobs: RwLock::new(HashMap::new()),
            job_permits,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Artifact directories of a video.
    pub fn layout(&self, video_id: &VideoId) -> OutputLayout {
        OutputLayout::new(&self.config.output_dir, video_id)
    }

    fn tracker(&self, video_id: &VideoId) -> Option<JobTracker> {
        self.jobs
            .read()
            .ok()
            .and_then(|jobs| jobs.get(video_id).cloned())
    }

    /// Whether `job` is still the registered job of its video.
    fn is_current(&self, job: &ProcessingJob) -> bool {
        self.tracker(&job.video_id)
            .map(|t| t.snapshot().id == job.id)
            .unwrap_or(false)
    }

    /// Register a job, probe the source and start background processing.
    ///
    /// Returns the job snapshot after probing. A probe failure yields a
    /// `failed` job rather than an error; invalid input is rejected with
    /// [`WorkerError::Validation`].
    pub async fn submit(
        self: &Arc<Self>,
        video_id: VideoId,
        source_path: impl Into<PathBuf>,
        options: ProcessingOptions,
    ) -> WorkerResult<ProcessingJob> {
        options.validate().map_err(WorkerError::validation)?;
        if !video_id.is_path_safe() {
            return Err(WorkerError::validation(format!(
                "video id '{}' is not a safe path component",
                video_id
            )));
        }

        let job = ProcessingJob::new(video_id.clone(), source_path, options);
        let tracker = JobTracker::new(job.clone());
        {
            let mut jobs = self
                .jobs
                .write()
                .map_err(|_| WorkerError::processing("job table poisoned"))?;
            if let Some(existing) = jobs.get(&video_id) {
                if !existing.is_terminal() {
                    return Err(WorkerError::validation(format!(
                        "video '{}' is already being processed",
                        video_id
                    )));
                }
            }
            jobs.insert(video_id.clone(), tracker.clone());
        }

        metrics::record_job_submitted();
        let logger = JobLogger::new(&job.id, &video_id, "video_analysis");
        logger.log_start(&job.source_path.display().to_string());

        logger.log_stage_start(JobStage::Probe);
        tracker.begin_stage(JobStage::Probe);
        let probe_config = self.config.media_retry.named("probe");
        let probed = retry_if(&probe_config, MediaError::is_transient, || {
            self.media.probe(&job.source_path)
        })
        .await;
        tracker.finish_stage(JobStage::Probe);

        let metadata = match probed {
            Ok(metadata) => metadata,
            Err(e) => {
                logger.log_error(&format!("probe failed: {}", e));
                tracker.fail(format!("Failed to probe video: {}", e));
                self.finish(&tracker, &logger, Instant::now()).await;
                return Ok(tracker.snapshot());
            }
        };

        info!(
            video_id = %video_id,
            duration = metadata.duration,
            width = metadata.width,
            height = metadata.height,
            estimated_secs = metadata.estimated_processing_secs(),
            "Video probed"
        );
        tracker.set_metadata(metadata.clone());
        logger.log_stage_complete(JobStage::Probe, tracker.progress());

        let snapshot = tracker.snapshot();
        let pipeline = Arc::clone(self);
        let span = logger.create_span();
        tokio::spawn(
            async move {
                pipeline.run_job(tracker, logger, metadata).await;
            }
            .instrument(span),
        );

        Ok(snapshot)
    }

    async fn run_job(&self, tracker: JobTracker, logger: JobLogger, metadata: VideoMetadata) {
        let _permit = match Arc::clone(&self.job_permits).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                tracker.fail("Pipeline is shutting down");
                self.finish(&tracker, &logger, Instant::now()).await;
                return;
            }
        };

        let started = Instant::now();
        match self.run_stages(&tracker, &logger, &metadata).await {
            Ok(()) => {
                tracker.complete();
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                tracker.fail(e.to_string());
            }
        }
        self.finish(&tracker, &logger, started).await;
    }

    /// Persist the terminal snapshot and record metrics.
    async fn finish(&self, tracker: &JobTracker, logger: &JobLogger, started: Instant) {
        let job = tracker.snapshot();
        let succeeded = job.error.is_none();
        metrics::record_job_finished(succeeded, started.elapsed().as_secs_f64());

        if succeeded {
            logger.log_completion(&format!(
                "{} frames, {} thumbnails, {} frames with detections",
                job.frames_extracted,
                job.thumbnails_generated,
                job.report.as_ref().map(|r| r.threats_detected).unwrap_or(0)
            ));
        }

        // A job deleted while running must not reappear in the store.
        if !self.is_current(&job) {
            debug!(job_id = %job.id, "Job was deleted before finishing; not persisting");
            return;
        }
        if let Err(e) = self.store.put(&job).await {
            logger.log_warning(&format!("failed to persist job: {}", e));
        }
    }

    async fn run_stages(
        &self,
        tracker: &JobTracker,
        logger: &JobLogger,
        metadata: &VideoMetadata,
    ) -> WorkerResult<()> {
        let job = tracker.snapshot();
        let layout = self.layout(&job.video_id);
        let options = &job.options;

        // A previous job for this video may have left a report behind.
        remove_dir_if_exists(&layout.analysis_dir()).await?;

        let frames = if options.extract_frames {
            self.stage(tracker, logger, JobStage::FrameExtraction, || {
                self.extract_frames(tracker, &job.source_path, &layout, options.frame_rate, metadata)
            })
            .await?
        } else {
            logger.log_stage_skipped(JobStage::FrameExtraction);
            Vec::new()
        };

        if options.generate_thumbnails {
            self.stage(tracker, logger, JobStage::Thumbnails, || {
                self.generate_thumbnails(tracker, &job.source_path, &layout, metadata)
            })
            .await?;
        } else {
            logger.log_stage_skipped(JobStage::Thumbnails);
        }

        if options.detect_threats {
            self.stage(tracker, logger, JobStage::ThreatDetection, || {
                self.detect_threats(tracker, &job.video_id, &layout, &frames, options.frame_rate)
            })
            .await?;
        } else {
            logger.log_stage_skipped(JobStage::ThreatDetection);
        }

        Ok(())
    }

    async fn stage<T, F, Fut>(
        &self,
        tracker: &JobTracker,
        logger: &JobLogger,
        stage: JobStage,
        run: F,
    ) -> WorkerResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = WorkerResult<T>>,
    {
        let started = Instant::now();
        logger.log_stage_start(stage);
        tracker.begin_stage(stage);
        let result = run().await;
        tracker.finish_stage(stage);
        metrics::record_stage(stage.as_str(), started.elapsed().as_secs_f64());
        if result.is_ok() {
            logger.log_stage_complete(stage, tracker.progress());
        }
        result
    }

    async fn extract_frames(
        &self,
        tracker: &JobTracker,
        source: &Path,
        layout: &OutputLayout,
        frame_rate: f64,
        metadata: &VideoMetadata,
    ) -> WorkerResult<Vec<PathBuf>> {
        let output_dir = layout.frames_dir();
        remove_dir_if_exists(&output_dir).await?;
        tokio::fs::create_dir_all(&output_dir).await?;

        let request = FrameExtractionRequest {
            source: source.to_path_buf(),
            frame_rate,
            output_dir,
            duration_secs: metadata.duration,
        };

        let progress_tracker = tracker.clone();
        let on_progress = Box::new(move |pct: f64| {
            let progress = (pct * 0.4).clamp(0.0, FRAMES_PROGRESS_END);
            progress_tracker.set_progress(progress as u8);
        });

        let frames = self.media.extract_frames(&request, on_progress).await?;
        tracker.set_frames_extracted(frames.len() as u32);
        tracker.set_progress(FRAMES_PROGRESS_END as u8);
        Ok(frames)
    }

    async fn generate_thumbnails(
        &self,
        tracker: &JobTracker,
        source: &Path,
        layout: &OutputLayout,
        metadata: &VideoMetadata,
    ) -> WorkerResult<()> {
        let output_dir = layout.thumbnails_dir();
        tokio::fs::create_dir_all(&output_dir).await?;

        let timestamps = thumbnail_timestamps(metadata.duration, self.config.thumbnail_count);
        let permits = Arc::new(Semaphore::new(self.config.max_media_processes.max(1)));
        let retry = self.config.media_retry.named("thumbnail");

        let tasks = timestamps.iter().enumerate().map(|(index, &timestamp)| {
            let permits = Arc::clone(&permits);
            let output = output_dir.join(thumbnail_file_name(index));
            let retry = &retry;
            async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| WorkerError::processing("thumbnail permits closed"))?;
                retry_if(retry, MediaError::is_transient, || {
                    self.media.extract_frame(source, timestamp, &output)
                })
                .await?;
                Ok::<_, WorkerError>(())
            }
        });
        try_join_all(tasks).await?;

        tracker.set_thumbnails_generated(timestamps.len() as u32);
        let progress = tracker
            .progress()
            .saturating_add(THUMBNAILS_PROGRESS_STEP)
            .min(THUMBNAILS_PROGRESS_END);
        tracker.set_progress(progress);
        Ok(())
    }

    async fn detect_threats(
        &self,
        tracker: &JobTracker,
        video_id: &VideoId,
        layout: &OutputLayout,
        frames: &[PathBuf],
        frame_rate: f64,
    ) -> WorkerResult<()> {
        let started = Instant::now();
        tracker.set_progress(DETECTION_PROGRESS_START);

        let backend = self.detector.ensure_ready().await?;
        debug!(backend = %backend, frames = frames.len(), "Starting threat detection");

        let categories = DetectionCategories::all();
        let total = frames.len();
        let mut analyzed = stream::iter(frames.to_vec().into_iter().enumerate())
            .map(|(index, path)| {
                let categories = categories.clone();
                async move {
                    let data = tokio::fs::read(&path).await?;
                    let timestamp = index as f64 / frame_rate;
                    let analysis = self
                        .detector
                        .analyze_frame(&data, &categories, Some((timestamp * 1000.0).round() as i64))
                        .await?;
                    Ok::<_, WorkerError>(FrameDetections {
                        frame: path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        frame_index: index as u32,
                        timestamp,
                        detections: analysis.detections,
                    })
                }
            })
            .buffered(self.config.max_detection_workers.max(1));

        let mut results = Vec::with_capacity(total);
        while let Some(result) = analyzed.next().await {
            results.push(result?);
            let span = f64::from(100 - DETECTION_PROGRESS_START);
            let progress = DETECTION_PROGRESS_START as f64 + span * results.len() as f64 / total as f64;
            tracker.set_progress(progress as u8);
        }

        let report = DetectionReport::new(
            video_id.clone(),
            total as u32,
            results,
            started.elapsed().as_millis() as u64,
        );

        tokio::fs::create_dir_all(layout.analysis_dir()).await?;
        let json = serde_json::to_vec_pretty(&report)?;
        tokio::fs::write(layout.report_path(), json).await?;

        info!(
            video_id = %video_id,
            total_frames = report.total_frames,
            threats_detected = report.threats_detected,
            processing_time_ms = report.processing_time_ms,
            "Threat analysis written"
        );

        tracker.set_report(report);
        tracker.set_progress(100);
        Ok(())
    }

    /// Current state of a video's job.
    pub async fn status(&self, video_id: &VideoId) -> WorkerResult<ProcessingJob> {
        if let Some(tracker) = self.tracker(video_id) {
            return Ok(tracker.snapshot());
        }
        self.store
            .get(video_id)
            .await?
            .ok_or_else(|| WorkerError::not_found(format!("no job for video '{}'", video_id)))
    }

    /// Snapshots of all in-memory jobs, oldest first.
    pub fn list(&self) -> Vec<ProcessingJob> {
        let mut jobs: Vec<ProcessingJob> = self
            .jobs
            .read()
            .map(|jobs| jobs.values().map(JobTracker::snapshot).collect())
            .unwrap_or_default();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Receive every state change of a video's job.
    pub fn subscribe(&self, video_id: &VideoId) -> WorkerResult<watch::Receiver<ProcessingJob>> {
        self.tracker(video_id)
            .map(|t| t.subscribe())
            .ok_or_else(|| WorkerError::not_found(format!("no job for video '{}'", video_id)))
    }

    /// Wait until a video's job is completed or failed.
    pub async fn wait(&self, video_id: &VideoId) -> WorkerResult<ProcessingJob> {
        let mut rx = self.subscribe(video_id)?;
        let finished = rx
            .wait_for(ProcessingJob::is_terminal)
            .await
            .map(|job| job.clone())
            .ok();
        Ok(finished.unwrap_or_else(|| rx.borrow().clone()))
    }

    /// Remove a video's artifacts and job record.
    ///
    /// Idempotent. A running job is not cancelled, but its final state is
    /// not persisted.
    pub async fn delete(&self, video_id: &VideoId) -> WorkerResult<()> {
        if !video_id.is_path_safe() {
            return Err(WorkerError::validation(format!(
                "video id '{}' is not a safe path component",
                video_id
            )));
        }

        if let Ok(mut jobs) = self.jobs.write() {
            jobs.remove(video_id);
        }

        let root = self.layout(video_id).root().to_path_buf();
        remove_dir_if_exists(&root).await?;
        debug!(path = %root.display(), "Removed video artifacts");

        self.store.remove(video_id).await?;
        info!(video_id = %video_id, "Video deleted");
        Ok(())
    }

    /// Grab the frame at `timestamp` seconds of a known video as JPEG bytes.
    pub async fn thumbnail_at(&self, video_id: &VideoId, timestamp: f64) -> WorkerResult<Vec<u8>> {
        if !timestamp.is_finite() || timestamp < 0.0 {
            return Err(WorkerError::validation(format!(
                "invalid timestamp {}",
                timestamp
            )));
        }

        let job = self.status(video_id).await?;
        if let Some(metadata) = &job.metadata {
            if timestamp > metadata.duration {
                return Err(WorkerError::validation(format!(
                    "timestamp {:.2}s is past the end of the video ({:.2}s)",
                    timestamp, metadata.duration
                )));
            }
        }

        let layout = self.layout(video_id);
        tokio::fs::create_dir_all(layout.thumbnails_dir()).await?;
        let output = layout.snapshot_path(timestamp);

        let retry = self.config.media_retry.named("snapshot");
        retry_if(&retry, MediaError::is_transient, || {
            self.media.extract_frame(&job.source_path, timestamp, &output)
        })
        .await?;

        match tokio::fs::read(&output).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(video_id = %video_id, timestamp, "Frame grab produced no output");
                Err(WorkerError::not_found(format!(
                    "no frame at {:.2}s for video '{}'",
                    timestamp, video_id
                )))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// `remove_dir_all` that treats a missing directory as already removed.
async fn remove_dir_if_exists(dir: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryJobStore;
    use async_trait::async_trait;
    use vguard_detect::testing::{registry_with, ScriptedFactory};
    use vguard_detect::DetectorConfig;
    use vguard_media::{MediaResult, ProgressCallback};
    use vguard_models::JobStatus;

    struct UnreadableMedia;

    #[async_trait]
    impl MediaToolkit for UnreadableMedia {
        async fn probe(&self, path: &Path) -> MediaResult<VideoMetadata> {
            Err(MediaError::FileNotFound(path.to_path_buf()))
        }

        async fn extract_frames(
            &self,
            _request: &FrameExtractionRequest,
            _on_progress: ProgressCallback,
        ) -> MediaResult<Vec<PathBuf>> {
            Ok(Vec::new())
        }

        async fn extract_frame(&self, _path: &Path, _timestamp: f64, _output: &Path) -> MediaResult<()> {
            Ok(())
        }
    }

    fn pipeline(store: Arc<dyn JobStore>) -> Arc<VideoPipeline> {
        let registry = registry_with(ScriptedFactory::new());
        let detector = ThreatDetector::new(registry, DetectorConfig::default());
        let config = PipelineConfig {
            output_dir: std::env::temp_dir().join("vguard-pipeline-unit"),
            ..PipelineConfig::default()
        };
        VideoPipeline::new(config, Arc::new(UnreadableMedia), detector, store)
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let pipeline = pipeline(Arc::new(MemoryJobStore::new()));
        let options = ProcessingOptions {
            frame_rate: 0.0,
            ..ProcessingOptions::default()
        };

        let err = pipeline
            .submit(VideoId::from("cam"), "/videos/cam.mp4", options)
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Validation(_)));
        assert!(pipeline.list().is_empty());
    }

    #[tokio::test]
    async fn test_unsafe_video_id_rejected() {
        let pipeline = pipeline(Arc::new(MemoryJobStore::new()));
        let err = pipeline
            .submit(VideoId::from("../etc"), "/videos/x.mp4", ProcessingOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Validation(_)));
    }

    #[tokio::test]
    async fn test_probe_failure_fails_job() {
        let store = Arc::new(MemoryJobStore::new());
        let pipeline = pipeline(store.clone());
        let video_id = VideoId::from("missing");

        let job = pipeline
            .submit(video_id.clone(), "/videos/missing.mp4", ProcessingOptions::default())
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error.as_deref().unwrap().contains("probe"));
        assert!(job.metadata.is_none());
        assert_eq!(store.get(&video_id).await.unwrap().unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_unknown_video_not_found() {
        let pipeline = pipeline(Arc::new(MemoryJobStore::new()));
        let unknown = VideoId::from("nobody");

        assert!(matches!(pipeline.status(&unknown).await, Err(WorkerError::NotFound(_))));
        assert!(matches!(pipeline.subscribe(&unknown), Err(WorkerError::NotFound(_))));
        assert!(matches!(
            pipeline.thumbnail_at(&unknown, 1.0).await,
            Err(WorkerError::NotFound(_))
        ));
        pipeline.delete(&unknown).await.unwrap();
    }
}
