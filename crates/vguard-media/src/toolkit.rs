//! Media toolkit seam used by the processing pipeline.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use vguard_models::VideoMetadata;

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegRunner};
use crate::error::MediaResult;
use crate::progress::ProgressCallback;
use crate::{frames, probe, thumbnail};

/// Parameters of a frame-sampling run.
#[derive(Debug, Clone)]
pub struct FrameExtractionRequest {
    pub source: PathBuf,
    /// Frames per second of source
    pub frame_rate: f64,
    pub output_dir: PathBuf,
    /// Source duration, used to scale progress
    pub duration_secs: f64,
}

/// Probe, sample and single-frame operations over a video file.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Read technical metadata of `path`.
    async fn probe(&self, path: &Path) -> MediaResult<VideoMetadata>;

    /// Sample frames into `request.output_dir`; returns them in order.
    async fn extract_frames(
        &self,
        request: &FrameExtractionRequest,
        on_progress: ProgressCallback,
    ) -> MediaResult<Vec<PathBuf>>;

    /// Write the frame at `timestamp` seconds to `output`.
    async fn extract_frame(&self, path: &Path, timestamp: f64, output: &Path) -> MediaResult<()>;
}

/// [`MediaToolkit`] backed by the `ffmpeg`/`ffprobe` binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    runner: FfmpegRunner,
}

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a per-invocation timeout to ffmpeg runs.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.runner = self.runner.with_timeout(secs);
        self
    }

    /// Verify both binaries are on PATH.
    pub fn check_available() -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> MediaResult<VideoMetadata> {
        probe::probe_video(path).await
    }

    async fn extract_frames(
        &self,
        request: &FrameExtractionRequest,
        on_progress: ProgressCallback,
    ) -> MediaResult<Vec<PathBuf>> {
        frames::extract_frames(
            &self.runner,
            &request.source,
            request.frame_rate,
            &request.output_dir,
            request.duration_secs,
            on_progress,
        )
        .await
    }

    async fn extract_frame(&self, path: &Path, timestamp: f64, output: &Path) -> MediaResult<()> {
        thumbnail::extract_frame(&self.runner, path, timestamp, output).await
    }
}
