//! Live frame sources producing encoded JPEG frames.

use async_trait::async_trait;
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use std::collections::VecDeque;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner, PIPE_STDOUT};
use crate::error::{MediaError, MediaResult};
use crate::mjpeg::MjpegSplitter;

/// Synthetic frame dimensions.
pub const SYNTHETIC_WIDTH: u32 = 640;
pub const SYNTHETIC_HEIGHT: u32 = 480;
/// Synthetic frame fill color.
pub const SYNTHETIC_GRAY: [u8; 3] = [50, 50, 50];

const READ_CHUNK: usize = 64 * 1024;

/// A pull-based stream of JPEG frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the source is exhausted.
    async fn next_frame(&mut self) -> MediaResult<Option<Vec<u8>>>;

    /// Release the underlying producer.
    async fn close(&mut self);
}

/// Opens frame sources for live feeds.
pub trait FrameSourceFactory: Send + Sync {
    fn open(&self, fps: u32) -> MediaResult<Box<dyn FrameSource>>;
}

/// Encode an image as JPEG.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> MediaResult<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    image.write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))?;
    Ok(cursor.into_inner())
}

/// Loops a sample video through ffmpeg in real time, emitting MJPEG frames.
pub struct FfmpegFrameSource {
    child: Child,
    stdout: ChildStdout,
    splitter: MjpegSplitter,
    pending: VecDeque<Vec<u8>>,
    chunk: Vec<u8>,
}

impl FfmpegFrameSource {
    /// Spawn ffmpeg reading `sample_video` at native speed, looping forever.
    pub fn spawn(sample_video: &Path, fps: u32) -> MediaResult<Self> {
        if !sample_video.exists() {
            return Err(MediaError::FileNotFound(sample_video.to_path_buf()));
        }

        let cmd = FfmpegCommand::new(sample_video, PIPE_STDOUT)
            .realtime()
            .loop_input()
            .format("image2pipe")
            .video_codec("mjpeg")
            .quality(2)
            .frame_rate(fps.max(1))
            .without_progress();

        let mut child = FfmpegRunner::new().spawn_piped(&cmd)?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| MediaError::internal("FFmpeg stdout not captured"))?;

        info!(sample = %sample_video.display(), fps, "Started ffmpeg frame source");

        Ok(Self {
            child,
            stdout,
            splitter: MjpegSplitter::default(),
            pending: VecDeque::new(),
            chunk: vec![0u8; READ_CHUNK],
        })
    }
}

#[async_trait]
impl FrameSource for FfmpegFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Vec<u8>>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }

            let n = self.stdout.read(&mut self.chunk).await?;
            if n == 0 {
                debug!("ffmpeg frame source reached end of stream");
                return Ok(None);
            }
            self.pending.extend(self.splitter.push(&self.chunk[..n]));
        }
    }

    async fn close(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// Gray frames on a fixed timer, used when no sample video is configured.
pub struct SyntheticFrameSource {
    frame: Vec<u8>,
    interval: tokio::time::Interval,
}

impl SyntheticFrameSource {
    pub fn new(fps: u32) -> MediaResult<Self> {
        let image = RgbImage::from_pixel(SYNTHETIC_WIDTH, SYNTHETIC_HEIGHT, Rgb(SYNTHETIC_GRAY));
        let frame = encode_jpeg(&DynamicImage::ImageRgb8(image), 80)?;

        let period = Duration::from_millis(1000 / fps.max(1) as u64);
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        Ok(Self { frame, interval })
    }
}

#[async_trait]
impl FrameSource for SyntheticFrameSource {
    async fn next_frame(&mut self) -> MediaResult<Option<Vec<u8>>> {
        self.interval.tick().await;
        Ok(Some(self.frame.clone()))
    }

    async fn close(&mut self) {}
}

/// Chooses the ffmpeg source when a sample video is configured, the
/// synthetic source otherwise.
#[derive(Debug, Clone, Default)]
pub struct ConfiguredFrameSources {
    sample_video: Option<PathBuf>,
}

impl ConfiguredFrameSources {
    pub fn new(sample_video: Option<PathBuf>) -> Self {
        Self { sample_video }
    }
}

impl FrameSourceFactory for ConfiguredFrameSources {
    fn open(&self, fps: u32) -> MediaResult<Box<dyn FrameSource>> {
        match &self.sample_video {
            Some(path) => Ok(Box::new(FfmpegFrameSource::spawn(path, fps)?)),
            None => Ok(Box::new(SyntheticFrameSource::new(fps)?)),
        }
    }
}
