#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for the video analysis pipeline.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeout support via tokio
//! - Frame sampling, single-frame extraction and thumbnail layout
//! - Live MJPEG frame sources (looping sample video or synthetic frames)
//! - The [`MediaToolkit`] seam used by the pipeline

pub mod command;
pub mod error;
pub mod frames;
pub mod mjpeg;
pub mod probe;
pub mod progress;
pub mod source;
pub mod thumbnail;
pub mod toolkit;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{extract_frames, frame_file_name, list_frames, FRAME_PATTERN};
pub use mjpeg::MjpegSplitter;
pub use probe::{parse_probe_output, probe_video};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use source::{
    encode_jpeg, ConfiguredFrameSources, FfmpegFrameSource, FrameSource, FrameSourceFactory,
    SyntheticFrameSource,
};
pub use thumbnail::{extract_frame, thumbnail_file_name, thumbnail_timestamps};
pub use toolkit::{FfmpegToolkit, FrameExtractionRequest, MediaToolkit};
