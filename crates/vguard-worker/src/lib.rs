//! Video analysis worker.
//!
//! This crate provides:
//! - The video processing pipeline (probe, frames, thumbnails, threat report)
//! - The live camera feed streamer and its frame sinks
//! - Job persistence contract and in-memory store
//! - Configuration, retry and structured job logging

pub mod config;
pub mod error;
pub mod live_feed;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod retry;
pub mod store;

pub use config::{LiveFeedConfig, PipelineConfig, RegistryConfig, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use live_feed::{CallbackSink, ChannelSink, FeedInfo, FrameSink, LiveFeedStreamer};
pub use logging::JobLogger;
pub use pipeline::{JobTracker, OutputLayout, VideoPipeline, REPORT_FILE};
pub use retry::{retry_if, FailureTracker, RetryConfig};
pub use store::{JobStore, MemoryJobStore};
