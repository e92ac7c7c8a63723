//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use vguard_detect::DetectorConfig;
use vguard_inference::{BackendMode, DEFAULT_IDLE_THRESHOLD};
use vguard_models::live::DEFAULT_TARGET_FPS;

use crate::retry::RetryConfig;

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

/// Video processing pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root of per-video artifact directories
    pub output_dir: PathBuf,
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Frames analyzed concurrently within one job
    pub max_detection_workers: usize,
    /// Maximum concurrent ffmpeg processes per job
    pub max_media_processes: usize,
    /// Thumbnails generated per video
    pub thumbnail_count: usize,
    /// Retry policy for transient media failures
    pub media_retry: RetryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("/tmp/vguard"),
            max_concurrent_jobs: 2,
            max_detection_workers: 4,
            max_media_processes: 4,
            thumbnail_count: 10,
            media_retry: RetryConfig::new("media"),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: std::env::var("VGUARD_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_concurrent_jobs: env_parse("VGUARD_MAX_JOBS")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            max_detection_workers: env_parse("VGUARD_MAX_DETECTION_WORKERS")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_detection_workers),
            max_media_processes: env_parse("VGUARD_MAX_MEDIA_PROCESSES")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_media_processes),
            thumbnail_count: defaults.thumbnail_count,
            media_retry: RetryConfig::new("media")
                .with_max_retries(env_parse("VGUARD_MEDIA_RETRIES").unwrap_or(defaults.media_retry.max_retries)),
        }
    }
}

/// Model registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub backend_mode: BackendMode,
    /// Directory holding `<model_id>.onnx` artifacts
    pub model_dir: PathBuf,
    /// Idle time after which non-default models are unloaded
    pub idle_threshold: Duration,
    /// How often idle models are swept
    pub maintenance_interval: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            backend_mode: BackendMode::Auto,
            model_dir: PathBuf::from("./models"),
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
            maintenance_interval: Duration::from_secs(300),
        }
    }
}

impl RegistryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            backend_mode: env_parse("VGUARD_BACKEND_MODE").unwrap_or(defaults.backend_mode),
            model_dir: std::env::var("VGUARD_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            idle_threshold: env_parse("VGUARD_MODEL_IDLE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_threshold),
            maintenance_interval: env_parse("VGUARD_MODEL_MAINTENANCE_SECS")
                .filter(|&s: &u64| s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.maintenance_interval),
        }
    }
}

/// Live feed configuration.
#[derive(Debug, Clone)]
pub struct LiveFeedConfig {
    /// Video looped by live feeds; synthetic frames when unset
    pub sample_video: Option<PathBuf>,
    pub default_fps: u32,
    /// Capacity of channel-backed frame sinks
    pub channel_capacity: usize,
}

impl Default for LiveFeedConfig {
    fn default() -> Self {
        Self {
            sample_video: None,
            default_fps: DEFAULT_TARGET_FPS,
            channel_capacity: 16,
        }
    }
}

impl LiveFeedConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sample_video: std::env::var("VGUARD_SAMPLE_VIDEO")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            default_fps: env_parse("VGUARD_LIVE_FPS")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.default_fps),
            channel_capacity: env_parse("VGUARD_LIVE_CHANNEL_CAPACITY")
                .filter(|&n| n > 0)
                .unwrap_or(defaults.channel_capacity),
        }
    }
}

/// Full worker configuration.
#[derive(Debug, Clone, Default)]
pub struct WorkerConfig {
    pub pipeline: PipelineConfig,
    pub registry: RegistryConfig,
    pub detector: DetectorConfig,
    pub live: LiveFeedConfig,
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            pipeline: PipelineConfig::from_env(),
            registry: RegistryConfig::from_env(),
            detector: DetectorConfig::from_env(),
            live: LiveFeedConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.pipeline.max_concurrent_jobs, 2);
        assert_eq!(config.pipeline.thumbnail_count, 10);
        assert_eq!(config.pipeline.media_retry.max_retries, 2);
        assert_eq!(config.registry.backend_mode, BackendMode::Auto);
        assert_eq!(config.registry.idle_threshold, Duration::from_secs(1800));
        assert_eq!(config.live.default_fps, 5);
        assert!(config.live.sample_video.is_none());
        assert_eq!(config.detector.input_size, 416);
    }
}
