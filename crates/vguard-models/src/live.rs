//! Live camera feed models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Detection, DetectionCategories};

/// Default live-feed sampling rate.
pub const DEFAULT_TARGET_FPS: u32 = 5;

/// Per-feed settings supplied to `start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct FeedSettings {
    pub categories: DetectionCategories,
    /// Frames per second to produce
    pub target_fps: u32,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            categories: DetectionCategories::all(),
            target_fps: DEFAULT_TARGET_FPS,
        }
    }
}

impl FeedSettings {
    /// Interval between frames, with a zero rate treated as 1 fps.
    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(1000 / self.target_fps.max(1) as u64)
    }
}

/// A frame delivered to a live-feed subscriber.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveFrame {
    pub camera_id: String,
    /// Monotonic per-session frame counter starting at 0
    pub sequence: u64,
    /// Encoded JPEG bytes
    pub frame: Vec<u8>,
    pub detections: Vec<Detection>,
    pub captured_at: DateTime<Utc>,
}
