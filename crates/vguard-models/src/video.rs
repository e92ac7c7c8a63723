//! Video identity and metadata models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of an ingested video asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    /// Generate a new random video ID.
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

    /// Whether the id is usable as a single path component.
    ///
    /// Derived artifacts live under `<output>/<video_id>`, so separators and
    /// parent references are rejected.
    pub fn is_path_safe(&self) -> bool {
        !self.0.is_empty()
            && self.0 != "."
            && self.0 != ".."
            && self
                .0
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    }
}

impl Default for VideoId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for VideoId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Technical metadata of a source video, derived once by the probe stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Bitrate in bits/second
    pub bitrate: u64,
    /// Video codec name
    pub codec: String,
    /// File size in bytes
    pub size: u64,
}

impl VideoMetadata {
    /// Pixel area relative to 1080p.
    pub fn resolution_factor(&self) -> f64 {
        (self.width as f64 * self.height as f64) / (1920.0 * 1080.0)
    }

    /// Advisory processing-time estimate in seconds.
    ///
    /// Two seconds of work per second of source, scaled by pixel area
    /// relative to 1080p. Not enforced anywhere.
    pub fn estimated_processing_secs(&self) -> u64 {
        let base = self.duration.max(0.0) * 2.0;
        (base * self.resolution_factor()).ceil() as u64
    }
}
