//! Threat analysis report produced by the detection stage.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{Detection, ThreatLevel, VideoId};

/// Detections found in one extracted frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameDetections {
    /// Frame file name (e.g. `frame_0003.jpg`)
    pub frame: String,
    /// Zero-based position in extraction order
    pub frame_index: u32,
    /// Media time of the frame in seconds
    pub timestamp: f64,
    pub detections: Vec<Detection>,
}

impl FrameDetections {
    /// Highest threat level among the frame's detections.
    pub fn max_threat_level(&self) -> Option<ThreatLevel> {
        self.detections.iter().map(|d| d.threat_level).max()
    }
}

/// Per-video threat report, written to `analysis/threat_analysis.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionReport {
    pub video_id: VideoId,
    /// Number of frames analyzed
    pub total_frames: u32,
    /// Number of frames with at least one detection
    pub threats_detected: u32,
    /// Frames with non-empty detections, in frame order
    pub detections: Vec<FrameDetections>,
    /// Wall time spent in the detection stage
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl DetectionReport {
    /// Build a report from frame entries, dropping frames without detections.
    pub fn new(
        video_id: VideoId,
        total_frames: u32,
        frames: Vec<FrameDetections>,
        processing_time_ms: u64,
    ) -> Self {
        let detections: Vec<FrameDetections> = frames
            .into_iter()
            .filter(|f| !f.detections.is_empty())
            .collect();

        Self {
            video_id,
            total_frames,
            threats_detected: detections.len() as u32,
            detections,
            processing_time_ms,
            timestamp: Utc::now(),
        }
    }

    /// Count of detections at or above a level, across all frames.
    pub fn count_at_least(&self, level: ThreatLevel) -> usize {
        self.detections
            .iter()
            .flat_map(|f| f.detections.iter())
            .filter(|d| d.threat_level >= level)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BoundingBox;

    fn detection(class: &str, level: ThreatLevel) -> Detection {
        Detection {
            id: format!("det-{}", class),
            class: class.to_string(),
            confidence: 0.9,
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            threat_level: level,
            risk_score: 0.5,
            timestamp: 0,
        }
    }

    #[test]
    fn test_empty_frames_are_dropped() {
        let frames = vec![
            FrameDetections {
                frame: "frame_0001.jpg".into(),
                frame_index: 0,
                timestamp: 0.0,
                detections: vec![],
            },
            FrameDetections {
                frame: "frame_0002.jpg".into(),
                frame_index: 1,
                timestamp: 1.0,
                detections: vec![
                    detection("knife", ThreatLevel::High),
                    detection("person", ThreatLevel::Low),
                ],
            },
        ];

        let report = DetectionReport::new(VideoId::from("v"), 2, frames, 12);
        assert_eq!(report.total_frames, 2);
        assert_eq!(report.threats_detected, 1);
        assert_eq!(report.detections[0].frame_index, 1);
        assert_eq!(report.detections[0].max_threat_level(), Some(ThreatLevel::High));
        assert_eq!(report.count_at_least(ThreatLevel::Medium), 1);
    }
}
