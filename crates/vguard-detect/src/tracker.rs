//! Multi-frame object tracking.
//!
//! Greedy association: each detection, highest confidence first, takes the
//! closest active track of the same class that overlaps it (IoU) or lies
//! within `max_distance` of it (center distance). Unmatched detections above
//! `min_confidence` start a new track; tracks that receive no detection
//! in a frame become inactive and are not revived.

use serde::{Deserialize, Serialize};
use vguard_models::{BoundingBox, Detection};

/// Association parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackOptions {
    /// Maximum center distance in pixels for an association
    pub max_distance: f64,
    /// Confidence a detection must exceed to start a track
    pub min_confidence: f64,
    /// IoU at or above which boxes associate regardless of distance
    pub iou_threshold: f64,
}

impl Default for TrackOptions {
    fn default() -> Self {
        Self {
            max_distance: 50.0,
            min_confidence: 0.5,
            iou_threshold: 0.3,
        }
    }
}

/// Detections of one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackedFrame {
    /// Frame time in seconds
    pub timestamp: f64,
    pub detections: Vec<Detection>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Velocity {
    /// Pixels per second along x
    pub vx: f64,
    /// Pixels per second along y
    pub vy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: String,
    pub class: String,
    pub bbox: BoundingBox,
    pub velocity: Velocity,
    /// Mean confidence of the associated detections
    pub confidence: f64,
    pub first_seen: f64,
    pub last_seen: f64,
    pub hits: u32,
    pub active: bool,
}

/// Stateful tracker fed one frame at a time.
#[derive(Debug)]
pub struct ObjectTracker {
    options: TrackOptions,
    tracks: Vec<Track>,
    next_track_id: u32,
}

impl ObjectTracker {
    pub fn new(options: TrackOptions) -> Self {
        Self {
            options,
            tracks: Vec::new(),
            next_track_id: 1,
        }
    }

    fn associates(&self, track: &Track, bbox: &BoundingBox) -> Option<f64> {
        let distance = track.bbox.center_distance(bbox);
        let overlapping = track.bbox.iou(bbox) >= self.options.iou_threshold;
        (overlapping || distance <= self.options.max_distance).then_some(distance)
    }

    /// Associate one frame's detections with the current tracks.
    pub fn update(&mut self, frame: &TrackedFrame) {
        let mut order: Vec<&Detection> = frame.detections.iter().collect();
        order.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut updated = vec![false; self.tracks.len()];
        let mut births = Vec::new();

        for det in order {
            let best = self
                .tracks
                .iter()
                .enumerate()
                .filter(|(i, t)| t.active && !updated[*i] && t.class == det.class)
                .filter_map(|(i, t)| self.associates(t, &det.bbox).map(|d| (i, d)))
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match best {
                Some((i, _)) => {
                    updated[i] = true;
                    let track = &mut self.tracks[i];
                    let dt = frame.timestamp - track.last_seen;
                    if dt > 0.0 {
                        track.velocity = Velocity {
                            vx: (det.bbox.cx() - track.bbox.cx()) / dt,
                            vy: (det.bbox.cy() - track.bbox.cy()) / dt,
                        };
                    }
                    track.hits += 1;
                    track.confidence += (det.confidence - track.confidence) / track.hits as f64;
                    track.bbox = det.bbox;
                    track.last_seen = frame.timestamp;
                }
                None if det.confidence > self.options.min_confidence => births.push(det),
                None => {}
            }
        }

        for (track, was_updated) in self.tracks.iter_mut().zip(&updated) {
            if !was_updated {
                track.active = false;
            }
        }

        for det in births {
            let id = format!("track_{}", self.next_track_id);
            self.next_track_id += 1;
            self.tracks.push(Track {
                id,
                class: det.class.clone(),
                bbox: det.bbox,
                velocity: Velocity::default(),
                confidence: det.confidence,
                first_seen: frame.timestamp,
                last_seen: frame.timestamp,
                hits: 1,
                active: true,
            });
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn active_track_count(&self) -> usize {
        self.tracks.iter().filter(|t| t.active).count()
    }

    pub fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }
}

/// Track detections across `frames` in order.
pub fn track(frames: &[TrackedFrame], options: TrackOptions) -> Vec<Track> {
    let mut tracker = ObjectTracker::new(options);
    for frame in frames {
        tracker.update(frame);
    }
    tracker.into_tracks()
}

#[cfg(test)]
mod tests {
    use super::*;
    use vguard_models::ThreatLevel;

    fn det(class: &str, x: f64, y: f64, confidence: f64) -> Detection {
        Detection {
            id: format!("{}-{}-{}", class, x, y),
            class: class.to_string(),
            confidence,
            bbox: BoundingBox::new(x, y, 40.0, 80.0),
            threat_level: ThreatLevel::Low,
            risk_score: 0.1,
            timestamp: 0,
        }
    }

    fn frame(timestamp: f64, detections: Vec<Detection>) -> TrackedFrame {
        TrackedFrame {
            timestamp,
            detections,
        }
    }

    #[test]
    fn test_identity_kept_across_frames() {
        let tracks = track(
            &[
                frame(0.0, vec![det("person", 100.0, 100.0, 0.9)]),
                frame(1.0, vec![det("person", 110.0, 100.0, 0.8)]),
                frame(2.0, vec![det("person", 120.0, 104.0, 0.7)]),
            ],
            TrackOptions::default(),
        );

        assert_eq!(tracks.len(), 1);
        let t = &tracks[0];
        assert_eq!(t.id, "track_1");
        assert_eq!(t.hits, 3);
        assert!(t.active);
        assert!((t.velocity.vx - 10.0).abs() < 1e-9);
        assert!((t.velocity.vy - 4.0).abs() < 1e-9);
        assert!((t.confidence - 0.8).abs() < 1e-9);
        assert_eq!((t.first_seen, t.last_seen), (0.0, 2.0));
    }

    #[test]
    fn test_far_detection_starts_new_track() {
        let tracks = track(
            &[
                frame(0.0, vec![det("person", 0.0, 0.0, 0.9)]),
                frame(1.0, vec![det("person", 500.0, 500.0, 0.9)]),
            ],
            TrackOptions::default(),
        );

        assert_eq!(tracks.len(), 2);
        assert!(!tracks[0].active);
        assert!(tracks[1].active);
    }

    #[test]
    fn test_class_must_match() {
        let tracks = track(
            &[
                frame(0.0, vec![det("person", 0.0, 0.0, 0.9)]),
                frame(1.0, vec![det("car", 5.0, 0.0, 0.9)]),
            ],
            TrackOptions::default(),
        );
        assert_eq!(tracks.len(), 2);
    }

    #[test]
    fn test_low_confidence_does_not_start_track() {
        let tracks = track(
            &[frame(0.0, vec![det("person", 0.0, 0.0, 0.3)])],
            TrackOptions::default(),
        );
        assert!(tracks.is_empty());
    }

    #[test]
    fn test_confidence_at_threshold_does_not_start_track() {
        let options = TrackOptions::default();
        let at = options.min_confidence;
        let tracks = track(&[frame(0.0, vec![det("person", 0.0, 0.0, at)])], options);
        assert!(tracks.is_empty());

        let tracks = track(&[frame(0.0, vec![det("person", 0.0, 0.0, at + 0.01)])], options);
        assert_eq!(tracks.len(), 1);
    }

    #[test]
    fn test_missing_frame_deactivates() {
        let mut tracker = ObjectTracker::new(TrackOptions::default());
        tracker.update(&frame(0.0, vec![det("person", 0.0, 0.0, 0.9)]));
        assert_eq!(tracker.active_track_count(), 1);

        tracker.update(&frame(1.0, Vec::new()));
        assert_eq!(tracker.active_track_count(), 0);

        // Inactive tracks are not revived
        tracker.update(&frame(2.0, vec![det("person", 0.0, 0.0, 0.9)]));
        assert_eq!(tracker.tracks().len(), 2);
        assert_eq!(tracker.tracks()[1].id, "track_2");
    }
}
