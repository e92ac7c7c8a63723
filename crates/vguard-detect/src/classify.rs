//! Threat classification.
//!
//! The threat level of a detection comes from a static class table. The risk
//! score scales the level's base range by the detection confidence:
//!
//! ```text
//! base = lo + (hi - lo) * confidence
//! risk = clamp(base * confidence, 0, 1)
//! ```
//!
//! Classes absent from the table are `low` with `risk = 0.1 * confidence`.

use serde::Serialize;
use uuid::Uuid;
use vguard_models::{BoundingBox, Detection, DetectionCategories, ThreatLevel};

/// Classes classified as high threat.
pub const HIGH_THREAT_CLASSES: &[&str] = &["knife", "scissors", "baseball_bat"];
/// Classes classified as medium threat.
pub const MEDIUM_THREAT_CLASSES: &[&str] = &["backpack", "suitcase", "handbag"];
/// Classes explicitly listed as low threat.
pub const LOW_THREAT_CLASSES: &[&str] = &["person", "car", "bicycle"];

const VEHICLE_CLASSES: &[&str] = &[
    "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
];

/// Risk factor for classes not in the table.
const UNLISTED_RISK_FACTOR: f64 = 0.1;

/// Unclassified detection in source-image coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDetection {
    pub class: String,
    pub confidence: f64,
    pub bbox: BoundingBox,
}

/// Category flag a class is gated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassCategory {
    Person,
    Vehicle,
    Weapon,
    Object,
}

impl ClassCategory {
    pub fn of(class: &str) -> Self {
        if class == "person" {
            ClassCategory::Person
        } else if VEHICLE_CLASSES.contains(&class) {
            ClassCategory::Vehicle
        } else if HIGH_THREAT_CLASSES.contains(&class) {
            ClassCategory::Weapon
        } else {
            ClassCategory::Object
        }
    }

    /// Whether `categories` enables this category.
    pub fn enabled(self, categories: &DetectionCategories) -> bool {
        match self {
            ClassCategory::Person => categories.persons,
            ClassCategory::Vehicle => categories.vehicles,
            ClassCategory::Weapon => categories.weapons,
            ClassCategory::Object => categories.objects,
        }
    }
}

/// Threat level and base risk range of a class, `None` for unlisted classes.
pub fn threat_range(class: &str) -> Option<(ThreatLevel, f64, f64)> {
    if HIGH_THREAT_CLASSES.contains(&class) {
        Some((ThreatLevel::High, 0.8, 1.0))
    } else if MEDIUM_THREAT_CLASSES.contains(&class) {
        Some((ThreatLevel::Medium, 0.4, 0.7))
    } else if LOW_THREAT_CLASSES.contains(&class) {
        Some((ThreatLevel::Low, 0.1, 0.3))
    } else {
        None
    }
}

/// Threat level and risk score for one class at one confidence.
pub fn score(class: &str, confidence: f64) -> (ThreatLevel, f64) {
    let c = confidence.clamp(0.0, 1.0);
    match threat_range(class) {
        Some((level, lo, hi)) => {
            let base = lo + (hi - lo) * c;
            (level, (base * c).clamp(0.0, 1.0))
        }
        None => (ThreatLevel::Low, (UNLISTED_RISK_FACTOR * c).clamp(0.0, 1.0)),
    }
}

/// Classify raw detections observed at `timestamp_ms`.
pub fn classify(detections: Vec<RawDetection>, timestamp_ms: i64) -> Vec<Detection> {
    detections
        .into_iter()
        .map(|raw| {
            let confidence = raw.confidence.clamp(0.0, 1.0);
            let (threat_level, risk_score) = score(&raw.class, confidence);
            Detection {
                id: format!("det_{}", Uuid::new_v4().simple()),
                class: raw.class,
                confidence,
                bbox: raw.bbox,
                threat_level,
                risk_score,
                timestamp: timestamp_ms,
            }
        })
        .collect()
}

/// Mean confidence, 0 for an empty slice.
pub fn overall_confidence(detections: &[Detection]) -> f64 {
    if detections.is_empty() {
        return 0.0;
    }
    detections.iter().map(|d| d.confidence).sum::<f64>() / detections.len() as f64
}
