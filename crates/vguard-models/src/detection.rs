//! Detection models shared by the engine, the pipeline and live feeds.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Bounding box in pixel coordinates of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    /// Left edge x-coordinate
    pub x: f64,
    /// Top edge y-coordinate
    pub y: f64,
    /// Box width
    pub width: f64,
    /// Box height
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Center x-coordinate.
    #[inline]
    pub fn cx(&self) -> f64 {
        self.x + self.width / 2.0
    }

    /// Center y-coordinate.
    #[inline]
    pub fn cy(&self) -> f64 {
        self.y + self.height / 2.0
    }

    /// Right edge x-coordinate.
    #[inline]
    pub fn x2(&self) -> f64 {
        self.x + self.width
    }

    /// Bottom edge y-coordinate.
    #[inline]
    pub fn y2(&self) -> f64 {
        self.y + self.height
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Compute Intersection over Union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Euclidean distance between box centers.
    pub fn center_distance(&self, other: &BoundingBox) -> f64 {
        let dx = self.cx() - other.cx();
        let dy = self.cy() - other.cy();
        (dx * dx + dy * dy).sqrt()
    }

    /// Scale both axes independently (e.g. model input space to source space).
    pub fn scale(&self, sx: f64, sy: f64) -> BoundingBox {
        BoundingBox {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }
}

/// Coarse severity bucket derived from the detected object class.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLevel::Low => "low",
            ThreatLevel::Medium => "medium",
            ThreatLevel::High => "high",
            ThreatLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A classified detection. Immutable once produced by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Detection {
    /// Unique detection id
    pub id: String,
    /// Class label (COCO name, snake_case)
    pub class: String,
    /// Detection confidence [0, 1]
    pub confidence: f64,
    /// Box in source-image coordinates
    pub bbox: BoundingBox,
    /// Threat level derived from the class
    pub threat_level: ThreatLevel,
    /// Risk score [0, 1]
    pub risk_score: f64,
    /// Timestamp in milliseconds (wall clock for live feeds, media time for files)
    pub timestamp: i64,
}

/// Detection categories requested for a frame.
///
/// Every flag defaults to enabled, matching a full scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DetectionCategories {
    pub persons: bool,
    pub vehicles: bool,
    pub objects: bool,
    pub faces: bool,
    pub weapons: bool,
}

impl Default for DetectionCategories {
    fn default() -> Self {
        Self::all()
    }
}

impl DetectionCategories {
    /// Every category enabled.
    pub fn all() -> Self {
        Self {
            persons: true,
            vehicles: true,
            objects: true,
            faces: true,
            weapons: true,
        }
    }

    /// Every category disabled.
    pub fn none() -> Self {
        Self {
            persons: false,
            vehicles: false,
            objects: false,
            faces: false,
            weapons: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identical_and_disjoint() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 10.0, 10.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-9);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        // intersection 50, union 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_center_distance() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(3.0, 4.0, 10.0, 10.0);
        assert!((a.center_distance(&b) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_threat_level_ordering() {
        assert!(ThreatLevel::High > ThreatLevel::Medium);
        assert!(ThreatLevel::Medium > ThreatLevel::Low);
        assert_eq!(ThreatLevel::default(), ThreatLevel::Low);
        assert_eq!(serde_json::to_string(&ThreatLevel::High).unwrap(), "\"high\"");
    }

    #[test]
    fn test_categories_default_to_all() {
        let parsed: DetectionCategories = serde_json::from_str(r#"{"faces": false}"#).unwrap();
        assert!(parsed.persons && parsed.vehicles && parsed.objects && parsed.weapons);
        assert!(!parsed.faces);
    }
}
