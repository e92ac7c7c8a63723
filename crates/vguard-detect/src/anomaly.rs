//! Baseline anomaly scoring.
//!
//! Each observation is scored as a z-score against the baseline of its kind.
//! An observation is anomalous when `|z|` exceeds `BASE_Z_THRESHOLD /
//! sensitivity`; its confidence is `z / (z + threshold)`, so confidence is 0.5
//! right at the threshold and approaches 1 as the deviation grows.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vguard_models::{BoundingBox, ThreatLevel};

use crate::error::{DetectError, DetectResult};

/// z-score threshold at sensitivity 1.0.
pub const BASE_Z_THRESHOLD: f64 = 2.0;
/// Confidence above which the overall risk is high.
pub const HIGH_RISK_CONFIDENCE: f64 = 0.8;

const MIN_STD_DEV: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    AbandonedObject,
    UnusualBehavior,
    CrowdAnomaly,
}

impl AnomalyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyKind::AbandonedObject => "abandoned_object",
            AnomalyKind::UnusualBehavior => "unusual_behavior",
            AnomalyKind::CrowdAnomaly => "crowd_anomaly",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AnomalyKind::AbandonedObject => "Unattended object detected for extended period",
            AnomalyKind::UnusualBehavior => "Unusual movement pattern detected",
            AnomalyKind::CrowdAnomaly => "Crowd density outside normal range",
        }
    }

    /// Recommended responses for an anomaly of this kind.
    pub fn recommendations(&self) -> &'static [&'static str] {
        match self {
            AnomalyKind::AbandonedObject => &[
                "Investigate unattended object immediately",
                "Alert security personnel to the location",
            ],
            AnomalyKind::UnusualBehavior => &[
                "Monitor individual closely",
                "Consider approaching for identification",
            ],
            AnomalyKind::CrowdAnomaly => &["Continue monitoring the situation"],
        }
    }
}

/// One measured value in the analyzed stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyObservation {
    pub kind: AnomalyKind,
    /// Measured value (e.g. dwell seconds, speed, person count)
    pub value: f64,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    #[serde(default)]
    pub location: Option<BoundingBox>,
}

/// Normal distribution of one observation kind.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl BaselineStats {
    /// Population mean and standard deviation of `samples`.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Some(Self {
            mean,
            std_dev: variance.sqrt(),
        })
    }

    fn z_score(&self, value: f64) -> f64 {
        let deviation = (value - self.mean).abs();
        if self.std_dev < MIN_STD_DEV {
            if deviation < MIN_STD_DEV {
                0.0
            } else {
                f64::INFINITY
            }
        } else {
            deviation / self.std_dev
        }
    }
}

/// Per-kind baselines. Observations of kinds without a baseline are not scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    stats: HashMap<AnomalyKind, BaselineStats>,
}

impl Baseline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, kind: AnomalyKind, stats: BaselineStats) -> Self {
        self.stats.insert(kind, stats);
        self
    }

    pub fn get(&self, kind: AnomalyKind) -> Option<&BaselineStats> {
        self.stats.get(&kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyDetection {
    pub kind: AnomalyKind,
    pub confidence: f64,
    pub z_score: f64,
    pub timestamp: i64,
    pub location: Option<BoundingBox>,
    pub description: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyReport {
    pub detections: Vec<AnomalyDetection>,
    /// `low`, `medium` or `high`
    pub risk_level: ThreatLevel,
    pub recommendations: Vec<String>,
}

/// Score `stream` against `baseline`. `sensitivity` must be positive.
pub fn detect_anomalies(
    stream: &[AnomalyObservation],
    baseline: &Baseline,
    sensitivity: f64,
) -> DetectResult<AnomalyReport> {
    if !sensitivity.is_finite() || sensitivity <= 0.0 {
        return Err(DetectError::validation(format!(
            "sensitivity must be positive, got {}",
            sensitivity
        )));
    }
    let threshold = BASE_Z_THRESHOLD / sensitivity;

    let detections: Vec<AnomalyDetection> = stream
        .iter()
        .filter_map(|obs| {
            let z = baseline.get(obs.kind)?.z_score(obs.value);
            (z > threshold).then(|| AnomalyDetection {
                kind: obs.kind,
                confidence: if z.is_infinite() { 1.0 } else { z / (z + threshold) },
                z_score: z,
                timestamp: obs.timestamp,
                location: obs.location,
                description: obs.kind.description(),
            })
        })
        .collect();

    let risk_level = if detections.iter().any(|d| d.confidence > HIGH_RISK_CONFIDENCE) {
        ThreatLevel::High
    } else if !detections.is_empty() {
        ThreatLevel::Medium
    } else {
        ThreatLevel::Low
    };

    Ok(AnomalyReport {
        recommendations: recommendations(&detections),
        detections,
        risk_level,
    })
}

/// Recommendations for `detections`, de-duplicated in first-seen order.
pub fn recommendations(detections: &[AnomalyDetection]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for rec in detections.iter().flat_map(|d| d.kind.recommendations()) {
        if !out.iter().any(|r| r == rec) {
            out.push(rec.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(kind: AnomalyKind, value: f64) -> AnomalyObservation {
        AnomalyObservation {
            kind,
            value,
            timestamp: 0,
            location: None,
        }
    }

    fn baseline() -> Baseline {
        Baseline::new()
            .with(
                AnomalyKind::AbandonedObject,
                BaselineStats {
                    mean: 30.0,
                    std_dev: 10.0,
                },
            )
            .with(
                AnomalyKind::UnusualBehavior,
                BaselineStats {
                    mean: 1.0,
                    std_dev: 0.5,
                },
            )
    }

    #[test]
    fn test_no_anomalies_is_low() {
        let report = detect_anomalies(&[obs(AnomalyKind::AbandonedObject, 35.0)], &baseline(), 1.0).unwrap();
        assert!(report.detections.is_empty());
        assert_eq!(report.risk_level, ThreatLevel::Low);
        assert!(report.recommendations.is_empty());
    }

    #[test]
    fn test_moderate_anomaly_is_medium() {
        // z = 3, threshold 2, confidence 0.6
        let report = detect_anomalies(&[obs(AnomalyKind::AbandonedObject, 60.0)], &baseline(), 1.0).unwrap();
        assert_eq!(report.detections.len(), 1);
        assert!((report.detections[0].confidence - 0.6).abs() < 1e-9);
        assert_eq!(report.risk_level, ThreatLevel::Medium);
    }

    #[test]
    fn test_strong_anomaly_is_high() {
        // z = 10, confidence 10/12
        let report = detect_anomalies(&[obs(AnomalyKind::AbandonedObject, 130.0)], &baseline(), 1.0).unwrap();
        assert_eq!(report.risk_level, ThreatLevel::High);
    }

    #[test]
    fn test_sensitivity_scales_threshold() {
        let stream = [obs(AnomalyKind::AbandonedObject, 45.0)]; // z = 1.5
        assert!(detect_anomalies(&stream, &baseline(), 1.0).unwrap().detections.is_empty());
        assert_eq!(detect_anomalies(&stream, &baseline(), 2.0).unwrap().detections.len(), 1);
        assert!(detect_anomalies(&stream, &baseline(), 0.0).is_err());
    }

    #[test]
    fn test_recommendations_deduplicated_in_order() {
        let stream = [
            obs(AnomalyKind::UnusualBehavior, 5.0),
            obs(AnomalyKind::AbandonedObject, 90.0),
            obs(AnomalyKind::UnusualBehavior, 6.0),
        ];
        let report = detect_anomalies(&stream, &baseline(), 1.0).unwrap();
        assert_eq!(report.detections.len(), 3);
        assert_eq!(
            report.recommendations,
            vec![
                "Monitor individual closely",
                "Consider approaching for identification",
                "Investigate unattended object immediately",
                "Alert security personnel to the location",
            ]
        );
    }

    #[test]
    fn test_kind_without_baseline_is_ignored() {
        let report = detect_anomalies(&[obs(AnomalyKind::CrowdAnomaly, 1000.0)], &baseline(), 1.0).unwrap();
        assert!(report.detections.is_empty());
    }

    #[test]
    fn test_baseline_from_samples() {
        let stats = BaselineStats::from_samples(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert!((stats.mean - 5.0).abs() < 1e-9);
        assert!((stats.std_dev - 2.0).abs() < 1e-9);
        assert!(BaselineStats::from_samples(&[]).is_none());
    }
}
