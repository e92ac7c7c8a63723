//! Face matching against known encodings.

use serde::{Deserialize, Serialize};
use vguard_models::BoundingBox;

/// Maximum Euclidean distance for a face to match a known face.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.6;

/// A face found in a frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Face {
    pub id: String,
    pub bbox: BoundingBox,
    pub confidence: f64,
    pub encoding: Vec<f32>,
}

/// A face enrolled by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownFace {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub encoding: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceMatch {
    pub face: Face,
    pub known: KnownFace,
    pub distance: f64,
    /// `1 - distance`
    pub confidence: f64,
}

/// Result of a recognition pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FaceRecognition {
    pub faces: Vec<Face>,
    pub matches: Vec<FaceMatch>,
    pub unknown_faces: Vec<Face>,
    /// Mean detection confidence, 0 without faces
    pub average_confidence: f64,
}

/// Euclidean distance between two encodings; infinite on a length mismatch.
pub fn face_distance(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return f64::INFINITY;
    }
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = (*x - *y) as f64;
            d * d
        })
        .sum::<f64>()
        .sqrt()
}

/// Nearest known face strictly closer than `threshold`.
pub fn nearest_match<'a>(
    encoding: &[f32],
    known: &'a [KnownFace],
    threshold: f64,
) -> Option<(&'a KnownFace, f64)> {
    known
        .iter()
        .map(|k| (k, face_distance(encoding, &k.encoding)))
        .filter(|(_, d)| *d < threshold)
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Split faces into matches and unknown faces.
pub fn match_faces(faces: Vec<Face>, known: &[KnownFace], threshold: f64) -> FaceRecognition {
    let mut matches = Vec::new();
    let mut unknown_faces = Vec::new();

    for face in &faces {
        match nearest_match(&face.encoding, known, threshold) {
            Some((known_face, distance)) => matches.push(FaceMatch {
                face: face.clone(),
                known: known_face.clone(),
                distance,
                confidence: (1.0 - distance).clamp(0.0, 1.0),
            }),
            None => unknown_faces.push(face.clone()),
        }
    }

    let average_confidence = if faces.is_empty() {
        0.0
    } else {
        faces.iter().map(|f| f.confidence).sum::<f64>() / faces.len() as f64
    };

    FaceRecognition {
        faces,
        matches,
        unknown_faces,
        average_confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face(id: &str, encoding: Vec<f32>) -> Face {
        Face {
            id: id.to_string(),
            bbox: BoundingBox::new(0.0, 0.0, 10.0, 10.0),
            confidence: 0.9,
            encoding,
        }
    }

    fn known(id: &str, encoding: Vec<f32>) -> KnownFace {
        KnownFace {
            id: id.to_string(),
            name: None,
            encoding,
        }
    }

    #[test]
    fn test_distance() {
        assert!((face_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-9);
        assert!(face_distance(&[0.0], &[0.0, 1.0]).is_infinite());
    }

    #[test]
    fn test_match_and_unknown() {
        let mut near = vec![0.0f32; 128];
        near[0] = 0.3;
        let far = vec![1.0f32; 128];

        let result = match_faces(
            vec![face("a", near), face("b", far)],
            &[known("k", vec![0.0; 128])],
            DEFAULT_MATCH_THRESHOLD,
        );

        assert_eq!(result.faces.len(), 2);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.matches[0].face.id, "a");
        assert!((result.matches[0].distance - 0.3).abs() < 1e-6);
        assert!((result.matches[0].confidence - 0.7).abs() < 1e-6);
        assert_eq!(result.unknown_faces.len(), 1);
        assert_eq!(result.unknown_faces[0].id, "b");
    }

    #[test]
    fn test_threshold_is_strict() {
        let result = match_faces(
            vec![face("a", vec![0.6])],
            &[known("k", vec![0.0])],
            DEFAULT_MATCH_THRESHOLD,
        );
        assert!(result.matches.is_empty());
    }

    #[test]
    fn test_nearest_wins() {
        let known_faces = [known("far", vec![0.5]), known("near", vec![0.1])];
        let (best, _) = nearest_match(&[0.0], &known_faces, 1.0).unwrap();
        assert_eq!(best.id, "near");
    }

    #[test]
    fn test_no_faces() {
        let result = match_faces(Vec::new(), &[], DEFAULT_MATCH_THRESHOLD);
        assert_eq!(result.average_confidence, 0.0);
    }
}
