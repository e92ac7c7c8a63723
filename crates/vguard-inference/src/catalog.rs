//! Built-in model catalog and class labels.

use std::path::Path;
use vguard_models::{ModelDescriptor, ModelKind, ModelSpeed};

/// COCO class names (80 classes), snake_case.
pub const COCO_CLASSES: &[&str] = &[
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck",
    "boat", "traffic_light", "fire_hydrant", "stop_sign", "parking_meter", "bench",
    "bird", "cat", "dog", "horse", "sheep", "cow", "elephant", "bear", "zebra",
    "giraffe", "backpack", "umbrella", "handbag", "tie", "suitcase", "frisbee",
    "skis", "snowboard", "sports_ball", "kite", "baseball_bat", "baseball_glove",
    "skateboard", "surfboard", "tennis_racket", "bottle", "wine_glass", "cup",
    "fork", "knife", "spoon", "bowl", "banana", "apple", "sandwich", "orange",
    "broccoli", "carrot", "hot_dog", "pizza", "donut", "cake", "chair", "couch",
    "potted_plant", "bed", "dining_table", "toilet", "tv", "laptop", "mouse",
    "remote", "keyboard", "cell_phone", "microwave", "oven", "toaster", "sink",
    "refrigerator", "book", "clock", "vase", "scissors", "teddy_bear", "hair_drier",
    "toothbrush",
];

/// Default object-detection model id.
pub const OBJECT_DETECTION_MODEL: &str = "object_detection_v1";
/// Default face-recognition model id.
pub const FACE_RECOGNITION_MODEL: &str = "face_recognition_v1";
pub const ANOMALY_DETECTION_MODEL: &str = "anomaly_detection_v1";
pub const WEAPON_DETECTION_MODEL: &str = "weapon_detection_v1";

/// Class name for a COCO id.
pub fn class_name(class_id: usize) -> Option<&'static str> {
    COCO_CLASSES.get(class_id).copied()
}

#[allow(clippy::too_many_arguments)]
fn descriptor(
    model_dir: &Path,
    id: &str,
    name: &str,
    kind: ModelKind,
    accuracy: f64,
    speed: ModelSpeed,
    input_shape: [u32; 3],
    supported: &[&str],
    is_default: bool,
) -> ModelDescriptor {
    ModelDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        kind,
        version: "1.0.0".to_string(),
        accuracy,
        speed,
        input_shape,
        artifact_path: model_dir.join(format!("{}.onnx", id)),
        supported_detections: supported.iter().map(|s| s.to_string()).collect(),
        is_default,
    }
}

/// The four built-in models, with artifacts expected under `model_dir`.
pub fn builtin_catalog(model_dir: &Path) -> Vec<ModelDescriptor> {
    vec![
        descriptor(
            model_dir,
            OBJECT_DETECTION_MODEL,
            "Object Detection Model v1",
            ModelKind::ObjectDetection,
            94.7,
            ModelSpeed::Fast,
            [416, 416, 3],
            &["person", "vehicle", "bag", "weapon"],
            true,
        ),
        descriptor(
            model_dir,
            FACE_RECOGNITION_MODEL,
            "Face Recognition Model v1",
            ModelKind::FaceRecognition,
            96.2,
            ModelSpeed::Medium,
            [160, 160, 3],
            &["face", "face_landmarks"],
            true,
        ),
        descriptor(
            model_dir,
            ANOMALY_DETECTION_MODEL,
            "Anomaly Detection Model v1",
            ModelKind::AnomalyDetection,
            89.3,
            ModelSpeed::Slow,
            [224, 224, 3],
            &["unusual_behavior", "crowd_anomaly", "abandoned_object"],
            false,
        ),
        descriptor(
            model_dir,
            WEAPON_DETECTION_MODEL,
            "Weapon Detection Model v1",
            ModelKind::WeaponDetection,
            91.8,
            ModelSpeed::Fast,
            [320, 320, 3],
            &["knife", "gun", "weapon"],
            false,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coco_classes() {
        assert_eq!(COCO_CLASSES.len(), 80);
        assert_eq!(class_name(0), Some("person"));
        assert_eq!(class_name(34), Some("baseball_bat"));
        assert_eq!(class_name(43), Some("knife"));
        assert_eq!(class_name(76), Some("scissors"));
        assert_eq!(class_name(80), None);
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = builtin_catalog(Path::new("/models"));
        assert_eq!(catalog.len(), 4);

        let defaults: Vec<_> = catalog.iter().filter(|d| d.is_default).map(|d| d.id.as_str()).collect();
        assert_eq!(defaults, vec![OBJECT_DETECTION_MODEL, FACE_RECOGNITION_MODEL]);

        let weapon = catalog.iter().find(|d| d.id == WEAPON_DETECTION_MODEL).unwrap();
        assert_eq!(weapon.input_shape, [320, 320, 3]);
        assert_eq!(weapon.artifact_path, Path::new("/models/weapon_detection_v1.onnx"));
    }
}
