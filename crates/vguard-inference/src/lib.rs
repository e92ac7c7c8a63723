//! Model registry and inference backends.
//!
//! - [`ModelRegistry`]: load/unload/predict with per-model statistics
//! - [`InferenceBackend`]: ONNX Runtime ([`OnnxBackend`]) or deterministic
//!   synthetic output ([`SyntheticBackend`]), chosen by a [`BackendFactory`]
//! - The built-in catalog of the four analysis models

pub mod backend;
pub mod catalog;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod onnx;
pub mod registry;
pub mod synthetic;

pub use backend::{InferenceBackend, ModelInput, ModelOutput, RawFace, RawObject, FACE_ENCODING_DIM};
pub use catalog::{
    builtin_catalog, class_name, ANOMALY_DETECTION_MODEL, COCO_CLASSES, FACE_RECOGNITION_MODEL,
    OBJECT_DETECTION_MODEL, WEAPON_DETECTION_MODEL,
};
pub use error::{InferenceError, InferenceResult};
pub use factory::{BackendFactory, BackendMode, DefaultBackendFactory};
pub use onnx::OnnxBackend;
pub use registry::{
    AvailableModel, HealthStatus, LoadOptions, LoadResult, LoadedModel, ModelRegistry, ModelStats,
    PredictOptions, PredictionResult, RegistryMetrics, DEFAULT_IDLE_THRESHOLD,
};
pub use synthetic::SyntheticBackend;
