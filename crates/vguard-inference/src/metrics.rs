//! Inference metrics recorded through the `metrics` facade.

use metrics::{counter, gauge, histogram};
use vguard_models::BackendKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const INFERENCES_TOTAL: &str = "vguard_inferences_total";
    pub const INFERENCE_DURATION_SECONDS: &str = "vguard_inference_duration_seconds";
    pub const MODELS_LOADED: &str = "vguard_models_loaded";
}

/// Record one completed inference.
pub fn record_inference(model_id: &str, backend: BackendKind, duration_secs: f64) {
    let labels = [
        ("model_id", model_id.to_string()),
        ("backend", backend.as_str().to_string()),
    ];

    counter!(names::INFERENCES_TOTAL, &labels).increment(1);
    histogram!(names::INFERENCE_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Update the loaded-models gauge.
pub fn set_models_loaded(count: usize) {
    gauge!(names::MODELS_LOADED).set(count as f64);
}
