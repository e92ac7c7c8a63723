//! Deterministic backend selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};
use vguard_models::ModelDescriptor;

use crate::backend::InferenceBackend;
use crate::error::InferenceResult;
use crate::onnx::OnnxBackend;
use crate::synthetic::SyntheticBackend;

/// How the factory chooses a backend variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendMode {
    /// Always ONNX; a missing artifact fails the load
    Onnx,
    /// Always synthetic
    Synthetic,
    /// ONNX when the artifact exists, synthetic otherwise
    #[default]
    Auto,
}

impl BackendMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendMode::Onnx => "onnx",
            BackendMode::Synthetic => "synthetic",
            BackendMode::Auto => "auto",
        }
    }
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BackendMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "onnx" => Ok(BackendMode::Onnx),
            "synthetic" => Ok(BackendMode::Synthetic),
            "auto" => Ok(BackendMode::Auto),
            other => Err(format!("unknown backend mode: {}", other)),
        }
    }
}

/// Creates a backend for a catalog model.
pub trait BackendFactory: Send + Sync {
    fn create(&self, descriptor: &ModelDescriptor) -> InferenceResult<Arc<dyn InferenceBackend>>;
}

/// Factory resolving [`BackendMode`] against the descriptor's artifact.
#[derive(Debug, Clone, Default)]
pub struct DefaultBackendFactory {
    mode: BackendMode,
}

impl DefaultBackendFactory {
    pub fn new(mode: BackendMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> BackendMode {
        self.mode
    }
}

impl BackendFactory for DefaultBackendFactory {
    fn create(&self, descriptor: &ModelDescriptor) -> InferenceResult<Arc<dyn InferenceBackend>> {
        let use_onnx = match self.mode {
            BackendMode::Onnx => true,
            BackendMode::Synthetic => false,
            BackendMode::Auto => descriptor.artifact_path.exists(),
        };

        if use_onnx {
            return Ok(Arc::new(OnnxBackend::load(descriptor)?));
        }

        if self.mode == BackendMode::Auto {
            warn!(
                model_id = %descriptor.id,
                artifact = %descriptor.artifact_path.display(),
                "Model artifact not found, serving synthetic output"
            );
        } else {
            info!(model_id = %descriptor.id, "Using synthetic backend");
        }

        Ok(Arc::new(SyntheticBackend::new(descriptor.kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builtin_catalog;
    use crate::error::InferenceError;
    use std::path::Path;
    use vguard_models::BackendKind;

    #[test]
    fn test_mode_parsing() {
        assert_eq!("ONNX".parse::<BackendMode>().unwrap(), BackendMode::Onnx);
        assert_eq!(" auto ".parse::<BackendMode>().unwrap(), BackendMode::Auto);
        assert!("gpu".parse::<BackendMode>().is_err());
        assert_eq!(BackendMode::default(), BackendMode::Auto);
    }

    #[test]
    fn test_auto_without_artifact_is_synthetic() {
        let dir = tempfile::tempdir().unwrap();
        let descriptor = &builtin_catalog(dir.path())[0];

        let backend = DefaultBackendFactory::new(BackendMode::Auto)
            .create(descriptor)
            .unwrap();
        assert_eq!(backend.kind(), BackendKind::Synthetic);
    }

    #[test]
    fn test_onnx_mode_requires_artifact() {
        let descriptor = &builtin_catalog(Path::new("/nonexistent"))[0];
        let result = DefaultBackendFactory::new(BackendMode::Onnx).create(descriptor);
        assert!(matches!(result, Err(InferenceError::ArtifactMissing(_))));
    }
}
