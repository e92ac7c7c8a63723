//! Test fixtures: scripted and randomized backends, frame builders.
//!
//! Nothing in here is used by production code paths.

use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};
use vguard_inference::{
    builtin_catalog, BackendFactory, InferenceBackend, InferenceError, InferenceResult, ModelInput,
    ModelOutput, ModelRegistry, RawObject, SyntheticBackend,
};
use vguard_models::{BackendKind, ModelDescriptor, ModelKind};

/// Backend returning the same output for every input.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    output: ModelOutput,
}

impl ScriptedBackend {
    pub fn new(output: ModelOutput) -> Self {
        Self { output }
    }
}

impl InferenceBackend for ScriptedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Synthetic
    }

    fn predict(&self, _input: &ModelInput) -> InferenceResult<ModelOutput> {
        Ok(self.output.clone())
    }
}

/// Factory serving scripted outputs per model kind, synthetic otherwise.
#[derive(Debug, Clone, Default)]
pub struct ScriptedFactory {
    outputs: HashMap<ModelKind, ModelOutput>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, kind: ModelKind, output: ModelOutput) -> Self {
        self.outputs.insert(kind, output);
        self
    }
}

impl BackendFactory for ScriptedFactory {
    fn create(&self, descriptor: &ModelDescriptor) -> InferenceResult<Arc<dyn InferenceBackend>> {
        let backend: Arc<dyn InferenceBackend> = match self.outputs.get(&descriptor.kind) {
            Some(output) => Arc::new(ScriptedBackend::new(output.clone())),
            None => Arc::new(SyntheticBackend::new(descriptor.kind)),
        };
        Ok(backend)
    }
}

/// Object-detection backend emitting randomized street-scene detections:
/// always a person, sometimes a car, a bag or a knife.
pub struct RandomDetectionBackend {
    rng: Mutex<StdRng>,
}

impl RandomDetectionBackend {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomDetectionBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for RandomDetectionBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Synthetic
    }

    fn predict(&self, input: &ModelInput) -> InferenceResult<ModelOutput> {
        let mut guard = self
            .rng
            .lock()
            .map_err(|_| InferenceError::internal("rng lock poisoned"))?;
        let rng: &mut StdRng = &mut guard;
        let (w, h) = (input.width() as f32, input.height() as f32);

        let place = |rng: &mut StdRng, class_id: usize, conf: (f32, f32), size: (f32, f32)| {
            let width = (size.0 * w).min(w);
            let height = (size.1 * h).min(h);
            RawObject {
                class_id,
                confidence: rng.random_range(conf.0..conf.1),
                x: rng.random_range(0.0..=(w - width)),
                y: rng.random_range(0.0..=(h - height)),
                width,
                height,
            }
        };

        let mut objects = vec![place(&mut *rng, 0, (0.92, 0.99), (0.2, 0.5))];
        if rng.random_bool(0.4) {
            objects.push(place(&mut *rng, 2, (0.85, 0.95), (0.3, 0.2)));
        }
        if rng.random_bool(0.3) {
            let bag = [24, 26, 28][rng.random_range(0..3)];
            objects.push(place(&mut *rng, bag, (0.75, 0.9), (0.1, 0.08)));
        }
        if rng.random_bool(0.1) {
            objects.push(place(&mut *rng, 43, (0.68, 0.88), (0.05, 0.15)));
        }

        Ok(ModelOutput::Objects(objects))
    }
}

/// Factory serving [`RandomDetectionBackend`] for object detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomDetectionFactory {
    seed: Option<u64>,
}

impl RandomDetectionFactory {
    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }
}

impl BackendFactory for RandomDetectionFactory {
    fn create(&self, descriptor: &ModelDescriptor) -> InferenceResult<Arc<dyn InferenceBackend>> {
        let backend: Arc<dyn InferenceBackend> = match (descriptor.kind, self.seed) {
            (ModelKind::ObjectDetection, Some(seed)) => Arc::new(RandomDetectionBackend::seeded(seed)),
            (ModelKind::ObjectDetection, None) => Arc::new(RandomDetectionBackend::new()),
            (kind, _) => Arc::new(SyntheticBackend::new(kind)),
        };
        Ok(backend)
    }
}

/// Registry over the built-in catalog (no artifacts) using `factory`.
pub fn registry_with(factory: impl BackendFactory + 'static) -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::new(
        builtin_catalog(Path::new("/nonexistent")),
        Arc::new(factory),
    ))
}

/// Object candidate in model-input pixels.
pub fn object(class_id: usize, confidence: f32, x: f32, y: f32, width: f32, height: f32) -> RawObject {
    RawObject {
        class_id,
        confidence,
        x,
        y,
        width,
        height,
    }
}

/// Single-color JPEG.
pub fn solid_jpeg(width: u32, height: u32, rgb: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(rgb)));
    let mut buf = Cursor::new(Vec::new());
    // Encoding an in-memory RGB buffer cannot fail
    let _ = img.write_to(&mut buf, ImageOutputFormat::Jpeg(85));
    buf.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_backend_always_sees_a_person() {
        let backend = RandomDetectionBackend::seeded(7);
        let input = ModelInput::new(vec![0.0; 416 * 416 * 3], 416, 416, 3).unwrap();

        for _ in 0..20 {
            let ModelOutput::Objects(objects) = backend.predict(&input).unwrap() else {
                panic!("expected objects");
            };
            assert_eq!(objects[0].class_id, 0);
            for obj in &objects {
                assert!((0.0..=1.0).contains(&obj.confidence));
                assert!(obj.x + obj.width <= 416.0 + 1e-3);
                assert!(obj.y + obj.height <= 416.0 + 1e-3);
            }
        }
    }

    #[test]
    fn test_solid_jpeg_decodes() {
        let bytes = solid_jpeg(32, 16, [1, 2, 3]);
        let img = image::load_from_memory(&bytes).unwrap();
        assert_eq!(image::GenericImageView::dimensions(&img), (32, 16));
    }
}
