//! Deterministic placeholder backend.
//!
//! Output is derived from a SHA-256 digest of the input tensor, so identical
//! frames always produce identical predictions. Used when no model artifact
//! is available; every result it produces is tagged [`BackendKind::Synthetic`].

use sha2::{Digest, Sha256};
use vguard_models::{BackendKind, ModelKind};

use crate::backend::{InferenceBackend, ModelInput, ModelOutput, RawFace, RawObject, FACE_ENCODING_DIM};
use crate::catalog::COCO_CLASSES;
use crate::error::InferenceResult;

const MAX_SYNTHETIC_OBJECTS: u8 = 5;
const MAX_SYNTHETIC_FACES: u8 = 2;

/// Byte stream expanded from a seed digest.
struct DigestStream {
    seed: [u8; 32],
    block: [u8; 32],
    counter: u32,
    pos: usize,
}

impl DigestStream {
    fn new(seed: [u8; 32]) -> Self {
        Self {
            seed,
            block: seed,
            counter: 0,
            pos: 0,
        }
    }

    fn next_u8(&mut self) -> u8 {
        if self.pos == self.block.len() {
            self.counter += 1;
            let mut hasher = Sha256::new();
            hasher.update(self.seed);
            hasher.update(self.counter.to_le_bytes());
            self.block = hasher.finalize().into();
            self.pos = 0;
        }
        let b = self.block[self.pos];
        self.pos += 1;
        b
    }

    /// Uniform value in [0, 1].
    fn next_unit(&mut self) -> f32 {
        let hi = self.next_u8() as u16;
        let lo = self.next_u8() as u16;
        ((hi << 8) | lo) as f32 / u16::MAX as f32
    }

    fn next_range(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.next_unit()
    }
}

/// Synthetic backend for one model kind.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    kind: ModelKind,
}

impl SyntheticBackend {
    pub fn new(kind: ModelKind) -> Self {
        Self { kind }
    }

    fn digest(input: &ModelInput) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(input.height().to_le_bytes());
        hasher.update(input.width().to_le_bytes());
        let quantized: Vec<u8> = input
            .data()
            .iter()
            .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect();
        hasher.update(&quantized);
        hasher.finalize().into()
    }

    fn objects(stream: &mut DigestStream, input: &ModelInput) -> Vec<RawObject> {
        let count = 1 + stream.next_u8() % MAX_SYNTHETIC_OBJECTS;
        let (w, h) = (input.width() as f32, input.height() as f32);

        (0..count)
            .map(|_| {
                let width = stream.next_range(0.12, 0.36) * w;
                let height = stream.next_range(0.12, 0.36) * h;
                RawObject {
                    class_id: stream.next_u8() as usize % COCO_CLASSES.len(),
                    confidence: stream.next_range(0.6, 1.0),
                    x: stream.next_unit() * (w - width),
                    y: stream.next_unit() * (h - height),
                    width,
                    height,
                }
            })
            .collect()
    }

    fn faces(stream: &mut DigestStream, input: &ModelInput) -> Vec<RawFace> {
        let count = stream.next_u8() % (MAX_SYNTHETIC_FACES + 1);
        let (w, h) = (input.width() as f32, input.height() as f32);

        (0..count)
            .map(|_| {
                let size = stream.next_range(0.2, 0.5) * w.min(h);
                RawFace {
                    confidence: stream.next_range(0.7, 1.0),
                    x: stream.next_unit() * (w - size),
                    y: stream.next_unit() * (h - size),
                    width: size,
                    height: size,
                    encoding: (0..FACE_ENCODING_DIM)
                        .map(|_| stream.next_range(-0.2, 0.2))
                        .collect(),
                }
            })
            .collect()
    }
}

impl InferenceBackend for SyntheticBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Synthetic
    }

    fn predict(&self, input: &ModelInput) -> InferenceResult<ModelOutput> {
        let mut stream = DigestStream::new(Self::digest(input));

        let output = match self.kind {
            ModelKind::ObjectDetection => ModelOutput::Objects(Self::objects(&mut stream, input)),
            ModelKind::FaceRecognition => ModelOutput::Faces(Self::faces(&mut stream, input)),
            ModelKind::AnomalyDetection => {
                let score = stream.next_unit();
                ModelOutput::Anomaly {
                    score,
                    anomalous: score > 0.7,
                }
            }
            ModelKind::WeaponDetection => {
                let present = stream.next_unit() > 0.8;
                let confidence = if present {
                    stream.next_range(0.7, 1.0)
                } else {
                    stream.next_range(0.0, 0.4)
                };
                ModelOutput::Weapon {
                    confidence,
                    present,
                }
            }
        };

        Ok(output)
    }
}
