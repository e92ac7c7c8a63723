//! Inference backend capability and its input/output types.

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use vguard_models::BackendKind;

use crate::error::{InferenceError, InferenceResult};

/// Length of a face encoding vector.
pub const FACE_ENCODING_DIM: usize = 128;

/// Normalized image tensor in HWC layout, values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ModelInput {
    data: Vec<f32>,
    height: u32,
    width: u32,
    channels: u32,
}

impl ModelInput {
    /// Wrap an HWC tensor, checking its length against the shape.
    pub fn new(data: Vec<f32>, height: u32, width: u32, channels: u32) -> InferenceResult<Self> {
        let expected = height as usize * width as usize * channels as usize;
        if expected == 0 || data.len() != expected {
            return Err(InferenceError::invalid_input(format!(
                "tensor length {} does not match shape [{}, {}, {}]",
                data.len(),
                height,
                width,
                channels
            )));
        }
        Ok(Self {
            data,
            height,
            width,
            channels,
        })
    }

    /// Resize an image exactly to `width`x`height` RGB and normalize.
    pub fn from_image(img: &DynamicImage, width: u32, height: u32) -> InferenceResult<Self> {
        let rgb = if img.dimensions() == (width, height) {
            img.to_rgb8()
        } else {
            img.resize_exact(width, height, FilterType::Triangle).to_rgb8()
        };

        let data = rgb.as_raw().iter().map(|&v| v as f32 / 255.0).collect();
        Self::new(data, height, width, 3)
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Shape as `[h, w, c]`.
    pub fn shape(&self) -> [u32; 3] {
        [self.height, self.width, self.channels]
    }

    /// Re-layout as NCHW with a batch dimension of 1.
    pub fn to_nchw(&self) -> Vec<f32> {
        let (h, w, c) = (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        );
        let mut out = Vec::with_capacity(self.data.len());
        for ch in 0..c {
            for y in 0..h {
                for x in 0..w {
                    out.push(self.data[(y * w + x) * c + ch]);
                }
            }
        }
        out
    }
}

/// Object candidate in model-input pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawObject {
    /// COCO class id
    pub class_id: usize,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Face candidate in model-input pixel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawFace {
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub encoding: Vec<f32>,
}

/// Decoded output of a model, by model kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ModelOutput {
    Objects(Vec<RawObject>),
    Faces(Vec<RawFace>),
    Anomaly { score: f32, anomalous: bool },
    Weapon { confidence: f32, present: bool },
}

/// A loaded model able to run inference.
///
/// Implementations are immutable once constructed and may be called from
/// several threads at once.
pub trait InferenceBackend: Send + Sync {
    /// Variant serving this model.
    fn kind(&self) -> BackendKind;

    /// Run inference on one input. May block.
    fn predict(&self, input: &ModelInput) -> InferenceResult<ModelOutput>;

    /// Release native resources ahead of drop.
    fn release(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_input_shape_validation() {
        assert!(ModelInput::new(vec![0.0; 12], 2, 2, 3).is_ok());
        assert!(ModelInput::new(vec![0.0; 11], 2, 2, 3).is_err());
        assert!(ModelInput::new(Vec::new(), 0, 0, 3).is_err());
    }

    #[test]
    fn test_from_image_resizes_and_normalizes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 32, Rgb([255, 0, 51])));
        let input = ModelInput::from_image(&img, 16, 16).unwrap();
        assert_eq!(input.shape(), [16, 16, 3]);
        assert!((input.data()[0] - 1.0).abs() < 1e-6);
        assert!(input.data()[1].abs() < 1e-6);
        assert!((input.data()[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_nchw_layout() {
        // 1x2 image, pixels (r,g,b) = (1,2,3), (4,5,6)
        let input = ModelInput::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 1, 2, 3).unwrap();
        assert_eq!(input.to_nchw(), vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
