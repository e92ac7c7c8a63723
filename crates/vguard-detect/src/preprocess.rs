//! Frame decoding and normalization.

use image::GenericImageView;
use serde::Serialize;
use vguard_inference::ModelInput;

use crate::error::{DetectError, DetectResult};

/// Square input size of the object-detection model.
pub const DEFAULT_INPUT_SIZE: u32 = 416;

/// Decoded frame resized for the detector, with its source dimensions.
#[derive(Debug, Clone)]
pub struct NormalizedFrame {
    pub input: ModelInput,
    pub original_width: u32,
    pub original_height: u32,
}

/// Dimensions reported with a frame analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameInfo {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl NormalizedFrame {
    /// Factors mapping model-input pixels back to source pixels.
    pub fn scale_factors(&self) -> (f64, f64) {
        (
            self.original_width as f64 / self.input.width() as f64,
            self.original_height as f64 / self.input.height() as f64,
        )
    }

    pub fn info(&self) -> FrameInfo {
        FrameInfo {
            width: self.input.width(),
            height: self.input.height(),
            channels: self.input.channels(),
            original_width: self.original_width,
            original_height: self.original_height,
        }
    }
}

/// Decode raw image bytes (JPEG/PNG) and resize exactly to `size`x`size` RGB.
///
/// The aspect ratio is not preserved.
pub fn preprocess(raw: &[u8], size: u32) -> DetectResult<NormalizedFrame> {
    if raw.is_empty() {
        return Err(DetectError::validation("frame data is empty"));
    }

    let img = image::load_from_memory(raw)?;
    let (original_width, original_height) = img.dimensions();
    let input = ModelInput::from_image(&img, size, size)?;

    Ok(NormalizedFrame {
        input,
        original_width,
        original_height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn jpeg(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([120, 60, 30])));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageOutputFormat::Jpeg(90)).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_resizes_and_keeps_original_dimensions() {
        let frame = preprocess(&jpeg(640, 480), DEFAULT_INPUT_SIZE).unwrap();
        assert_eq!(frame.input.shape(), [416, 416, 3]);
        assert_eq!((frame.original_width, frame.original_height), (640, 480));

        let (sx, sy) = frame.scale_factors();
        assert!((sx - 640.0 / 416.0).abs() < 1e-9);
        assert!((sy - 480.0 / 416.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_input_is_validation_error() {
        assert!(matches!(preprocess(&[], 416), Err(DetectError::Validation(_))));
    }

    #[test]
    fn test_garbage_input_is_decode_error() {
        assert!(matches!(
            preprocess(b"not an image", 416),
            Err(DetectError::Decode(_))
        ));
    }
}
