//! Frame container and input validation.
//!
//! - `Frame`: immutable RGB raster handed to the detection pipeline. Pixels are
//!   read-only; annotation always happens on a copy.
//! - `Mask`: single-channel binary raster, values in {0, 255}, same dimensions
//!   as the frame it was derived from.
//!
//! Every constructor validates dimensions, so a `Frame` that exists is always a
//! legal pipeline input. Decoding failures surface as `DetectError::InvalidInput`.

use base64::Engine;
use image::{imageops::FilterType, GrayImage, RgbImage};

use crate::error::DetectError;

/// Binary fire-likelihood raster.
pub type Mask = GrayImage;

/// Largest encoded payload accepted by `Frame::decode`.
pub const MAX_ENCODED_BYTES: usize = 20 * 1024 * 1024;

/// Largest decoded frame accepted (width * height).
pub const MAX_PIXELS: u64 = 100_000_000;

/// A single still image or video frame, RGB order, 8 bits per sample.
#[derive(Clone, Debug)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// Wrap an already decoded raster.
    pub fn from_image(image: RgbImage) -> Result<Self, DetectError> {
        validate_dimensions(image.width(), image.height())?;
        Ok(Self { image })
    }

    /// Build a frame from packed RGB24 samples.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, DetectError> {
        validate_dimensions(width, height)?;
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| DetectError::invalid("RGB frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(DetectError::invalid(format!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            )));
        }
        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| DetectError::invalid("RGB buffer does not match dimensions"))?;
        Ok(Self { image })
    }

    /// Decode an encoded image (JPEG or PNG) into a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, DetectError> {
        if bytes.is_empty() {
            return Err(DetectError::invalid("empty image payload"));
        }
        if bytes.len() > MAX_ENCODED_BYTES {
            return Err(DetectError::invalid(format!(
                "encoded image too large: {} bytes (max: {})",
                bytes.len(),
                MAX_ENCODED_BYTES
            )));
        }
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| DetectError::invalid(format!("undecodable image: {}", e)))?;
        Self::from_image(decoded.to_rgb8())
    }

    /// Decode a base64 payload. A `data:<mime>;base64,` prefix is stripped.
    pub fn decode_base64(payload: &str) -> Result<Self, DetectError> {
        let data = match payload.split_once(',') {
            Some((_, rest)) => rest,
            None => payload,
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(data.trim())
            .map_err(|e| DetectError::invalid(format!("invalid base64 payload: {}", e)))?;
        Self::decode(&bytes)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Read-only pixel access for the pipeline stages.
    pub fn as_image(&self) -> &RgbImage {
        &self.image
    }

    /// Bilinear resize to a working resolution. Returns `self` unchanged
    /// (cloned) when the size already matches.
    pub fn resized(&self, width: u32, height: u32) -> Result<Self, DetectError> {
        validate_dimensions(width, height)?;
        if self.width() == width && self.height() == height {
            return Ok(self.clone());
        }
        let image = image::imageops::resize(&self.image, width, height, FilterType::Triangle);
        Ok(Self { image })
    }

    /// Owned copy used as the annotation canvas.
    pub(crate) fn canvas(&self) -> RgbImage {
        self.image.clone()
    }
}

fn validate_dimensions(width: u32, height: u32) -> Result<(), DetectError> {
    if width == 0 || height == 0 {
        return Err(DetectError::invalid(format!(
            "degenerate frame dimensions: {}x{}",
            width, height
        )));
    }
    if u64::from(width) * u64::from(height) > MAX_PIXELS {
        return Err(DetectError::invalid(format!(
            "frame too large: {}x{} pixels (max: {})",
            width, height, MAX_PIXELS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::io::Cursor;

    fn png_bytes(image: &RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        image::DynamicImage::ImageRgb8(image.clone())
            .write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn rejects_degenerate_dimensions() {
        let err = Frame::from_rgb(0, 4, vec![]).unwrap_err();
        assert!(err.is_invalid_input());
        let err = Frame::from_image(RgbImage::new(5, 0)).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn rgb_constructor_validates_length() {
        assert!(Frame::from_rgb(2, 2, vec![0u8; 12]).is_ok());
        let err = Frame::from_rgb(2, 2, vec![0u8; 11]).unwrap_err();
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn garbage_bytes_are_invalid_input() {
        assert!(Frame::decode(b"definitely not a jpeg").unwrap_err().is_invalid_input());
        assert!(Frame::decode(&[]).unwrap_err().is_invalid_input());
        assert!(Frame::decode_base64("%%%").unwrap_err().is_invalid_input());
    }

    #[test]
    fn decodes_data_url_payload() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(1, 1, Rgb([255, 128, 0]));
        let encoded = base64::engine::general_purpose::STANDARD.encode(png_bytes(&img));
        let frame = Frame::decode_base64(&format!("data:image/png;base64,{}", encoded)).unwrap();
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(frame.as_image().get_pixel(1, 1), &Rgb([255, 128, 0]));
    }

    #[test]
    fn resize_to_working_size() {
        let frame = Frame::from_image(RgbImage::new(40, 20)).unwrap();
        let resized = frame.resized(20, 10).unwrap();
        assert_eq!((resized.width(), resized.height()), (20, 10));
        assert!(frame.resized(0, 10).is_err());
    }
}
