//! Image artifact encoding.
//!
//! The pipeline hands raw rasters to an `ArtifactEncoder` and stores whatever
//! bytes come back. Nothing downstream inspects them; they exist for humans.

use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, ImageError, RgbImage};
use serde::{Deserialize, Serialize, Serializer};

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    #[default]
    Jpeg,
    Png,
}

impl ArtifactFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArtifactFormat::Jpeg => "jpg",
            ArtifactFormat::Png => "png",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Some(ArtifactFormat::Jpeg),
            "png" => Some(ArtifactFormat::Png),
            _ => None,
        }
    }
}

/// Opaque encoded image. Serializes as a base64 string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    pub format: ArtifactFormat,
    pub bytes: Vec<u8>,
}

impl EncodedImage {
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }
}

impl Serialize for EncodedImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base64())
    }
}

/// Raw raster in, opaque bytes out.
pub trait ArtifactEncoder: Send + Sync {
    fn encode(&self, image: &RgbImage) -> Result<EncodedImage, ImageError>;
}

/// Encoder backed by the `image` codecs.
#[derive(Clone, Copy, Debug)]
pub struct ImageArtifactEncoder {
    format: ArtifactFormat,
    jpeg_quality: u8,
}

impl ImageArtifactEncoder {
    pub fn new(format: ArtifactFormat) -> Self {
        Self {
            format,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }

    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }
}

impl Default for ImageArtifactEncoder {
    fn default() -> Self {
        Self::new(ArtifactFormat::default())
    }
}

impl ArtifactEncoder for ImageArtifactEncoder {
    fn encode(&self, image: &RgbImage) -> Result<EncodedImage, ImageError> {
        let mut bytes = Vec::new();
        let (w, h) = image.dimensions();
        match self.format {
            ArtifactFormat::Jpeg => JpegEncoder::new_with_quality(&mut bytes, self.jpeg_quality)
                .write_image(image.as_raw(), w, h, ExtendedColorType::Rgb8)?,
            ArtifactFormat::Png => {
                PngEncoder::new(&mut bytes).write_image(image.as_raw(), w, h, ExtendedColorType::Rgb8)?
            }
        }
        Ok(EncodedImage {
            format: self.format,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn png_artifact_decodes_to_same_dimensions() {
        let img = RgbImage::from_pixel(7, 5, Rgb([10, 20, 30]));
        let encoded = ImageArtifactEncoder::new(ArtifactFormat::Png)
            .encode(&img)
            .unwrap();
        assert_eq!(encoded.format, ArtifactFormat::Png);
        let decoded = image::load_from_memory(&encoded.bytes).unwrap().to_rgb8();
        assert_eq!(decoded, img);
    }

    #[test]
    fn jpeg_artifact_has_soi_marker() {
        let img = RgbImage::from_pixel(16, 16, Rgb([200, 100, 0]));
        let encoded = ImageArtifactEncoder::default()
            .with_jpeg_quality(75)
            .encode(&img)
            .unwrap();
        assert_eq!(&encoded.bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn serializes_as_base64_string() {
        let encoded = EncodedImage {
            format: ArtifactFormat::Png,
            bytes: vec![1, 2, 3],
        };
        assert_eq!(serde_json::to_string(&encoded).unwrap(), "\"AQID\"");
    }

    #[test]
    fn parses_format_names() {
        assert_eq!(ArtifactFormat::parse("JPG"), Some(ArtifactFormat::Jpeg));
        assert_eq!(ArtifactFormat::parse("png"), Some(ArtifactFormat::Png));
        assert_eq!(ArtifactFormat::parse("gif"), None);
    }
}
