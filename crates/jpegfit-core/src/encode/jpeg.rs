//! The JPEG encode primitive and the encoder seam used by the budget search.

use image::codecs::jpeg::JpegEncoder as ImageCrateJpegEncoder;
use image::ExtendedColorType;
use image::ImageEncoder;
use std::io::Cursor;
use thiserror::Error;

use crate::decode::DecodedImage;

/// Errors that can occur during JPEG encoding.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Pixel data length doesn't match expected dimensions
    #[error("Invalid pixel data: expected {expected} bytes (width * height * 3), got {actual}")]
    InvalidPixelData { expected: usize, actual: usize },

    /// Width or height is zero
    #[error("Invalid dimensions: width ({width}) and height ({height}) must be non-zero")]
    InvalidDimensions { width: u32, height: u32 },

    /// JPEG encoding failed
    #[error("JPEG encoding failed: {0}")]
    EncodingFailed(String),
}

/// Encode RGB pixel data to JPEG bytes.
///
/// # Arguments
///
/// * `pixels` - RGB pixel data (3 bytes per pixel, row-major order)
/// * `width` - Image width in pixels
/// * `height` - Image height in pixels
/// * `quality` - JPEG quality, clamped to 1-100
///
/// # Errors
///
/// Returns `EncodeError::InvalidDimensions` for a zero dimension,
/// `EncodeError::InvalidPixelData` when the buffer length is wrong, and
/// `EncodeError::EncodingFailed` if the codec rejects the data.
pub fn encode_jpeg(
    pixels: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Vec<u8>, EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::InvalidDimensions { width, height });
    }

    let expected_len = (width as usize) * (height as usize) * 3;
    if pixels.len() != expected_len {
        return Err(EncodeError::InvalidPixelData {
            expected: expected_len,
            actual: pixels.len(),
        });
    }

    let quality = quality.clamp(1, 100);

    let mut buffer = Cursor::new(Vec::new());
    let encoder = ImageCrateJpegEncoder::new_with_quality(&mut buffer, quality);

    encoder
        .write_image(pixels, width, height, ExtendedColorType::Rgb8)
        .map_err(|e| EncodeError::EncodingFailed(e.to_string()))?;

    Ok(buffer.into_inner())
}

/// An encoder the budget search can drive.
///
/// Implementations must be deterministic: the same image and quality always
/// produce the same bytes. The search relies on this for reproducible
/// attempt sequences.
pub trait JpegEncoder: Send + Sync {
    /// Encode `image` at `quality` (1-100).
    fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>, EncodeError>;
}

/// Production encoder backed by the `image` crate's baseline JPEG codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageJpegEncoder;

impl JpegEncoder for ImageJpegEncoder {
    fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
        encode_jpeg(&image.pixels, image.width, image.height, quality)
    }
}
