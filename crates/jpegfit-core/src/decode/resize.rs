//! Image resizing for scale descent and footer fitting.
//!
//! All functions return new `DecodedImage` instances without modifying the input.

use super::{DecodeError, DecodedImage, FilterType};

/// Resize an image to exact dimensions.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` if either target dimension is
/// zero, or `DecodeError::CorruptedFile` if the pixel buffer does not match
/// the source dimensions.
pub fn resize(
    image: &DecodedImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    // Fast path: if dimensions match, just clone
    if image.width == width && image.height == height {
        return Ok(image.clone());
    }

    let rgb_image = image
        .to_rgb_image()
        .ok_or_else(|| DecodeError::CorruptedFile("Failed to create RgbImage".to_string()))?;

    let resized = image::imageops::resize(&rgb_image, width, height, filter.to_image_filter());

    Ok(DecodedImage::from_rgb_image(resized))
}

/// Resize an image by a uniform factor of its own dimensions.
///
/// Each dimension is truncated (`floor(dim * scale)`) and clamped to at least
/// one pixel. A factor of `1.0` or more returns an unchanged copy.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` if `scale` is not positive.
pub fn scale_by(
    image: &DecodedImage,
    scale: f64,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    if scale.is_nan() || scale <= 0.0 {
        return Err(DecodeError::InvalidDimensions {
            width: 0,
            height: 0,
        });
    }
    if scale >= 1.0 {
        return Ok(image.clone());
    }

    let (width, height) = scaled_dimensions(image.width, image.height, scale);
    resize(image, width, height, filter)
}

/// Resize an image to the given width, preserving its aspect ratio.
///
/// The new height is `round(height * width / image.width)`, at least 1.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` if the source or target width is
/// zero, or if the new height does not fit in a `u32`.
pub fn resize_to_width(
    image: &DecodedImage,
    width: u32,
    filter: FilterType,
) -> Result<DecodedImage, DecodeError> {
    if image.width == 0 || image.height == 0 || width == 0 {
        return Err(DecodeError::InvalidDimensions {
            width: image.width,
            height: image.height,
        });
    }

    let height = height_for_width(image.width, image.height, width).ok_or(
        DecodeError::InvalidDimensions {
            width,
            height: u32::MAX,
        },
    )?;
    resize(image, width, height, filter)
}

/// Dimensions after a uniform downscale, truncating like integer casts do.
pub(crate) fn scaled_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    let w = (f64::from(width) * scale).floor() as u32;
    let h = (f64::from(height) * scale).floor() as u32;
    (w.max(1), h.max(1))
}

/// Aspect-preserving height for a new width, `None` if it overflows `u32`.
/// Callers guarantee `src_width > 0`.
pub(crate) fn height_for_width(src_width: u32, src_height: u32, width: u32) -> Option<u32> {
    let h = (f64::from(src_height) * f64::from(width) / f64::from(src_width)).round();
    if h > f64::from(u32::MAX) {
        return None;
    }
    Some((h as u32).max(1))
}
