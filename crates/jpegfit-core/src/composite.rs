//! Footer compositing.
//!
//! A footer is a fixed image appended beneath every converted image. It is
//! resized to the primary image's width with its aspect ratio preserved, and
//! the two are stacked on a white canvas.

use image::{Rgb, RgbImage};
use thiserror::Error;

use crate::decode::{decode_image, height_for_width, resize, DecodeError, DecodedImage, FilterType};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Errors from loading a footer or compositing it.
#[derive(Debug, Error)]
pub enum CompositeError {
    /// The footer has a zero dimension, so its aspect ratio is undefined.
    #[error("Footer image is empty ({width}x{height})")]
    EmptyFooter { width: u32, height: u32 },

    /// The primary image has a zero dimension.
    #[error("Primary image is empty ({width}x{height})")]
    EmptyPrimary { width: u32, height: u32 },

    /// The footer bytes could not be decoded.
    #[error("Failed to decode footer image: {0}")]
    Decode(#[from] DecodeError),

    /// The stacked height overflows the pixel dimension type.
    #[error("Composited image too large: {width}x{height}")]
    TooLarge { width: u32, height: u32 },
}

/// A validated footer image, loaded once and shared read-only across a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FooterAsset {
    image: DecodedImage,
}

impl FooterAsset {
    /// Wrap an already decoded footer, rejecting empty images.
    pub fn new(image: DecodedImage) -> Result<Self, CompositeError> {
        if image.is_empty() {
            return Err(CompositeError::EmptyFooter {
                width: image.width,
                height: image.height,
            });
        }
        Ok(Self { image })
    }

    /// Decode a footer from any accepted container.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CompositeError> {
        Self::new(decode_image(bytes)?)
    }

    pub fn image(&self) -> &DecodedImage {
        &self.image
    }
}

/// Whether a footer was appended to an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FooterStatus {
    /// The footer was composited beneath the image.
    Composited,
    /// No footer was available; the image passed through unchanged.
    Skipped,
}

/// Stack `footer`, resized to `primary.width`, beneath `primary`.
///
/// The result is `primary.width` wide and
/// `primary.height + round(footer.height * primary.width / footer.width)` tall.
/// Neither input is modified.
///
/// # Errors
///
/// Returns `CompositeError::EmptyFooter` or `CompositeError::EmptyPrimary`
/// when either image has a zero dimension, and `CompositeError::TooLarge`
/// when the stacked height does not fit in a `u32`. The size is checked
/// before any pixels are allocated.
pub fn compose(primary: &DecodedImage, footer: &DecodedImage) -> Result<DecodedImage, CompositeError> {
    if footer.is_empty() {
        return Err(CompositeError::EmptyFooter {
            width: footer.width,
            height: footer.height,
        });
    }
    if primary.is_empty() {
        return Err(CompositeError::EmptyPrimary {
            width: primary.width,
            height: primary.height,
        });
    }

    let width = primary.width;
    let too_large = || CompositeError::TooLarge {
        width,
        height: u32::MAX,
    };
    let footer_height =
        height_for_width(footer.width, footer.height, width).ok_or_else(too_large)?;
    let height = primary
        .height
        .checked_add(footer_height)
        .ok_or_else(too_large)?;

    let resized = resize(footer, width, footer_height, FilterType::Lanczos3)?;

    let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);
    let top = primary
        .to_rgb_image()
        .ok_or_else(|| DecodeError::CorruptedFile("Primary pixel buffer mismatch".to_string()))?;
    let bottom = resized
        .into_rgb_image()
        .ok_or_else(|| DecodeError::CorruptedFile("Footer pixel buffer mismatch".to_string()))?;

    image::imageops::replace(&mut canvas, &top, 0, 0);
    image::imageops::replace(&mut canvas, &bottom, 0, i64::from(primary.height));

    Ok(DecodedImage::from_rgb_image(canvas))
}

/// Append the footer if one is available, consuming the primary image.
///
/// With no footer the image is returned untouched together with
/// [`FooterStatus::Skipped`], so the caller can warn once per batch.
pub fn apply_footer(
    image: DecodedImage,
    footer: Option<&FooterAsset>,
) -> Result<(DecodedImage, FooterStatus), CompositeError> {
    match footer {
        Some(asset) => Ok((compose(&image, asset.image())?, FooterStatus::Composited)),
        None => Ok((image, FooterStatus::Skipped)),
    }
}
