//! Core types shared by decoding, resizing and encoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error types for image decoding and resampling.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The container format is not recognized or not on the allow-list.
    #[error("Invalid or unsupported image format")]
    InvalidFormat,

    /// The file name carries an extension outside the accepted formats.
    #[error("Unsupported file type: {0}")]
    UnsupportedExtension(String),

    /// The container was recognized but its data could not be decoded.
    #[error("Corrupted or incomplete image file: {0}")]
    CorruptedFile(String),

    /// A resize target or source had a zero dimension.
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Input formats accepted by the converter.
///
/// JPEG input is decoded and re-encoded like every other format so the
/// size budget applies uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Png,
    Bmp,
    Tiff,
    Jpeg,
    WebP,
}

impl ImageFormat {
    /// All accepted formats, in the order they are advertised to users.
    pub const ALL: [ImageFormat; 5] = [
        ImageFormat::Png,
        ImageFormat::Bmp,
        ImageFormat::Tiff,
        ImageFormat::Jpeg,
        ImageFormat::WebP,
    ];

    /// Look up a format by file extension (case-insensitive, no leading dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "bmp" => Some(ImageFormat::Bmp),
            "tif" | "tiff" => Some(ImageFormat::Tiff),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            "webp" => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Look up a format from a declared file name.
    pub fn from_name(name: &str) -> Option<Self> {
        let (_, ext) = name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// File extensions recognized for this format.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            ImageFormat::Png => &["png"],
            ImageFormat::Bmp => &["bmp"],
            ImageFormat::Tiff => &["tiff", "tif"],
            ImageFormat::Jpeg => &["jpeg", "jpg"],
            ImageFormat::WebP => &["webp"],
        }
    }

    /// Every accepted extension across all formats.
    pub fn all_extensions() -> Vec<&'static str> {
        Self::ALL
            .iter()
            .flat_map(|format| format.extensions().iter().copied())
            .collect()
    }

    pub(crate) fn to_image_format(self) -> image::ImageFormat {
        match self {
            ImageFormat::Png => image::ImageFormat::Png,
            ImageFormat::Bmp => image::ImageFormat::Bmp,
            ImageFormat::Tiff => image::ImageFormat::Tiff,
            ImageFormat::Jpeg => image::ImageFormat::Jpeg,
            ImageFormat::WebP => image::ImageFormat::WebP,
        }
    }

    pub(crate) fn from_image_format(format: image::ImageFormat) -> Option<Self> {
        match format {
            image::ImageFormat::Png => Some(ImageFormat::Png),
            image::ImageFormat::Bmp => Some(ImageFormat::Bmp),
            image::ImageFormat::Tiff => Some(ImageFormat::Tiff),
            image::ImageFormat::Jpeg => Some(ImageFormat::Jpeg),
            image::ImageFormat::WebP => Some(ImageFormat::WebP),
            _ => None,
        }
    }

    /// Whether the container can carry an EXIF orientation tag we honor.
    pub(crate) fn has_exif(self) -> bool {
        matches!(self, ImageFormat::Jpeg | ImageFormat::Tiff)
    }
}

/// Returns true if `name` has an extension on the accepted-format allow-list.
pub fn is_supported_name(name: &str) -> bool {
    ImageFormat::from_name(name).is_some()
}

/// Resampling kernel used when an image is scaled.
///
/// Scale descent and footer fitting both default to Lanczos3; the cheaper
/// kernels exist mostly so large test fixtures resize quickly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    Nearest,
    /// Maps to the `image` crate's triangle filter.
    Bilinear,
    #[default]
    Lanczos3,
}

impl FilterType {
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        use image::imageops::FilterType as Kernel;

        match self {
            FilterType::Nearest => Kernel::Nearest,
            FilterType::Bilinear => Kernel::Triangle,
            FilterType::Lanczos3 => Kernel::Lanczos3,
        }
    }
}

/// A decoded, opaque RGB image.
///
/// Every input is normalized to this representation before compositing or
/// encoding. Alpha channels and color profiles do not survive normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGB8, `width * height * 3` bytes.
    pub pixels: Vec<u8>,
}

impl DecodedImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        debug_assert_eq!(
            pixels.len(),
            width as usize * height as usize * 3,
            "RGB buffer does not match {width}x{height}"
        );
        Self {
            width,
            height,
            pixels,
        }
    }

    /// A single-color image.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        let pixels = rgb
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn from_rgb_image(rgb: image::RgbImage) -> Self {
        Self {
            width: rgb.width(),
            height: rgb.height(),
            pixels: rgb.into_raw(),
        }
    }

    /// Copy into an `image::RgbImage`; `None` if the buffer length is off.
    pub fn to_rgb_image(&self) -> Option<image::RgbImage> {
        self.clone().into_rgb_image()
    }

    /// Move into an `image::RgbImage` without copying pixels.
    pub fn into_rgb_image(self) -> Option<image::RgbImage> {
        image::RgbImage::from_raw(self.width, self.height, self.pixels)
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// True when either dimension is zero or there are no pixels.
    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0 || self.pixels.is_empty()
    }
}
