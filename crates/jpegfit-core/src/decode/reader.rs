//! Container decoding with EXIF orientation handling.

use std::io::Cursor;

use exif::{In, Reader, Tag};
use image::DynamicImage;
use image::ImageReader;

use super::{DecodeError, DecodedImage, ImageFormat};

/// Decode any accepted image container into an opaque RGB image.
///
/// The container is detected from the bytes themselves. JPEG and TIFF input
/// has its EXIF orientation applied, since the re-encoded output carries no
/// EXIF block that could rotate it later.
///
/// # Errors
///
/// Returns `DecodeError::InvalidFormat` if the bytes are not one of the
/// accepted formats, and `DecodeError::CorruptedFile` if decoding fails.
pub fn decode_image(bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let format = reader
        .format()
        .and_then(ImageFormat::from_image_format)
        .ok_or(DecodeError::InvalidFormat)?;

    let orientation = if format.has_exif() {
        extract_orientation(bytes)
    } else {
        Orientation::Normal
    };

    let img = reader
        .decode()
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;

    let rgb_img = apply_orientation(img, orientation).into_rgb8();
    Ok(DecodedImage::from_rgb_image(rgb_img))
}

/// Decode an upload, checking its declared name against the allow-list first.
///
/// # Errors
///
/// Returns `DecodeError::UnsupportedExtension` for names outside the
/// accepted formats, otherwise whatever [`decode_image`] returns.
pub fn decode_named(name: &str, bytes: &[u8]) -> Result<DecodedImage, DecodeError> {
    if ImageFormat::from_name(name).is_none() {
        let ext = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_string())
            .unwrap_or_default();
        return Err(DecodeError::UnsupportedExtension(ext));
    }
    decode_image(bytes)
}

/// Encode an image losslessly into one of the accepted containers.
///
/// Used to hand previews and fixtures to collaborators that expect a file.
pub fn encode_container(image: &DecodedImage, format: ImageFormat) -> Result<Vec<u8>, DecodeError> {
    let rgb = image.to_rgb_image().ok_or(DecodeError::InvalidDimensions {
        width: image.width,
        height: image.height,
    })?;
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, format.to_image_format())
        .map_err(|e| DecodeError::CorruptedFile(e.to_string()))?;
    Ok(buffer.into_inner())
}

/// EXIF orientation tag values 1 through 8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Orientation {
    #[default]
    Normal,
    FlipHorizontal,
    Rotate180,
    FlipVertical,
    /// Mirrored across the top-left to bottom-right diagonal.
    Transpose,
    Rotate90CW,
    /// Mirrored across the top-right to bottom-left diagonal.
    Transverse,
    Rotate270CW,
}

impl Orientation {
    /// Unknown tag values are treated as upright.
    fn from_exif(value: u32) -> Self {
        const TABLE: [Orientation; 8] = [
            Orientation::Normal,
            Orientation::FlipHorizontal,
            Orientation::Rotate180,
            Orientation::FlipVertical,
            Orientation::Transpose,
            Orientation::Rotate90CW,
            Orientation::Transverse,
            Orientation::Rotate270CW,
        ];
        value
            .checked_sub(1)
            .and_then(|i| TABLE.get(i as usize))
            .copied()
            .unwrap_or_default()
    }
}

/// Extract EXIF orientation from container bytes.
///
/// Returns `Orientation::Normal` if no EXIF data is found or orientation
/// cannot be determined.
fn extract_orientation(bytes: &[u8]) -> Orientation {
    let mut cursor = Cursor::new(bytes);

    match Reader::new().read_from_container(&mut cursor) {
        Ok(exif) => exif
            .get_field(Tag::Orientation, In::PRIMARY)
            .and_then(|field| field.value.get_uint(0))
            .map(Orientation::from_exif)
            .unwrap_or_default(),
        Err(_) => Orientation::Normal,
    }
}

/// Apply EXIF orientation transformation to an image.
fn apply_orientation(img: DynamicImage, orientation: Orientation) -> DynamicImage {
    match orientation {
        Orientation::Normal => img,
        Orientation::FlipHorizontal => img.fliph(),
        Orientation::Rotate180 => img.rotate180(),
        Orientation::FlipVertical => img.flipv(),
        Orientation::Transpose => img.rotate90().fliph(),
        Orientation::Rotate90CW => img.rotate90(),
        Orientation::Transverse => img.rotate270().fliph(),
        Orientation::Rotate270CW => img.rotate270(),
    }
}
