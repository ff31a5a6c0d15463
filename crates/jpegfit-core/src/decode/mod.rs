//! Decoding and resampling for the conversion pipeline.
//!
//! This module provides functionality for:
//! - Decoding every accepted input container into opaque RGB
//! - Checking upload names against the accepted-format allow-list
//! - Resizing for the scale-descent phase and for footer fitting
//!
//! All operations are synchronous and CPU-bound; nothing here performs I/O
//! beyond reading the caller-supplied byte slice.

mod reader;
mod resize;
mod types;

pub use reader::{decode_image, decode_named, encode_container};
pub use resize::{resize, resize_to_width, scale_by};
pub(crate) use resize::height_for_width;
pub use types::{is_supported_name, DecodeError, DecodedImage, FilterType, ImageFormat};
