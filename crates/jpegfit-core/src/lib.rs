//! jpegfit Core - Budgeted JPEG conversion library
//!
//! This crate converts uploaded images (PNG, BMP, TIFF, JPEG, WebP) to JPEG,
//! optionally appending a footer image and searching for the highest quality
//! and scale that fit a byte budget.

pub mod archive;
pub mod composite;
pub mod config;
pub mod convert;
pub mod decode;
pub mod encode;

pub use archive::{ArchiveSink, DirectorySink, MemorySink};
pub use composite::{apply_footer, compose, CompositeError, FooterAsset, FooterStatus};
pub use config::{parse_byte_size, ConfigError, ConverterConfig, DEFAULT_BUDGET_BYTES};
pub use convert::{
    convert_batch, convert_one, output_name, BatchReport, ConvertOptions, FailureKind, InputItem,
    ItemError, ItemOutcome, ItemReport, Notice, OUTPUT_EXTENSION, PREVIEW_LIMIT,
};
pub use decode::{decode_image, decode_named, DecodeError, DecodedImage, FilterType, ImageFormat};
pub use encode::{
    encode_with_budget, encode_with_budget_using, ConversionOutcome, EncodedJpeg, EncodingAttempt,
    ImageJpegEncoder, JpegEncoder, OverBudget, SearchError, SearchPolicy,
};
