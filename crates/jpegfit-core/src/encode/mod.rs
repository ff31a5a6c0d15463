//! JPEG encoding and the size-constrained search.
//!
//! This module provides functionality for:
//! - Encoding RGB pixels to JPEG with configurable quality
//! - Fitting an encoding under a byte budget by lowering quality, then scale
//!
//! # Examples
//!
//! ```ignore
//! use jpegfit_core::encode::{encode_with_budget, ConversionOutcome, SearchPolicy};
//!
//! let outcome = encode_with_budget(&image, Some(2 * 1024 * 1024), &SearchPolicy::default());
//! if let ConversionOutcome::Fitted(jpeg) = outcome {
//!     println!("q{} at {:.1}x: {} bytes", jpeg.attempt.quality, jpeg.attempt.scale, jpeg.bytes.len());
//! }
//! ```

mod jpeg;
mod policy;
mod search;

pub use jpeg::{encode_jpeg, EncodeError, ImageJpegEncoder, JpegEncoder};
pub use policy::{OverBudget, PolicyError, SearchPolicy};
pub use search::{
    encode_with_budget, encode_with_budget_using, ConversionOutcome, EncodedJpeg,
    EncodingAttempt, SearchError,
};
