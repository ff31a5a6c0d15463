//! jpegfit WASM - WebAssembly bindings for jpegfit
//!
//! This crate exposes jpegfit-core's budgeted JPEG conversion to
//! JavaScript/TypeScript so uploads can be converted in the browser.
//!
//! # Module Structure
//!
//! - `convert` - Single-image and batch conversion, with or without a footer
//! - `types` - WASM-compatible wrapper types for results, footers and options
//!
//! # Usage
//!
//! ```typescript
//! import init, { convert_image, supported_extensions } from '@jpegfit/wasm';
//!
//! await init();
//!
//! const bytes = new Uint8Array(await file.arrayBuffer());
//! const result = convert_image(file.name, bytes, { budgetBytes: 2 * 1024 * 1024 });
//! const blob = new Blob([result.bytes()], { type: 'image/jpeg' });
//! ```

use wasm_bindgen::prelude::*;

mod convert;
mod types;

pub use convert::{convert_image, convert_image_with_footer, convert_images};
pub use types::{JsBatch, JsConversion, JsFooter};

/// Initialize the WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {}

/// Get the version of the WASM module
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Output file name for an upload (`photo.png` becomes `photo.jpg`).
#[wasm_bindgen]
pub fn output_name(input: &str) -> String {
    jpegfit_core::output_name(input)
}

/// Whether an upload name carries an accepted extension.
#[wasm_bindgen]
pub fn is_supported(name: &str) -> bool {
    jpegfit_core::decode::is_supported_name(name)
}

/// Accepted upload extensions, lowercase, for an `accept` attribute.
#[wasm_bindgen]
pub fn supported_extensions() -> js_sys::Array {
    jpegfit_core::ImageFormat::all_extensions()
        .into_iter()
        .map(JsValue::from_str)
        .collect()
}
