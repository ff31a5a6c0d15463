//! Conversion WASM bindings.
//!
//! # Functions
//!
//! - [`convert_image`] - Convert one upload to JPEG, optionally under a budget
//! - [`convert_image_with_footer`] - Same, with a pre-decoded footer appended beneath
//! - [`convert_images`] - Convert a whole batch, decoding the footer once
//!
//! # Example
//!
//! ```typescript
//! import { convert_images } from '@jpegfit/wasm';
//!
//! const names = files.map((f) => f.name);
//! const data = await Promise.all(files.map(async (f) => new Uint8Array(await f.arrayBuffer())));
//! const footer = new Uint8Array(await (await fetch('/footer.png')).arrayBuffer());
//! const batch = convert_images(names, data, footer, { limitSize: true });
//! for (let i = 0; i < batch.convertedCount; i++) {
//!   const result = batch.get(i);
//!   console.log(`${result.outputName}: q${result.quality}, ${result.byteLength} bytes`);
//! }
//! ```

use jpegfit_core::{convert_batch, convert_one, ConvertOptions, FooterAsset, InputItem, ItemOutcome};
use wasm_bindgen::prelude::*;

use crate::types::{options_from_js, JsBatch, JsConversion, JsFooter};

/// Convert one image to JPEG.
///
/// # Arguments
///
/// * `name` - Upload file name; its extension must be on the accepted list
/// * `bytes` - Raw file contents
/// * `options` - Optional `{ limitSize, budgetBytes, policy }` object
///
/// # Errors
///
/// Returns an error string when the file cannot be decoded, or when the
/// budget cannot be met and the policy rejects over-budget images.
#[wasm_bindgen]
pub fn convert_image(name: &str, bytes: &[u8], options: JsValue) -> Result<JsConversion, JsValue> {
    let options = options_from_js(options)?;
    convert(name, bytes, None, &options).map_err(|e| JsValue::from_str(&e))
}

/// Convert one image to JPEG with a footer appended beneath it.
///
/// The footer is resized to the image's width before stacking. Decode it
/// once with `new JsFooter(bytes)` and pass the same object for every image.
#[wasm_bindgen]
pub fn convert_image_with_footer(
    name: &str,
    bytes: &[u8],
    footer: &JsFooter,
    options: JsValue,
) -> Result<JsConversion, JsValue> {
    let options = ConvertOptions {
        footer_enabled: true,
        ..options_from_js(options)?
    };
    convert(name, bytes, Some(footer.asset()), &options).map_err(|e| JsValue::from_str(&e))
}

/// Convert a batch of uploads, isolating per-file failures.
///
/// `names` and `files` (`Uint8Array`s) are parallel arrays. When `footer`
/// is given it is decoded once for the whole batch; if it is empty or cannot
/// be decoded, a single warning goes to the browser console and every image
/// is converted without it.
///
/// # Errors
///
/// Returns an error when the two arrays differ in length or the options are
/// invalid. Per-file problems are reported through [`JsBatch::failures`].
#[wasm_bindgen]
pub fn convert_images(
    names: Vec<String>,
    files: Vec<JsValue>,
    footer: Option<Vec<u8>>,
    options: JsValue,
) -> Result<JsBatch, JsValue> {
    if names.len() != files.len() {
        return Err(JsValue::from_str(&format!(
            "{} names for {} files",
            names.len(),
            files.len()
        )));
    }
    let options = options_from_js(options)?;
    let items: Vec<_> = names
        .into_iter()
        .zip(files)
        .map(|(name, file)| InputItem::new(name, js_sys::Uint8Array::new(&file).to_vec()))
        .collect();

    let (batch, warning) = run_batch(&items, footer.as_deref(), options);
    if let Some(message) = warning {
        web_sys::console::warn_1(&JsValue::from_str(&message));
    }
    Ok(batch)
}

/// Run a batch, returning the console warning to show, if any.
fn run_batch(
    items: &[InputItem],
    footer_bytes: Option<&[u8]>,
    options: ConvertOptions,
) -> (JsBatch, Option<String>) {
    let options = ConvertOptions {
        footer_enabled: footer_bytes.is_some(),
        ..options
    };
    let (footer, footer_error) = match footer_bytes.map(JsFooter::load) {
        Some(Ok(footer)) => (Some(footer), None),
        Some(Err(message)) => (None, Some(message)),
        None => (None, None),
    };

    let report = convert_batch(items, footer.as_ref().map(JsFooter::asset), &options);

    let batch = JsBatch::from_report(report);
    let warning = footer_error
        .filter(|_| batch.footer_missing())
        .map(|reason| format!("{reason}; converting without footer"));
    (batch, warning)
}

fn convert(
    name: &str,
    bytes: &[u8],
    footer: Option<&FooterAsset>,
    options: &ConvertOptions,
) -> Result<JsConversion, String> {
    let item = InputItem::new(name, bytes.to_vec());
    let report = convert_one(0, &item, footer, options);
    match report.outcome {
        ItemOutcome::Fitted(encoded) => Ok(JsConversion::from_encoded(report.output_name, encoded, true)),
        ItemOutcome::BestEffort(encoded) => {
            Ok(JsConversion::from_encoded(report.output_name, encoded, false))
        }
        ItemOutcome::Failed(err) => Err(err.to_string()),
    }
}
