//! WASM-compatible wrapper types for conversion results and options.

use jpegfit_core::{BatchReport, ConvertOptions, EncodedJpeg, FooterAsset, ItemOutcome, Notice, SearchPolicy};
use serde::Deserialize;
use wasm_bindgen::prelude::*;

/// A converted JPEG together with the parameters that produced it.
///
/// The JPEG bytes live in WASM memory until `bytes()` copies them out as a
/// `Uint8Array`.
#[wasm_bindgen]
#[derive(Debug, Clone)]
pub struct JsConversion {
    output_name: String,
    bytes: Vec<u8>,
    quality: u8,
    scale: f64,
    width: u32,
    height: u32,
    fitted: bool,
}

#[wasm_bindgen]
impl JsConversion {
    /// File name for the output (`<stem>.jpg`)
    #[wasm_bindgen(getter, js_name = outputName)]
    pub fn output_name(&self) -> String {
        self.output_name.clone()
    }

    /// JPEG quality used for the kept encoding
    #[wasm_bindgen(getter)]
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Scale factor relative to the (footer-composited) source
    #[wasm_bindgen(getter)]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Encoded size in bytes
    #[wasm_bindgen(getter, js_name = byteLength)]
    pub fn byte_length(&self) -> usize {
        self.bytes.len()
    }

    /// False when the budget could not be met and the smallest attempt was kept
    #[wasm_bindgen(getter)]
    pub fn fitted(&self) -> bool {
        self.fitted
    }

    /// Returns the JPEG bytes as a Uint8Array (copied out of WASM memory).
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.clone()
    }
}

impl JsConversion {
    pub(crate) fn from_encoded(output_name: String, encoded: EncodedJpeg, fitted: bool) -> Self {
        Self {
            output_name,
            quality: encoded.attempt.quality,
            scale: encoded.attempt.scale,
            width: encoded.attempt.width,
            height: encoded.attempt.height,
            bytes: encoded.bytes,
            fitted,
        }
    }
}

/// A footer decoded once and reused for any number of conversions.
///
/// ```typescript
/// const footer = new JsFooter(new Uint8Array(await res.arrayBuffer()));
/// for (const file of files) convert_image_with_footer(file.name, bytes, footer);
/// ```
#[wasm_bindgen]
#[derive(Debug)]
pub struct JsFooter {
    asset: FooterAsset,
}

#[wasm_bindgen]
impl JsFooter {
    /// Decode footer bytes in any accepted format.
    #[wasm_bindgen(constructor)]
    pub fn new(bytes: &[u8]) -> Result<JsFooter, JsValue> {
        Self::load(bytes).map_err(|e| JsValue::from_str(&e))
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.asset.image().width
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.asset.image().height
    }
}

impl JsFooter {
    pub(crate) fn load(bytes: &[u8]) -> Result<Self, String> {
        if bytes.is_empty() {
            return Err("Footer image not provided".to_string());
        }
        FooterAsset::from_bytes(bytes)
            .map(|asset| Self { asset })
            .map_err(|e| e.to_string())
    }

    pub(crate) fn asset(&self) -> &FooterAsset {
        &self.asset
    }
}

/// Results of a batch conversion, in input order.
///
/// Failed items are listed as `"<name>: <reason>"` strings; the rest can be
/// fetched with `get(i)`.
#[wasm_bindgen]
#[derive(Debug)]
pub struct JsBatch {
    converted: Vec<JsConversion>,
    failures: Vec<String>,
    footer_missing: bool,
}

#[wasm_bindgen]
impl JsBatch {
    #[wasm_bindgen(getter, js_name = convertedCount)]
    pub fn converted_count(&self) -> usize {
        self.converted.len()
    }

    /// The `index`-th converted image, or `undefined` past the end.
    pub fn get(&self, index: usize) -> Option<JsConversion> {
        self.converted.get(index).cloned()
    }

    #[wasm_bindgen(getter, js_name = failedCount)]
    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> Vec<String> {
        self.failures.clone()
    }

    /// True when a footer was requested but could not be used.
    #[wasm_bindgen(getter, js_name = footerMissing)]
    pub fn footer_missing(&self) -> bool {
        self.footer_missing
    }
}

impl JsBatch {
    pub(crate) fn from_report(report: BatchReport) -> Self {
        let footer_missing = report.notices.contains(&Notice::FooterAssetMissing);
        let mut converted = Vec::new();
        let mut failures = Vec::new();
        for item in report.items {
            match item.outcome {
                ItemOutcome::Fitted(encoded) => {
                    converted.push(JsConversion::from_encoded(item.output_name, encoded, true));
                }
                ItemOutcome::BestEffort(encoded) => {
                    converted.push(JsConversion::from_encoded(item.output_name, encoded, false));
                }
                ItemOutcome::Failed(err) => failures.push(format!("{}: {err}", item.input_name)),
            }
        }
        Self {
            converted,
            failures,
            footer_missing,
        }
    }
}

/// Options accepted from JavaScript, all optional:
///
/// ```typescript
/// { limitSize: true, budgetBytes: 1500000,
///   policy: { scale_floor: 0.4, over_budget: "best-effort" } }
/// ```
///
/// Whether a footer is used follows from the function called, so there is
/// no footer switch here.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct JsOptions {
    limit_size: bool,
    budget_bytes: Option<u64>,
    policy: SearchPolicy,
}

impl JsOptions {
    pub(crate) fn into_options(self) -> Result<ConvertOptions, String> {
        self.policy.validate().map_err(|e| e.to_string())?;
        let budget_bytes = match self.budget_bytes {
            Some(0) => return Err("budgetBytes must be positive".to_string()),
            Some(bytes) => Some(bytes),
            None if self.limit_size => Some(jpegfit_core::DEFAULT_BUDGET_BYTES),
            None => None,
        };
        Ok(ConvertOptions {
            budget_bytes,
            footer_enabled: false,
            policy: self.policy,
            // The browser has no thread pool.
            parallel: false,
        })
    }
}

/// Parse options from a JS value; `undefined` and `null` give the defaults.
pub(crate) fn options_from_js(value: JsValue) -> Result<ConvertOptions, JsValue> {
    let options: JsOptions = if value.is_undefined() || value.is_null() {
        JsOptions::default()
    } else {
        serde_wasm_bindgen::from_value(value).map_err(|e| JsValue::from_str(&e.to_string()))?
    };
    options.into_options().map_err(|e| JsValue::from_str(&e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jpegfit_core::{EncodingAttempt, OverBudget};

    #[test]
    fn test_default_options() {
        let options = JsOptions::default().into_options().unwrap();
        assert_eq!(options.budget_bytes, None);
        assert!(!options.footer_enabled);
        assert!(!options.parallel);
    }

    #[test]
    fn test_limit_size_uses_default_budget() {
        let options = JsOptions {
            limit_size: true,
            ..JsOptions::default()
        }
        .into_options()
        .unwrap();
        assert_eq!(options.budget_bytes, Some(2 * 1024 * 1024));
    }

    #[test]
    fn test_explicit_budget_and_policy() {
        let options = JsOptions {
            budget_bytes: Some(500_000),
            policy: SearchPolicy::best_effort(),
            ..JsOptions::default()
        }
        .into_options()
        .unwrap();
        assert_eq!(options.budget_bytes, Some(500_000));
        assert_eq!(options.policy.over_budget, OverBudget::BestEffort);
    }

    #[test]
    fn test_zero_budget_rejected() {
        let result = JsOptions {
            budget_bytes: Some(0),
            ..JsOptions::default()
        }
        .into_options();
        assert!(result.is_err());
    }

    #[test]
    fn test_footer_switch_is_not_an_option() {
        use serde::de::value::{Error as ValueError, MapDeserializer};

        let footer = MapDeserializer::<_, ValueError>::new([("footerEnabled", true)].into_iter());
        assert!(JsOptions::deserialize(footer).is_err());

        let limit = MapDeserializer::<_, ValueError>::new([("limitSize", true)].into_iter());
        let options = JsOptions::deserialize(limit).unwrap().into_options().unwrap();
        assert_eq!(options.budget_bytes, Some(2 * 1024 * 1024));
    }

    #[test]
    fn test_footer_dimensions_and_errors() {
        use jpegfit_core::decode::encode_container;
        use jpegfit_core::{DecodedImage, ImageFormat};

        let png = encode_container(&DecodedImage::filled(30, 6, [0, 0, 0]), ImageFormat::Png).unwrap();
        let footer = JsFooter::load(&png).unwrap();
        assert_eq!((footer.width(), footer.height()), (30, 6));

        assert!(JsFooter::load(&[]).is_err());
        assert!(JsFooter::load(b"not an image").is_err());
    }

    #[test]
    fn test_conversion_accessors() {
        let encoded = EncodedJpeg {
            bytes: vec![0xFF, 0xD8, 0xFF, 0xD9],
            attempt: EncodingAttempt {
                index: 3,
                quality: 80,
                scale: 1.0,
                width: 10,
                height: 5,
                byte_len: 4,
            },
        };

        let conversion = JsConversion::from_encoded("a.jpg".to_string(), encoded, true);

        assert_eq!(conversion.output_name(), "a.jpg");
        assert_eq!(conversion.quality(), 80);
        assert_eq!((conversion.width(), conversion.height()), (10, 5));
        assert_eq!(conversion.byte_length(), 4);
        assert!(conversion.fitted());
        assert_eq!(conversion.bytes(), vec![0xFF, 0xD8, 0xFF, 0xD9]);
    }
}
