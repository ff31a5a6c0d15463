//! Batch conversion: decode, optional footer, budgeted encode, per item.
//!
//! Items never share mutable state. A failure in one item is recorded in its
//! report and the batch carries on. Reports always come back in input order,
//! whether the batch ran sequentially or on the rayon pool, so archives built
//! from them are reproducible.

use std::io;

use thiserror::Error;
use tracing::{info, warn};

use crate::archive::{ArchiveSink, UniqueNames};
use crate::composite::{apply_footer, CompositeError, FooterAsset, FooterStatus};
use crate::decode::{decode_named, DecodeError, DecodedImage};
use crate::encode::{encode_with_budget, ConversionOutcome, EncodedJpeg, SearchError, SearchPolicy};

/// Canonical extension of every output file.
pub const OUTPUT_EXTENSION: &str = "jpg";

/// Number of leading items flagged for preview.
pub const PREVIEW_LIMIT: usize = 10;

/// One upload: its declared file name and raw bytes.
#[derive(Debug, Clone)]
pub struct InputItem {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Set when the bytes could not be read; the item is reported as failed.
    pub read_error: Option<String>,
}

impl InputItem {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            read_error: None,
        }
    }

    /// An input whose contents could not be read. It keeps its place in the
    /// batch and shows up as a failed item.
    pub fn unreadable(name: impl Into<String>, err: &io::Error) -> Self {
        Self {
            name: name.into(),
            bytes: Vec::new(),
            read_error: Some(err.to_string()),
        }
    }
}

/// Options shared by every item in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Byte budget per image; `None` means a single encode at initial quality.
    pub budget_bytes: Option<u64>,
    /// Append the footer asset to every image.
    pub footer_enabled: bool,
    /// Search parameters.
    pub policy: SearchPolicy,
    /// Convert items on the rayon pool when the `parallel` feature is on.
    pub parallel: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            budget_bytes: None,
            footer_enabled: false,
            policy: SearchPolicy::default(),
            parallel: true,
        }
    }
}

/// Broad failure category, for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    DecodeFailure,
    EncodeFailure,
    BudgetUnreachable,
}

/// Why an item produced no output.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error("Failed to read input: {0}")]
    Read(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Composite(#[from] CompositeError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl ItemError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ItemError::Read(_) | ItemError::Decode(_) => FailureKind::DecodeFailure,
            ItemError::Search(SearchError::BudgetUnreachable { .. }) => {
                FailureKind::BudgetUnreachable
            }
            ItemError::Composite(_) | ItemError::Search(_) => FailureKind::EncodeFailure,
        }
    }
}

/// What happened to one item.
#[derive(Debug)]
pub enum ItemOutcome {
    /// Encoded within budget (or without one).
    Fitted(EncodedJpeg),
    /// Over budget, kept at the smallest size found.
    BestEffort(EncodedJpeg),
    /// Dropped from the output.
    Failed(ItemError),
}

impl ItemOutcome {
    pub fn encoded(&self) -> Option<&EncodedJpeg> {
        match self {
            ItemOutcome::Fitted(encoded) | ItemOutcome::BestEffort(encoded) => Some(encoded),
            ItemOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ItemError> {
        match self {
            ItemOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConversionOutcome> for ItemOutcome {
    fn from(outcome: ConversionOutcome) -> Self {
        match outcome {
            ConversionOutcome::Fitted(encoded) => ItemOutcome::Fitted(encoded),
            ConversionOutcome::BestEffort(encoded) => ItemOutcome::BestEffort(encoded),
            ConversionOutcome::Failed(err) => ItemOutcome::Failed(err.into()),
        }
    }
}

/// Per-item result, in input order within a [`BatchReport`].
#[derive(Debug)]
pub struct ItemReport {
    /// Position of the item in the input collection.
    pub index: usize,
    pub input_name: String,
    pub output_name: String,
    pub footer: FooterStatus,
    /// Among the first [`PREVIEW_LIMIT`] items of the batch.
    pub preview: bool,
    pub outcome: ItemOutcome,
}

/// Batch-level notices, each emitted at most once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The footer was enabled but no asset was available.
    FooterAssetMissing,
}

/// Everything a batch produced.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub items: Vec<ItemReport>,
    pub notices: Vec<Notice>,
}

impl BatchReport {
    /// Successful items as `(output name, bytes)`, in input order.
    pub fn successes(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.items.iter().filter_map(|item| {
            item.outcome
                .encoded()
                .map(|encoded| (item.output_name.as_str(), encoded.bytes.as_slice()))
        })
    }

    pub fn fitted_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, ItemOutcome::Fitted(_)))
    }

    pub fn best_effort_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, ItemOutcome::BestEffort(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|outcome| matches!(outcome, ItemOutcome::Failed(_)))
    }

    fn count(&self, pred: impl Fn(&ItemOutcome) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.outcome)).count()
    }

    /// Hand every success to `sink` in input order.
    ///
    /// Colliding output names (`a.png` and `a.bmp` both become `a.jpg`) get a
    /// numeric suffix so no member replaces another. Returns the number of
    /// members written.
    pub fn write_to<S: ArchiveSink + ?Sized>(&self, sink: &mut S) -> io::Result<usize> {
        let mut names = UniqueNames::default();
        let mut written = 0;
        for (name, bytes) in self.successes() {
            sink.add(&names.claim(name), bytes)?;
            written += 1;
        }
        Ok(written)
    }
}

/// Replace the extension of `input` with `.jpg`.
///
/// Only the last path component is considered. Names without an extension
/// (or dotfiles like `.hidden`) get `.jpg` appended.
pub fn output_name(input: &str) -> String {
    let file_start = input.rfind(['/', '\\']).map_or(0, |i| i + 1);
    let (dir, file) = input.split_at(file_start);

    // Leading dots belong to the stem.
    let dots = file.len() - file.trim_start_matches('.').len();
    let stem = match file[dots..].rsplit_once('.') {
        Some((rest, _)) => &file[..dots + rest.len()],
        None => file,
    };
    format!("{dir}{stem}.{OUTPUT_EXTENSION}")
}

/// Convert one item: decode, optionally composite, encode under budget.
pub fn convert_one(
    index: usize,
    item: &InputItem,
    footer: Option<&FooterAsset>,
    options: &ConvertOptions,
) -> ItemReport {
    let footer = if options.footer_enabled { footer } else { None };
    let (footer_status, outcome) = match prepare(item, footer) {
        Ok((image, status)) => {
            let outcome = encode_with_budget(&image, options.budget_bytes, &options.policy);
            (status, ItemOutcome::from(outcome))
        }
        Err(err) => (FooterStatus::Skipped, ItemOutcome::Failed(err)),
    };

    let report = ItemReport {
        index,
        input_name: item.name.clone(),
        output_name: output_name(&item.name),
        footer: footer_status,
        preview: index < PREVIEW_LIMIT,
        outcome,
    };
    log_item(&report, options.budget_bytes);
    report
}

fn prepare(
    item: &InputItem,
    footer: Option<&FooterAsset>,
) -> Result<(DecodedImage, FooterStatus), ItemError> {
    if let Some(err) = &item.read_error {
        return Err(ItemError::Read(err.clone()));
    }
    let image = decode_named(&item.name, &item.bytes)?;
    Ok(apply_footer(image, footer)?)
}

/// Convert every item, isolating failures, and report in input order.
///
/// When the footer is enabled but `footer` is `None`, items pass through
/// uncomposited and a single [`Notice::FooterAssetMissing`] is recorded.
pub fn convert_batch(
    items: &[InputItem],
    footer: Option<&FooterAsset>,
    options: &ConvertOptions,
) -> BatchReport {
    let mut notices = Vec::new();
    if options.footer_enabled && footer.is_none() {
        warn!("footer enabled but no footer image is available; converting without it");
        notices.push(Notice::FooterAssetMissing);
    }

    let reports = run_items(items, footer, options);

    let report = BatchReport {
        items: reports,
        notices,
    };
    info!(
        total = items.len(),
        fitted = report.fitted_count(),
        best_effort = report.best_effort_count(),
        failed = report.failed_count(),
        "batch converted"
    );
    report
}

#[cfg(feature = "parallel")]
fn run_items(
    items: &[InputItem],
    footer: Option<&FooterAsset>,
    options: &ConvertOptions,
) -> Vec<ItemReport> {
    use rayon::prelude::*;

    if options.parallel {
        // Indexed collect preserves input order.
        items
            .par_iter()
            .enumerate()
            .map(|(index, item)| convert_one(index, item, footer, options))
            .collect()
    } else {
        run_sequential(items, footer, options)
    }
}

#[cfg(not(feature = "parallel"))]
fn run_items(
    items: &[InputItem],
    footer: Option<&FooterAsset>,
    options: &ConvertOptions,
) -> Vec<ItemReport> {
    run_sequential(items, footer, options)
}

fn run_sequential(
    items: &[InputItem],
    footer: Option<&FooterAsset>,
    options: &ConvertOptions,
) -> Vec<ItemReport> {
    items
        .iter()
        .enumerate()
        .map(|(index, item)| convert_one(index, item, footer, options))
        .collect()
}

fn log_item(report: &ItemReport, budget: Option<u64>) {
    match &report.outcome {
        ItemOutcome::Fitted(encoded) => info!(
            name = %report.input_name,
            output = %report.output_name,
            quality = encoded.attempt.quality,
            scale = encoded.attempt.scale,
            bytes = encoded.attempt.byte_len,
            "converted"
        ),
        ItemOutcome::BestEffort(encoded) => warn!(
            name = %report.input_name,
            bytes = encoded.attempt.byte_len,
            budget = budget.unwrap_or_default(),
            "could not fit budget; kept smallest encoding"
        ),
        ItemOutcome::Failed(err) => warn!(
            name = %report.input_name,
            kind = ?err.kind(),
            error = %err,
            "conversion failed"
        ),
    }
}
