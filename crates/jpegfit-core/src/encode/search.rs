//! Size-constrained encoding: quality descent, then scale descent.
//!
//! The search is a bounded greedy walk, not an optimizer. Quality is lowered
//! first because it keeps spatial detail; only when the quality floor is
//! reached does the image shrink, always resampled from the original pixels
//! at the cumulative scale. The number of encode calls is bounded by
//! [`SearchPolicy::max_attempts`] regardless of image size.

use thiserror::Error;
use tracing::debug;

use super::jpeg::{EncodeError, ImageJpegEncoder, JpegEncoder};
use super::policy::{OverBudget, PolicyError, SearchPolicy};
use crate::decode::{scale_by, DecodeError, DecodedImage};

/// Parameters and result size of one encode call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodingAttempt {
    /// Zero-based position in the attempt sequence (0 is the baseline).
    pub index: u32,
    /// JPEG quality used.
    pub quality: u8,
    /// Scale relative to the original image.
    pub scale: f64,
    /// Width of the encoded image.
    pub width: u32,
    /// Height of the encoded image.
    pub height: u32,
    /// Encoded size in bytes.
    pub byte_len: usize,
}

impl EncodingAttempt {
    /// Whether this attempt fits in `budget` (inclusive).
    pub fn fits(&self, budget: Option<u64>) -> bool {
        budget.map_or(true, |limit| self.byte_len as u64 <= limit)
    }
}

/// JPEG bytes together with the attempt that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedJpeg {
    pub bytes: Vec<u8>,
    pub attempt: EncodingAttempt,
}

/// Why a search produced no usable encoding.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The policy parameters cannot drive a bounded search.
    #[error("Invalid search policy: {0}")]
    Policy(#[from] PolicyError),

    /// The encode primitive rejected the pixel buffer.
    #[error("Encoding failed at quality {quality}, scale {scale:.1}: {source}")]
    Encode {
        quality: u8,
        scale: f64,
        #[source]
        source: EncodeError,
    },

    /// Downscaling for the scale phase failed.
    #[error("Resizing to scale {scale:.1} failed: {source}")]
    Resize {
        scale: f64,
        #[source]
        source: DecodeError,
    },

    /// Both floors were reached without fitting, and the policy rejects.
    #[error(
        "Could not fit in {budget} bytes: smallest attempt was {} bytes at quality {}, scale {:.1}",
        .smallest.byte_len, .smallest.quality, .smallest.scale
    )]
    BudgetUnreachable {
        budget: u64,
        smallest: EncodingAttempt,
    },
}

/// Result of a search for one image.
#[derive(Debug)]
pub enum ConversionOutcome {
    /// The encoding fits the budget (or there was no budget).
    Fitted(EncodedJpeg),
    /// The budget could not be met; the smallest encoding is kept anyway.
    BestEffort(EncodedJpeg),
    /// No usable encoding.
    Failed(SearchError),
}

impl ConversionOutcome {
    /// The encoding, if the search produced one to keep.
    pub fn encoded(&self) -> Option<&EncodedJpeg> {
        match self {
            ConversionOutcome::Fitted(encoded) | ConversionOutcome::BestEffort(encoded) => {
                Some(encoded)
            }
            ConversionOutcome::Failed(_) => None,
        }
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self, ConversionOutcome::Fitted(_))
    }
}

/// Encode `image` under an optional byte budget with the production encoder.
///
/// With no budget this is a single encode at `policy.initial_quality`.
pub fn encode_with_budget(
    image: &DecodedImage,
    budget: Option<u64>,
    policy: &SearchPolicy,
) -> ConversionOutcome {
    encode_with_budget_using(&ImageJpegEncoder, image, budget, policy)
}

/// Encode `image` under an optional byte budget with a caller-chosen encoder.
pub fn encode_with_budget_using<E>(
    encoder: &E,
    image: &DecodedImage,
    budget: Option<u64>,
    policy: &SearchPolicy,
) -> ConversionOutcome
where
    E: JpegEncoder + ?Sized,
{
    match run_search(encoder, image, budget, policy) {
        Ok(outcome) => outcome,
        Err(err) => ConversionOutcome::Failed(err),
    }
}

fn run_search<E>(
    encoder: &E,
    image: &DecodedImage,
    budget: Option<u64>,
    policy: &SearchPolicy,
) -> Result<ConversionOutcome, SearchError>
where
    E: JpegEncoder + ?Sized,
{
    policy.validate()?;

    let mut search = Search {
        encoder,
        image,
        policy,
        attempts: 0,
    };

    let scale = policy.initial_scale;
    let mut quality = policy.initial_quality;
    let mut smallest = search.attempt(quality, scale)?;
    let mut current = smallest.attempt;

    let Some(limit) = budget else {
        return Ok(ConversionOutcome::Fitted(smallest));
    };

    // Quality descent at the initial scale.
    while !current.fits(budget) {
        let Some(next) = policy.next_quality(quality) else {
            break;
        };
        quality = next;
        current = keep_smaller(&mut smallest, search.attempt(quality, scale)?);
    }

    // Scale descent with quality held where the first phase left it.
    let mut step = 0;
    while !current.fits(budget) {
        let Some(scale) = policy.scale_at(step + 1) else {
            break;
        };
        step += 1;
        current = keep_smaller(&mut smallest, search.attempt(quality, scale)?);
    }

    // Every earlier attempt was over budget, so a fitting attempt is also the smallest.
    if current.fits(budget) {
        return Ok(ConversionOutcome::Fitted(smallest));
    }

    match policy.over_budget {
        OverBudget::BestEffort => Ok(ConversionOutcome::BestEffort(smallest)),
        OverBudget::Reject => Err(SearchError::BudgetUnreachable {
            budget: limit,
            smallest: smallest.attempt,
        }),
    }
}

/// Keep `candidate` if strictly smaller; ties keep the earlier, higher-fidelity attempt.
fn keep_smaller(smallest: &mut EncodedJpeg, candidate: EncodedJpeg) -> EncodingAttempt {
    let attempt = candidate.attempt;
    if attempt.byte_len < smallest.attempt.byte_len {
        *smallest = candidate;
    }
    attempt
}

struct Search<'a, E: ?Sized> {
    encoder: &'a E,
    image: &'a DecodedImage,
    policy: &'a SearchPolicy,
    attempts: u32,
}

impl<E: JpegEncoder + ?Sized> Search<'_, E> {
    fn attempt(&mut self, quality: u8, scale: f64) -> Result<EncodedJpeg, SearchError> {
        let encode = |image: &DecodedImage| {
            self.encoder
                .encode(image, quality)
                .map(|bytes| (bytes, image.width, image.height))
                .map_err(|source| SearchError::Encode {
                    quality,
                    scale,
                    source,
                })
        };

        let (bytes, width, height) = if scale >= 1.0 {
            encode(self.image)?
        } else {
            let scaled = scale_by(self.image, scale, self.policy.resize_filter)
                .map_err(|source| SearchError::Resize { scale, source })?;
            encode(&scaled)?
        };

        let attempt = EncodingAttempt {
            index: self.attempts,
            quality,
            scale,
            width,
            height,
            byte_len: bytes.len(),
        };
        self.attempts += 1;

        debug!(
            index = attempt.index,
            quality,
            scale,
            width,
            height,
            bytes = attempt.byte_len,
            "encode attempt"
        );

        Ok(EncodedJpeg { bytes, attempt })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::FilterType;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Deterministic encoder whose output size is `pixels * quality / divisor`.
    struct SizeModelEncoder {
        divisor: u64,
        calls: AtomicU32,
        log: Mutex<Vec<(u8, u32, u32)>>,
    }

    impl SizeModelEncoder {
        fn new(divisor: u64) -> Self {
            Self {
                divisor,
                calls: AtomicU32::new(0),
                log: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }

        fn log(&self) -> Vec<(u8, u32, u32)> {
            self.log.lock().unwrap().clone()
        }
    }

    impl JpegEncoder for SizeModelEncoder {
        fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log
                .lock()
                .unwrap()
                .push((quality, image.width, image.height));
            let len = image.pixel_count() * u64::from(quality) / self.divisor;
            Ok(vec![quality; len.max(1) as usize])
        }
    }

    /// Encoder that fails whenever the image is smaller than the original.
    struct FailOnResize {
        original_width: u32,
    }

    impl JpegEncoder for FailOnResize {
        fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
            if image.width < self.original_width {
                return Err(EncodeError::EncodingFailed("pathological pixels".to_string()));
            }
            Ok(vec![0; 10_000 + usize::from(quality)])
        }
    }

    /// Encoder whose sizes do not decrease with quality.
    struct NonMonotonic;

    impl JpegEncoder for NonMonotonic {
        fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
            let base = image.pixel_count() as usize;
            let wobble = if quality % 10 == 0 { 50 } else { 0 };
            Ok(vec![0; base + wobble])
        }
    }

    fn image(width: u32, height: u32) -> DecodedImage {
        DecodedImage::filled(width, height, [90, 120, 150])
    }

    #[test]
    fn test_no_budget_is_single_attempt_at_initial_quality() {
        let encoder = SizeModelEncoder::new(1);
        let outcome =
            encode_with_budget_using(&encoder, &image(100, 100), None, &SearchPolicy::default());

        let ConversionOutcome::Fitted(encoded) = outcome else {
            panic!("expected Fitted");
        };
        assert_eq!(encoder.calls(), 1);
        assert_eq!(encoded.attempt.quality, 95);
        assert_eq!(encoded.attempt.scale, 1.0);
        assert_eq!(encoded.attempt.index, 0);
        assert_eq!((encoded.attempt.width, encoded.attempt.height), (100, 100));
    }

    #[test]
    fn test_baseline_fits_exactly_at_budget() {
        let encoder = SizeModelEncoder::new(1);
        // 10x10 at q95 -> 9500 bytes
        let outcome = encode_with_budget_using(
            &encoder,
            &image(10, 10),
            Some(9500),
            &SearchPolicy::default(),
        );

        assert!(outcome.is_fitted());
        assert_eq!(encoder.calls(), 1);
    }

    #[test]
    fn test_quality_descent_fits_before_scaling() {
        let encoder = SizeModelEncoder::new(1);
        // 10x10 at q80 -> 8000 bytes
        let outcome = encode_with_budget_using(
            &encoder,
            &image(10, 10),
            Some(8000),
            &SearchPolicy::default(),
        );

        let ConversionOutcome::Fitted(encoded) = outcome else {
            panic!("expected Fitted");
        };
        assert_eq!(encoded.attempt.quality, 80);
        assert_eq!(encoded.attempt.scale, 1.0);
        assert_eq!(encoded.bytes.len(), 8000);
        let qualities: Vec<u8> = encoder.log().iter().map(|(q, _, _)| *q).collect();
        assert_eq!(qualities, vec![95, 90, 85, 80]);
    }

    #[test]
    fn test_scale_descent_holds_floor_quality() {
        let encoder = SizeModelEncoder::new(1);
        // 100x100 at q60 = 600_000; at scale 0.7 -> 70x70*60 = 294_000
        let outcome = encode_with_budget_using(
            &encoder,
            &image(100, 100),
            Some(300_000),
            &SearchPolicy::default(),
        );

        let ConversionOutcome::Fitted(encoded) = outcome else {
            panic!("expected Fitted");
        };
        assert_eq!(encoded.attempt.quality, 60);
        assert_eq!(encoded.attempt.scale, 0.7);
        assert_eq!((encoded.attempt.width, encoded.attempt.height), (70, 70));

        let log = encoder.log();
        // Quality only decreases, then holds; scale phase resizes from the original.
        let scale_phase: Vec<_> = log.iter().skip(8).collect();
        assert_eq!(
            scale_phase,
            vec![&(60, 90, 90), &(60, 80, 80), &(60, 70, 70)]
        );
        assert!(log.windows(2).all(|w| w[1].0 <= w[0].0));
        assert!(log.windows(2).all(|w| w[1].1 <= w[0].1));
    }

    #[test]
    fn test_reject_policy_reports_budget_unreachable() {
        let encoder = SizeModelEncoder::new(1);
        let outcome = encode_with_budget_using(
            &encoder,
            &image(100, 100),
            Some(10),
            &SearchPolicy::default(),
        );

        let ConversionOutcome::Failed(SearchError::BudgetUnreachable { budget, smallest }) =
            outcome
        else {
            panic!("expected BudgetUnreachable");
        };
        assert_eq!(budget, 10);
        assert_eq!(smallest.quality, 60);
        assert_eq!(smallest.scale, 0.3);
        assert_eq!(smallest.byte_len, 30 * 30 * 60);
        assert_eq!(encoder.calls(), 15);
    }

    #[test]
    fn test_best_effort_policy_keeps_smallest() {
        let encoder = SizeModelEncoder::new(1);
        let outcome = encode_with_budget_using(
            &encoder,
            &image(100, 100),
            Some(10),
            &SearchPolicy::best_effort(),
        );

        let ConversionOutcome::BestEffort(encoded) = outcome else {
            panic!("expected BestEffort");
        };
        assert_eq!(encoded.attempt.index, 14);
        assert_eq!(encoded.bytes.len(), 30 * 30 * 60);
        assert_eq!(encoder.calls(), SearchPolicy::default().max_attempts());
    }

    #[test]
    fn test_scale_floor_point_four_stops_earlier() {
        let encoder = SizeModelEncoder::new(1);
        let policy = SearchPolicy {
            scale_floor: 0.4,
            ..SearchPolicy::best_effort()
        };
        let outcome = encode_with_budget_using(&encoder, &image(100, 100), Some(10), &policy);

        let encoded = outcome.encoded().unwrap();
        assert_eq!(encoded.attempt.scale, 0.4);
        assert_eq!(encoder.calls(), 14);
    }

    #[test]
    fn test_best_effort_picks_smallest_when_sizes_wobble() {
        let policy = SearchPolicy {
            scale_floor: 1.0,
            ..SearchPolicy::best_effort()
        };
        let outcome = encode_with_budget_using(&NonMonotonic, &image(10, 10), Some(1), &policy);

        let ConversionOutcome::BestEffort(encoded) = outcome else {
            panic!("expected BestEffort");
        };
        // q95 is the first attempt without the wobble and ties keep the earliest.
        assert_eq!(encoded.attempt.quality, 95);
        assert_eq!(encoded.bytes.len(), 100);
    }

    #[test]
    fn test_encode_failure_is_reported_not_panicked() {
        let encoder = FailOnResize {
            original_width: 50,
        };
        let outcome = encode_with_budget_using(
            &encoder,
            &image(50, 50),
            Some(100),
            &SearchPolicy::default(),
        );

        assert!(matches!(
            outcome,
            ConversionOutcome::Failed(SearchError::Encode { quality: 60, .. })
        ));
    }

    #[test]
    fn test_invalid_policy_fails_without_encoding() {
        let encoder = SizeModelEncoder::new(1);
        let policy = SearchPolicy {
            quality_step: 0,
            ..SearchPolicy::default()
        };
        let outcome = encode_with_budget_using(&encoder, &image(10, 10), Some(1), &policy);

        assert!(matches!(
            outcome,
            ConversionOutcome::Failed(SearchError::Policy(PolicyError::QualityStep))
        ));
        assert_eq!(encoder.calls(), 0);
    }

    #[test]
    fn test_large_image_scenario() {
        // 4000x3000 at q95 -> 6_000_000 bytes with divisor 190
        let encoder = SizeModelEncoder::new(190);
        let big = image(4000, 3000);
        let budget = 2 * 1024 * 1024;
        let policy = SearchPolicy {
            resize_filter: FilterType::Nearest,
            ..SearchPolicy::best_effort()
        };

        let outcome = encode_with_budget_using(&encoder, &big, Some(budget), &policy);

        let encoded = outcome.encoded().unwrap();
        let log = encoder.log();
        assert_eq!(log[0], (95, 4000, 3000));
        // All seven quality steps run before any resize.
        assert!(log[..8].iter().all(|(_, w, _)| *w == 4000));
        assert_eq!(log[7].0, 60);
        // q60 at 0.8 -> 3200x2400x60/190 = 2_425_263; at 0.7 -> 1_856_842
        assert_eq!(encoded.attempt.scale, 0.7);
        assert!(encoded.attempt.fits(Some(budget)));
        assert!(outcome.is_fitted());
    }

    #[test]
    fn test_real_encoder_is_idempotent() {
        let mut pixels = Vec::new();
        for i in 0..(64 * 64) {
            pixels.extend_from_slice(&[(i % 251) as u8, (i * 7 % 253) as u8, (i * 13 % 255) as u8]);
        }
        let img = DecodedImage::new(64, 64, pixels);
        let policy = SearchPolicy::best_effort();

        let first = encode_with_budget(&img, Some(2_000), &policy);
        let second = encode_with_budget(&img, Some(2_000), &policy);

        assert_eq!(first.encoded().unwrap(), second.encoded().unwrap());
    }

    #[test]
    fn test_budget_unreachable_message() {
        let err = SearchError::BudgetUnreachable {
            budget: 2048,
            smallest: EncodingAttempt {
                index: 14,
                quality: 60,
                scale: 0.3,
                width: 30,
                height: 30,
                byte_len: 4096,
            },
        };
        assert_eq!(
            err.to_string(),
            "Could not fit in 2048 bytes: smallest attempt was 4096 bytes at quality 60, scale 0.3"
        );
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    struct Proportional;

    impl JpegEncoder for Proportional {
        fn encode(&self, image: &DecodedImage, quality: u8) -> Result<Vec<u8>, EncodeError> {
            Ok(vec![0; (image.pixel_count() * u64::from(quality) / 4).max(1) as usize])
        }
    }

    proptest! {
        /// Property: attempts never exceed the policy bound and outcomes respect the budget.
        #[test]
        fn prop_search_is_bounded_and_honest(
            width in 1u32..=64,
            height in 1u32..=64,
            budget in 1u64..=200_000,
            best_effort in any::<bool>(),
        ) {
            let policy = if best_effort { SearchPolicy::best_effort() } else { SearchPolicy::default() };
            let img = DecodedImage::filled(width, height, [1, 2, 3]);

            let outcome = encode_with_budget_using(&Proportional, &img, Some(budget), &policy);

            match outcome {
                ConversionOutcome::Fitted(encoded) => {
                    prop_assert!(encoded.bytes.len() as u64 <= budget);
                    prop_assert!(encoded.attempt.index < policy.max_attempts());
                }
                ConversionOutcome::BestEffort(encoded) => {
                    prop_assert!(best_effort);
                    prop_assert!(encoded.bytes.len() as u64 > budget);
                    prop_assert_eq!(encoded.attempt.quality, policy.quality_floor);
                }
                ConversionOutcome::Failed(SearchError::BudgetUnreachable { smallest, .. }) => {
                    prop_assert!(!best_effort);
                    prop_assert!(smallest.byte_len as u64 > budget);
                }
                ConversionOutcome::Failed(other) => {
                    prop_assert!(false, "unexpected failure: {}", other);
                }
            }
        }
    }
}
