//! Parameters of the size-constrained search.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decode::FilterType;

/// Scale factors are snapped to this many decimal places so the tested
/// sequence is exactly `1.0, 0.9, 0.8, ...` rather than accumulated float error.
const SCALE_PRECISION: f64 = 1e6;

/// What to do with an image that is still over budget after both floors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OverBudget {
    /// Drop the image and report it as over budget.
    #[default]
    Reject,
    /// Keep the smallest encoding produced by the search.
    BestEffort,
}

/// Errors for a policy whose parameters cannot drive a bounded search.
#[derive(Debug, Error, PartialEq)]
pub enum PolicyError {
    #[error("Initial quality must be within 1-100, got {0}")]
    InitialQuality(u8),

    #[error("Quality floor ({floor}) must be within 1 and the initial quality ({initial})")]
    QualityFloor { floor: u8, initial: u8 },

    #[error("Quality step must be at least 1")]
    QualityStep,

    #[error("Initial scale must be within (0, 1], got {0}")]
    InitialScale(f64),

    #[error("Scale floor ({floor}) must be within (0, initial scale ({initial})]")]
    ScaleFloor { floor: f64, initial: f64 },

    #[error("Scale step must be within (0, 1], got {0}")]
    ScaleStep(f64),
}

/// Fixed parameters governing the quality-then-scale search.
///
/// The defaults reproduce the reference converter: start at quality 95,
/// descend in steps of 5 to 60, then shrink in steps of 0.1 down to 0.3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchPolicy {
    /// Quality of the baseline attempt.
    pub initial_quality: u8,
    /// Amount quality drops per descent step.
    pub quality_step: u8,
    /// Lowest quality the search will try.
    pub quality_floor: u8,
    /// Scale of the baseline attempt, relative to the original image.
    pub initial_scale: f64,
    /// Amount the scale drops per descent step.
    pub scale_step: f64,
    /// Lowest scale the search will try.
    pub scale_floor: f64,
    /// Resampling filter for the scale-descent phase.
    pub resize_filter: FilterType,
    /// Outcome for images that never fit.
    pub over_budget: OverBudget,
}

impl Default for SearchPolicy {
    fn default() -> Self {
        Self {
            initial_quality: 95,
            quality_step: 5,
            quality_floor: 60,
            initial_scale: 1.0,
            scale_step: 0.1,
            scale_floor: 0.3,
            resize_filter: FilterType::Lanczos3,
            over_budget: OverBudget::Reject,
        }
    }
}

impl SearchPolicy {
    /// Default parameters with best-effort handling of unreachable budgets.
    pub fn best_effort() -> Self {
        Self {
            over_budget: OverBudget::BestEffort,
            ..Self::default()
        }
    }

    /// Check that the parameters describe a terminating, in-range search.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !(1..=100).contains(&self.initial_quality) {
            return Err(PolicyError::InitialQuality(self.initial_quality));
        }
        if self.quality_floor == 0 || self.quality_floor > self.initial_quality {
            return Err(PolicyError::QualityFloor {
                floor: self.quality_floor,
                initial: self.initial_quality,
            });
        }
        if self.quality_step == 0 {
            return Err(PolicyError::QualityStep);
        }
        if !(self.initial_scale > 0.0 && self.initial_scale <= 1.0) {
            return Err(PolicyError::InitialScale(self.initial_scale));
        }
        if !(self.scale_step > 0.0 && self.scale_step <= 1.0) {
            return Err(PolicyError::ScaleStep(self.scale_step));
        }
        if !(self.scale_floor > 0.0 && self.scale_floor <= self.initial_scale) {
            return Err(PolicyError::ScaleFloor {
                floor: self.scale_floor,
                initial: self.initial_scale,
            });
        }
        Ok(())
    }

    /// The quality after one descent step, or `None` once the floor is reached.
    pub fn next_quality(&self, quality: u8) -> Option<u8> {
        if self.quality_step == 0 {
            return None;
        }
        quality
            .checked_sub(self.quality_step)
            .filter(|next| *next >= self.quality_floor)
    }

    /// The scale tested at `step` of the scale phase, or `None` past the floor.
    ///
    /// Step 0 is the initial scale. Each value is computed from the initial
    /// scale directly, never from the previous step.
    pub fn scale_at(&self, step: u32) -> Option<f64> {
        if step == 0 {
            return Some(self.initial_scale);
        }
        let raw = self.initial_scale - f64::from(step) * self.scale_step;
        let scale = (raw * SCALE_PRECISION).round() / SCALE_PRECISION;
        let floor = (self.scale_floor * SCALE_PRECISION).round() / SCALE_PRECISION;
        (scale > 0.0 && scale >= floor).then_some(scale)
    }

    /// Number of descent steps in the quality phase.
    pub fn max_quality_steps(&self) -> u32 {
        let mut quality = self.initial_quality;
        let mut steps = 0;
        while let Some(next) = self.next_quality(quality) {
            quality = next;
            steps += 1;
        }
        steps
    }

    /// Number of descent steps in the scale phase.
    pub fn max_scale_steps(&self) -> u32 {
        let mut steps = 0;
        while self.scale_at(steps + 1).is_some() {
            steps += 1;
        }
        steps
    }

    /// Upper bound on encode calls for one image, baseline included.
    pub fn max_attempts(&self) -> u32 {
        1 + self.max_quality_steps() + self.max_scale_steps()
    }
}
