use policy::ScoringPolicy;
use serde::{Deserialize, Serialize};

use crate::{AxisVector, ScoringError};

/// Breakdown of one composite computation, used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeScore {
    /// Arithmetic mean of the six axes before capping.
    pub raw_mean: f64,
    /// `min(raw_mean, score_cap)`.
    pub score: f64,
    /// Whether the cap was binding.
    pub capped: bool,
}

impl CompositeScore {
    pub fn compute(axes: &AxisVector, policy: &ScoringPolicy) -> Self {
        let raw_mean = axes.mean();
        let score = raw_mean.min(policy.score_cap);
        Self {
            raw_mean,
            score,
            capped: raw_mean > policy.score_cap,
        }
    }
}

/// Capped composite score: `min(mean(axes), policy.score_cap)`.
///
/// Only `score_cap` is read from the policy.
pub fn composite_score(axes: &AxisVector, policy: &ScoringPolicy) -> f64 {
    CompositeScore::compute(axes, policy).score
}

/// Boundary variant of [`composite_score`] over raw values.
pub fn score_axes(values: &[f64], policy: &ScoringPolicy) -> Result<f64, ScoringError> {
    let axes = AxisVector::from_slice(values)?;
    Ok(composite_score(&axes, policy))
}
