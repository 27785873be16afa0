//! # Composite scoring and timing gate
//!
//! This crate turns already-extracted audio measurements into the two numeric
//! products every advisory starts from:
//!
//! - [`composite_score`]: the capped mean of a six-axis [`AxisVector`] (HCI).
//! - [`gate_timing`]: time-to-chorus (TTC) confidence gating plus an optional
//!   chorus-vs-verse loudness lift.
//!
//! Both are pure functions of their inputs and a borrowed
//! [`policy::ScoringPolicy`]. Nothing here reads global state.
//!
//! ```
//! use policy::ScoringPolicy;
//! use scoring::{AxisVector, composite_score};
//!
//! let policy = ScoringPolicy::default().with_score_cap(0.58);
//! let axes = AxisVector::from_slice(&[0.62; 6]).unwrap();
//! assert!((composite_score(&axes, &policy) - 0.58).abs() < 1e-9);
//! ```

mod axes;
mod hci;
mod timing;

pub use axes::{AXIS_COUNT, Axis, AxisVector};
pub use hci::{CompositeScore, composite_score, score_axes};
pub use timing::{
    AUDIO_TIMING_CONFIDENCE, DroppedFeature, GateDecision, LYRIC_TIMING_CONFIDENCE,
    ResolvedConfidence, SegmentationResult, Span, TimingEvidence, TimingOutcome, TimingSource,
    gate_timing, resolve_timing_confidence,
};

use thiserror::Error;

/// Errors produced at the scoring boundary.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl ScoringError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        ScoringError::InvalidInput(msg.into())
    }
}
