//! # Scoring Policy
//!
//! The policy is the single configuration object threaded through every
//! advisory stage: composite scoring, timing gating, axis-level banding and
//! cache identity all read from it. It is built once per run, validated, and
//! then only ever borrowed.
//!
//! ```
//! use policy::ScoringPolicy;
//!
//! let policy = ScoringPolicy::default()
//!     .with_score_cap(0.58)
//!     .with_timing_confidence_gate(0.6);
//! policy.validate().unwrap();
//! assert_eq!(policy.scoring_fingerprint().len(), 64);
//! ```
//!
//! Non-numeric commentary (structural priors, caps notes) rides along with the
//! policy for presentation, but it is excluded from [`ScoringPolicy::scoring_fingerprint`]
//! and from every numeric computation.

mod fingerprint;
mod policy;

pub use fingerprint::{FINGERPRINT_VERSION, fingerprint_policy};
pub use policy::{PolicyCommentary, RawAxisThresholds, ScoringPolicy};

use thiserror::Error;

/// Errors raised while validating a [`ScoringPolicy`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid policy: {0}")]
    InvalidConfig(String),
}
