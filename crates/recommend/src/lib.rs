//! # Recommendation synthesis
//!
//! Turns a scored request into the reader-facing [`Advisory`]:
//!
//! ```text
//! CompositeScore ──► ScoreBand ─────────────┐
//! AxisVector + LaneNorms ──► AxisReport[6] ─┼─► suggestions ─► IntentSummaries ─► Advisory
//! TrackFeatures + LaneNorms ► FeatureReport ┘
//! Neighbours ──► HistoricalEcho ────────────────────────────────┘
//! ```
//!
//! The [`Goldilocks`] and [`StructuralGates`] blocks ride alongside and are
//! built from inputs the score never reads.
//!
//! Synthesis never fails. Missing norms, a missing score or empty features
//! each degrade to explicit `unknown` / `null` markers and a warning line,
//! never to omitted fields.
//!
//! ```
//! use policy::ScoringPolicy;
//! use recommend::{
//!     FramingObservation, NormsAvailability, ScoreBand, SynthesisInput, TrackFeatures, synthesize,
//! };
//! use scoring::{AxisVector, CompositeScore};
//!
//! let policy = ScoringPolicy::default();
//! let axes = AxisVector::from_slice(&[0.62; 6]).unwrap();
//! let advisory = synthesize(
//!     &SynthesisInput {
//!         axes: &axes,
//!         score: Some(CompositeScore::compute(&axes, &policy)),
//!         features: &TrackFeatures::default(),
//!         timing: None,
//!         neighbors: &[],
//!         norms: NormsAvailability::Unavailable { reason: "no snapshot loaded" },
//!         framing: FramingObservation::default(),
//!     },
//!     &policy,
//! );
//! assert_eq!(advisory.score_band, ScoreBand::Developing);
//! ```

mod advisory;
mod band;
mod echo;
mod features;
mod framing;
mod levels;
mod suggestions;
mod summaries;

pub use advisory::{
    Advisory, AxisReport, Diagnostics, FeatureReport, MarketComparison, NormsAvailability,
    NormsUsed, Provenance, SynthesisInput, synthesize,
};
pub use band::ScoreBand;
pub use echo::{HistoricalEcho, similarity_label};
pub use features::{Feature, TrackFeatures};
pub use framing::{
    DroppedFeature, FramingObservation, GOLDILOCKS_TARGET, Goldilocks, StructuralGates,
    StructuralNotes,
};
pub use levels::{AxisLevel, axis_comment};
pub use suggestions::{Suggestion, SuggestionKind};
pub use summaries::IntentSummaries;

/// Version stamp of the wording and rules in this crate.
pub const REC_VERSION: &str = "2025-12-rc1";

pub const DISCLAIMER: &str = "Scores and these recommendations describe historical echo and norm alignment; they are not hit predictions.";
