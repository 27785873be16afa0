//! # Market norms
//!
//! Cohort statistics and the lane that selects them.
//!
//! - [`lane`]: maps chart rank and release year to a `(tier, era_bucket)` lane.
//! - [`CohortNormsSnapshot`]: an immutable per-version statistics document,
//!   holding one [`LaneNorms`] per lane key.
//! - [`zscore`] and [`PercentileBin`]: the two comparison primitives.
//! - [`overlay`]: z-scores for every axis plus the composite and timing scalars.
//! - [`SnapshotLoader`]: resolves `(region, tier, version)` (including
//!   `"latest"`) to a snapshot file and memoises it.
//!
//! Lane lookup is exact. A lane that is absent from a snapshot is reported as
//! [`NormsError::MissingNorms`]; nothing here falls back to a nearby lane.

pub mod lane;
mod loader;
mod overlay;
mod snapshot;
mod stats;

pub use lane::{
    EraRange, Lane, LaneClassifier, SourceKind, TierThreshold, assign_lane, era_bucket, lane_key,
    tier_from_rank,
};
pub use loader::{LATEST_VERSION, SnapshotLoader};
pub use overlay::{OverlayResult, overlay};
pub use snapshot::{
    CohortNormsSnapshot, LaneNorms, ResolvedNorms, SnapshotIdentity,
};
pub use stats::{FeatureStats, MomentStats, PercentileBin, zscore};

use thiserror::Error;

/// Errors raised while loading or querying norms.
#[derive(Debug, Error)]
pub enum NormsError {
    /// Snapshot is missing required identity fields or is otherwise unusable.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The requested lane or version is not available.
    #[error("missing norms: {0}")]
    MissingNorms(String),
    #[error("failed to read snapshot: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse snapshot: {0}")]
    Parse(#[from] serde_json::Error),
}
