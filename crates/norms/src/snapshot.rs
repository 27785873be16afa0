use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

use crate::{FeatureStats, MomentStats, NormsError};

/// `(region, tier, version)` identity of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotIdentity {
    pub region: String,
    pub tier: String,
    pub version: String,
}

/// Statistics for one lane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaneNorms {
    /// Per-feature stats keyed by feature name (`tempo_bpm`, `duration_sec`, …).
    #[serde(default)]
    pub features: BTreeMap<String, FeatureStats>,
    /// Per-axis stats keyed by axis name (`TempoFit`, …).
    #[serde(default)]
    pub axes: BTreeMap<String, FeatureStats>,
    #[serde(default)]
    pub composite: Option<MomentStats>,
    #[serde(default)]
    pub timing: Option<MomentStats>,
}

impl LaneNorms {
    pub fn feature(&self, name: &str) -> Option<&FeatureStats> {
        self.features.get(name)
    }

    pub fn axis(&self, name: &str) -> Option<&FeatureStats> {
        self.axes.get(name)
    }
}

/// Wire shape: identity fields optional so their absence can be reported
/// as a configuration error rather than a generic parse failure.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    tier: Option<String>,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    last_refreshed_at: Option<String>,
    #[serde(default)]
    lanes: BTreeMap<String, LaneNorms>,
}

/// Immutable cohort statistics for one `(region, tier, version)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CohortNormsSnapshot {
    identity: SnapshotIdentity,
    last_refreshed_at: Option<String>,
    lanes: BTreeMap<String, LaneNorms>,
}

impl CohortNormsSnapshot {
    /// Build a snapshot, rejecting empty identity fields.
    pub fn new(
        region: impl Into<String>,
        tier: impl Into<String>,
        version: impl Into<String>,
        last_refreshed_at: Option<String>,
        lanes: BTreeMap<String, LaneNorms>,
    ) -> Result<Self, NormsError> {
        let region = require("region", Some(region.into()))?;
        let tier = require("tier", Some(tier.into()))?;
        let version = require("version", Some(version.into()))?;
        Ok(Self {
            identity: SnapshotIdentity {
                region,
                tier,
                version,
            },
            last_refreshed_at,
            lanes,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self, NormsError> {
        let raw: RawSnapshot = serde_json::from_str(json)?;
        let region = require("region", raw.region)?;
        let tier = require("tier", raw.tier)?;
        let version = require("version", raw.version)?;
        Ok(Self {
            identity: SnapshotIdentity {
                region,
                tier,
                version,
            },
            last_refreshed_at: raw.last_refreshed_at,
            lanes: raw.lanes,
        })
    }

    pub fn identity(&self) -> &SnapshotIdentity {
        &self.identity
    }

    pub fn last_refreshed_at(&self) -> Option<&str> {
        self.last_refreshed_at.as_deref()
    }

    pub fn lane_keys(&self) -> impl Iterator<Item = &str> {
        self.lanes.keys().map(String::as_str)
    }

    pub fn lane(&self, lane_key: &str) -> Option<&LaneNorms> {
        self.lanes.get(lane_key)
    }

    /// Exact lane lookup. A miss is [`NormsError::MissingNorms`].
    pub fn resolve(&self, lane_key: &str) -> Result<ResolvedNorms, NormsError> {
        match self.lanes.get(lane_key) {
            Some(stats) => Ok(ResolvedNorms {
                identity: self.identity.clone(),
                last_refreshed_at: self.last_refreshed_at.clone(),
                lane: lane_key.to_string(),
                stats: stats.clone(),
            }),
            None => {
                debug!(
                    lane = lane_key,
                    region = %self.identity.region,
                    version = %self.identity.version,
                    "lane_not_in_snapshot"
                );
                Err(NormsError::MissingNorms(format!(
                    "lane '{lane_key}' not present in {}/{}/{}",
                    self.identity.region, self.identity.tier, self.identity.version
                )))
            }
        }
    }
}

fn require(field: &str, value: Option<String>) -> Result<String, NormsError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(NormsError::Configuration(format!(
            "snapshot missing required field: {field}"
        ))),
    }
}

/// A snapshot narrowed to one lane, ready for overlay and synthesis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNorms {
    pub identity: SnapshotIdentity,
    pub last_refreshed_at: Option<String>,
    pub lane: String,
    pub stats: LaneNorms,
}
