use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::LaneNorms;

/// z-scores for one request against one lane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverlayResult {
    /// Per-axis z, `None` where value or stats are missing.
    pub axes: BTreeMap<String, Option<f64>>,
    pub composite: Option<f64>,
    pub timing: Option<f64>,
}

/// Compute z for each `(axis_name, raw_value)` pair and for the composite
/// and timing scalars.
pub fn overlay<'a, I>(
    axes: I,
    composite: Option<f64>,
    timing: Option<f64>,
    norms: &LaneNorms,
) -> OverlayResult
where
    I: IntoIterator<Item = (&'a str, Option<f64>)>,
{
    let axes = axes
        .into_iter()
        .map(|(name, value)| {
            let z = norms.axis(name).and_then(|stats| stats.zscore(value));
            (name.to_string(), z)
        })
        .collect();

    OverlayResult {
        axes,
        composite: norms.composite.and_then(|stats| stats.zscore(composite)),
        timing: norms.timing.and_then(|stats| stats.zscore(timing)),
    }
}
