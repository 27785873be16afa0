use scoring::{Axis, TimingOutcome};
use serde::{Deserialize, Serialize};

use crate::advisory::{AxisReport, FeatureReport};
use crate::{Feature, HistoricalEcho, ScoreBand, Suggestion};

/// Narrative lines per intent. Every bucket is always serialized, empty or not.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentSummaries {
    pub structure: Vec<String>,
    pub groove: Vec<String>,
    pub loudness: Vec<String>,
    pub mood: Vec<String>,
    pub historical: Vec<String>,
    pub strategy: Vec<String>,
}

pub(crate) struct SummaryInputs<'a> {
    pub axes: &'a [AxisReport],
    pub features: &'a [FeatureReport],
    pub timing: Option<&'a TimingOutcome>,
    pub echo: &'a HistoricalEcho,
    pub band: ScoreBand,
    pub norms_available: bool,
    pub warnings: &'a [String],
    pub suggestions: &'a [Suggestion],
}

fn axis_lines(axes: &[AxisReport], wanted: &[Axis]) -> Vec<String> {
    wanted
        .iter()
        .filter_map(|axis| axes.iter().find(|r| r.axis == *axis))
        .map(|r| {
            format!(
                "{}: level={}, market={}. {}",
                r.axis, r.level, r.market_position, r.comment
            )
        })
        .collect()
}

fn feature_position(features: &[FeatureReport], feature: Feature) -> Option<&FeatureReport> {
    features.iter().find(|r| r.feature == feature)
}

impl IntentSummaries {
    pub(crate) fn build(inputs: &SummaryInputs<'_>) -> Self {
        let mut structure = axis_lines(inputs.axes, &[Axis::TempoFit, Axis::RuntimeFit]);
        if let Some(runtime) = feature_position(inputs.features, Feature::DurationSec) {
            structure.push(format!("Runtime position: {}.", runtime.market_position));
        }

        let groove = axis_lines(inputs.axes, &[Axis::Energy, Axis::Danceability]);

        let mut loudness = axis_lines(inputs.axes, &[Axis::LoudnessFit]);
        if let Some(lufs) = feature_position(inputs.features, Feature::LoudnessLufs) {
            loudness.push(format!("Loudness position: {}.", lufs.market_position));
        }
        if let Some(lift) = inputs.timing.and_then(|t| t.chorus_lift_db) {
            loudness.push(format!("Chorus lift: {lift:+.1} dB over verse."));
        }

        let mood = axis_lines(inputs.axes, &[Axis::Valence]);

        let historical = vec![inputs.echo.comment.clone()];

        Self {
            structure,
            groove,
            loudness,
            mood,
            historical,
            strategy: strategy_lines(inputs),
        }
    }
}

fn strategy_lines(inputs: &SummaryInputs<'_>) -> Vec<String> {
    let mut lines = vec![inputs.band.narrative().to_string()];

    // max_by/min_by keep the last/first of equal elements; fold keeps the first
    let scored = inputs.axes.iter().filter_map(|r| r.z.map(|z| (r.axis, z)));
    let strongest = scored
        .clone()
        .fold(None, |best: Option<(Axis, f64)>, cur| match best {
            Some(b) if b.1 >= cur.1 => Some(b),
            _ => Some(cur),
        });
    let weakest = scored.fold(None, |worst: Option<(Axis, f64)>, cur| match worst {
        Some(w) if w.1 <= cur.1 => Some(w),
        _ => Some(cur),
    });
    if let (Some((best, best_z)), Some((worst, worst_z))) = (strongest, weakest) {
        lines.push(format!(
            "Strongest axis: {best} (z={best_z:+.2}). Weakest axis: {worst} (z={worst_z:+.2})."
        ));
    }

    if inputs.norms_available {
        let bits: Vec<String> = [
            ("tempo", Feature::TempoBpm),
            ("runtime", Feature::DurationSec),
            ("loudness", Feature::LoudnessLufs),
        ]
        .iter()
        .filter_map(|(label, feature)| {
            feature_position(inputs.features, *feature)
                .map(|r| format!("{label}={}", r.market_position))
        })
        .collect();
        if !bits.is_empty() {
            lines.push(format!("Market positions: {}.", bits.join(", ")));
        }
    }

    lines.extend(inputs.warnings.iter().map(|w| format!("Warning: {w}")));
    lines.extend(
        inputs
            .suggestions
            .iter()
            .take(2)
            .map(|s| format!("{}: {}", s.area, s.comment)),
    );
    lines
}
