//! Ordered improvement suggestions.
//!
//! Scan order is fixed: tempo, runtime, loudness, low axes (in axis order),
//! groove interaction, mood, strategy. Identical reports always yield an
//! identical list.

use norms::PercentileBin;
use scoring::Axis;
use serde::{Deserialize, Serialize};

use crate::advisory::{AxisReport, FeatureReport};
use crate::levels::{AxisLevel, axis_comment};
use crate::{Feature, ScoreBand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    MarketAlignment,
    StructureTrim,
    StructureExtend,
    MixMaster,
    AxisLift,
    EnergyVsDanceability,
    MoodAdjust,
    MoodBalance,
    LaneChoice,
    FineTune,
}

/// One actionable line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub area: String,
    pub kind: SuggestionKind,
    pub comment: String,
}

impl Suggestion {
    fn new(area: impl Into<String>, kind: SuggestionKind, comment: impl Into<String>) -> Self {
        Self {
            area: area.into(),
            kind,
            comment: comment.into(),
        }
    }
}

fn position(features: &[FeatureReport], feature: Feature) -> PercentileBin {
    features
        .iter()
        .find(|report| report.feature == feature)
        .map_or(PercentileBin::Unknown, |report| report.market_position)
}

fn level(axes: &[AxisReport], axis: Axis) -> Option<AxisLevel> {
    axes.iter()
        .find(|report| report.axis == axis)
        .map(|report| report.level)
}

pub(crate) fn generate(
    axes: &[AxisReport],
    features: &[FeatureReport],
    band: ScoreBand,
) -> Vec<Suggestion> {
    let mut out = Vec::new();

    let tempo = position(features, Feature::TempoBpm);
    if tempo.is_high() {
        out.push(Suggestion::new(
            "Tempo",
            SuggestionKind::MarketAlignment,
            "Tempo is above typical norms; consider nudging toward common bands if mainstream alignment is desired.",
        ));
    } else if tempo.is_low() {
        out.push(Suggestion::new(
            "Tempo",
            SuggestionKind::MarketAlignment,
            "Tempo is below common norms; a slight lift can improve familiarity if you want mainstream feel.",
        ));
    }

    let runtime = position(features, Feature::DurationSec);
    if runtime.is_high() {
        out.push(Suggestion::new(
            "Runtime",
            SuggestionKind::StructureTrim,
            "Runtime is long relative to norms; consider tightening intros/outros or reducing repeats.",
        ));
    } else if runtime.is_low() {
        out.push(Suggestion::new(
            "Runtime",
            SuggestionKind::StructureExtend,
            "Runtime is short versus norms; consider adding a fuller verse/bridge for traditional structure.",
        ));
    }

    let loudness = position(features, Feature::LoudnessLufs);
    if loudness.is_low() {
        out.push(Suggestion::new(
            "Loudness",
            SuggestionKind::MixMaster,
            "Track is quieter than typical masters; more bus compression/limiting can raise perceived loudness.",
        ));
    } else if loudness.is_high() {
        out.push(Suggestion::new(
            "Loudness",
            SuggestionKind::MixMaster,
            "Track is hot versus norms; ease limiting to reduce fatigue while keeping impact.",
        ));
    }

    for report in axes.iter().filter(|r| r.level == AxisLevel::Low) {
        out.push(Suggestion::new(
            report.axis.name(),
            SuggestionKind::AxisLift,
            axis_comment(report.axis, AxisLevel::Low),
        ));
    }

    match (level(axes, Axis::Energy), level(axes, Axis::Danceability)) {
        (Some(AxisLevel::High), Some(AxisLevel::Low)) => out.push(Suggestion::new(
            "Groove",
            SuggestionKind::EnergyVsDanceability,
            "Energy is high but Danceability is low; simplify drums or tighten kick-bass to stabilize groove.",
        )),
        (Some(AxisLevel::Low), Some(AxisLevel::High)) => out.push(Suggestion::new(
            "Energy vs Groove",
            SuggestionKind::EnergyVsDanceability,
            "Danceability is high but Energy is low; add transient punch or section contrast to lift impact.",
        )),
        _ => {}
    }

    match level(axes, Axis::Valence) {
        Some(AxisLevel::Low) => out.push(Suggestion::new(
            "Valence / Mood",
            SuggestionKind::MoodAdjust,
            "Mood skews darker; if a brighter feel is desired, use major-leaning harmony or lighter textures in key sections.",
        )),
        Some(AxisLevel::High) => out.push(Suggestion::new(
            "Valence / Mood",
            SuggestionKind::MoodBalance,
            "Mood is bright; keep some contrast/tension to avoid one-dimensional feel.",
        )),
        _ => {}
    }

    match band {
        ScoreBand::Unknown => {}
        band if band.is_emerging() => out.push(Suggestion::new(
            "Strategy",
            SuggestionKind::LaneChoice,
            "Score is experimental/developing; choose whether to lean niche or gently align key axes toward norms.",
        )),
        _ => out.push(Suggestion::new(
            "Strategy",
            SuggestionKind::FineTune,
            "Score is strong/apex; focus on mix clarity, vocals, and transitions over large structural changes.",
        )),
    }

    out
}
