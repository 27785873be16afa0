use index::Neighbor;
use norms::{PercentileBin, ResolvedNorms, overlay};
use policy::ScoringPolicy;
use scoring::{Axis, AxisVector, CompositeScore, GateDecision, TimingOutcome};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::framing::{FramingObservation, Goldilocks, StructuralGates};
use crate::levels::{AxisLevel, axis_comment};
use crate::summaries::SummaryInputs;
use crate::{
    DISCLAIMER, Feature, HistoricalEcho, IntentSummaries, REC_VERSION, ScoreBand, Suggestion,
    TrackFeatures, suggestions,
};

/// One axis as the reader sees it. `z` is `None` and `market_position` is
/// `unknown` whenever norms are unavailable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisReport {
    pub axis: Axis,
    pub raw: f64,
    pub z: Option<f64>,
    pub level: AxisLevel,
    pub market_position: PercentileBin,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub feature: Feature,
    pub value: Option<f64>,
    pub z: Option<f64>,
    pub market_position: PercentileBin,
}

/// Identity of the statistics an advisory was compared against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormsUsed {
    pub region: String,
    pub tier: String,
    pub version: String,
    pub last_refreshed_at: Option<String>,
    pub lane: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MarketComparison {
    Available { norms_used: NormsUsed },
    Unavailable { reason: String },
}

impl MarketComparison {
    pub fn is_available(&self) -> bool {
        matches!(self, MarketComparison::Available { .. })
    }
}

/// Norms handed to the synthesizer: either resolved for one lane, or the
/// reason they could not be.
#[derive(Debug, Clone, Copy)]
pub enum NormsAvailability<'a> {
    Available(&'a ResolvedNorms),
    Unavailable { reason: &'a str },
}

impl<'a> NormsAvailability<'a> {
    fn resolved(&self) -> Option<&'a ResolvedNorms> {
        match *self {
            NormsAvailability::Available(norms) => Some(norms),
            NormsAvailability::Unavailable { .. } => None,
        }
    }
}

/// Policy values an advisory was produced under.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub weight: f64,
    pub score_cap: f64,
    pub timing_confidence_gate: f64,
    pub lane_id: String,
    pub reproducibility_seeds: Vec<i64>,
    pub policy_fingerprint: String,
}

impl Provenance {
    pub fn from_policy(policy: &ScoringPolicy) -> Self {
        Self {
            weight: policy.weight,
            score_cap: policy.score_cap,
            timing_confidence_gate: policy.timing_confidence_gate,
            lane_id: policy.lane_id.clone(),
            reproducibility_seeds: policy.reproducibility_seeds.clone(),
            policy_fingerprint: policy.scoring_fingerprint(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub raw_mean: f64,
    pub capped: bool,
}

/// Final per-request advisory. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Advisory {
    pub rec_version: String,
    pub canonical_score: Option<f64>,
    pub score_band: ScoreBand,
    pub band_comment: String,
    pub axes: Vec<AxisReport>,
    pub features_vs_market: Vec<FeatureReport>,
    pub composite_z: Option<f64>,
    pub timing_z: Option<f64>,
    pub timing: Option<TimingOutcome>,
    pub market_comparison: MarketComparison,
    pub optimization: Vec<Suggestion>,
    pub intent_summaries: IntentSummaries,
    pub historical_echo: HistoricalEcho,
    pub neighbors: Vec<Neighbor>,
    pub warnings: Vec<String>,
    pub disclaimer: String,
    pub provenance: Provenance,
    pub goldilocks: Goldilocks,
    pub structural_gates: StructuralGates,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

/// Everything the synthesizer reads for one request.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub axes: &'a AxisVector,
    /// `None` when no composite could be computed upstream.
    pub score: Option<CompositeScore>,
    pub features: &'a TrackFeatures,
    pub timing: Option<&'a TimingOutcome>,
    pub neighbors: &'a [Neighbor],
    pub norms: NormsAvailability<'a>,
    /// Read only by the Goldilocks block.
    pub framing: FramingObservation,
}

/// Combine score, overlay, timing and neighbours into an [`Advisory`].
///
/// Pure: identical inputs produce an identical advisory.
pub fn synthesize(input: &SynthesisInput<'_>, policy: &ScoringPolicy) -> Advisory {
    let resolved = input.norms.resolved();
    let stats = resolved.map(|n| &n.stats);
    let canonical_score = input.score.map(|s| s.score);
    let band = ScoreBand::classify(canonical_score);

    let axes: Vec<AxisReport> = input
        .axes
        .iter()
        .map(|(axis, raw)| {
            let axis_stats = stats.and_then(|s| s.axis(axis.name()));
            let z = axis_stats.and_then(|s| s.zscore(Some(raw)));
            let level = AxisLevel::classify(raw, z, policy);
            AxisReport {
                axis,
                raw,
                z,
                level,
                market_position: axis_stats
                    .map_or(PercentileBin::Unknown, |s| s.percentile_bin(Some(raw))),
                comment: axis_comment(axis, level).to_string(),
            }
        })
        .collect();

    let features_vs_market: Vec<FeatureReport> = Feature::ALL
        .iter()
        .map(|&feature| {
            let value = input.features.get(feature);
            let feature_stats = stats.and_then(|s| s.feature(feature.key()));
            FeatureReport {
                feature,
                value,
                z: feature_stats.and_then(|s| s.zscore(value)),
                market_position: feature_stats
                    .map_or(PercentileBin::Unknown, |s| s.percentile_bin(value)),
            }
        })
        .collect();

    let timing_seconds = input.timing.and_then(|t| t.timing_seconds);
    let scalars = stats.map(|s| {
        overlay(
            input.axes.iter().map(|(axis, raw)| (axis.name(), Some(raw))),
            canonical_score,
            timing_seconds,
            s,
        )
    });
    let composite_z = scalars.as_ref().and_then(|o| o.composite);
    let timing_z = scalars.as_ref().and_then(|o| o.timing);

    let mut warnings = Vec::new();
    let market_comparison = match input.norms {
        NormsAvailability::Available(norms) => MarketComparison::Available {
            norms_used: NormsUsed {
                region: norms.identity.region.clone(),
                tier: norms.identity.tier.clone(),
                version: norms.identity.version.clone(),
                last_refreshed_at: norms.last_refreshed_at.clone(),
                lane: norms.lane.clone(),
            },
        },
        NormsAvailability::Unavailable { reason } => {
            warnings.push(format!(
                "Market norms unavailable ({reason}); positions are unknown and levels use raw axis values."
            ));
            MarketComparison::Unavailable {
                reason: reason.to_string(),
            }
        }
    };
    if canonical_score.is_none() {
        warnings.push("No composite score provided; band is unknown.".to_string());
    }
    if input.features.is_empty() {
        warnings.push("Track features missing; market positioning limited.".to_string());
    }
    if let Some(timing) = input.timing.filter(|t| t.decision == GateDecision::Gate) {
        warnings.push(format!(
            "Timing confidence {:.2} is below the {:.2} gate; time-to-chorus and chorus lift withheld.",
            timing.timing_confidence, policy.timing_confidence_gate
        ));
    }

    let optimization = suggestions::generate(&axes, &features_vs_market, band);
    let historical_echo = HistoricalEcho::from_neighbors(input.neighbors);
    let intent_summaries = IntentSummaries::build(&SummaryInputs {
        axes: &axes,
        features: &features_vs_market,
        timing: input.timing,
        echo: &historical_echo,
        band,
        norms_available: resolved.is_some(),
        warnings: &warnings,
        suggestions: &optimization,
    });

    let diagnostics = input
        .score
        .filter(|_| policy.emit_diagnostics)
        .map(|s| Diagnostics {
            raw_mean: s.raw_mean,
            capped: s.capped,
        });

    debug!(
        band = band.as_str(),
        suggestions = optimization.len(),
        neighbors = input.neighbors.len(),
        norms = resolved.is_some(),
        "advisory_synthesized"
    );

    Advisory {
        rec_version: REC_VERSION.to_string(),
        canonical_score,
        score_band: band,
        band_comment: band.comment(canonical_score),
        axes,
        features_vs_market,
        composite_z,
        timing_z,
        timing: input.timing.cloned(),
        market_comparison,
        optimization,
        intent_summaries,
        historical_echo,
        neighbors: input.neighbors.to_vec(),
        warnings,
        disclaimer: DISCLAIMER.to_string(),
        provenance: Provenance::from_policy(policy),
        goldilocks: Goldilocks::from_observation(input.framing),
        structural_gates: StructuralGates::evaluate(input.timing, policy),
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use norms::CohortNormsSnapshot;
    use scoring::composite_score;
    use serde_json::Value;

    const SNAPSHOT: &str = r#"{
        "region": "US",
        "tier": "Hot100",
        "version": "2024-YE",
        "last_refreshed_at": "2025-01-15T00:00:00Z",
        "lanes": {
            "tier1:2015_2024": {
                "features": {
                    "tempo_bpm": {"p10": 80, "p25": 90, "p50": 102, "p75": 120, "p90": 130, "mean": 105, "std": 15},
                    "duration_sec": {"p10": 150, "p25": 170, "p50": 195, "p75": 215, "p90": 240, "mean": 195, "std": 30},
                    "loudness_lufs": {"p10": -12, "p25": -10, "p50": -8.5, "p75": -7, "p90": -6, "mean": -8.5, "std": 2}
                },
                "axes": {
                    "TempoFit": {"p10": 0.3, "p25": 0.45, "p50": 0.6, "p75": 0.72, "p90": 0.8, "mean": 0.6, "std": 0.1},
                    "Energy": {"mean": 0.6, "std": 0.1},
                    "Danceability": {"mean": 0.6, "std": 0.1}
                },
                "composite": {"mean": 0.5, "std": 0.05},
                "timing": {"mean": 30.0, "std": 10.0}
            }
        }
    }"#;

    fn resolved() -> ResolvedNorms {
        CohortNormsSnapshot::from_json_str(SNAPSHOT)
            .expect("snapshot")
            .resolve("tier1:2015_2024")
            .expect("lane")
    }

    fn axes(values: [f64; 6]) -> AxisVector {
        AxisVector::from_slice(&values).expect("axes")
    }

    #[test]
    fn no_norms_marks_everything_unknown_but_keeps_levels() {
        let policy = ScoringPolicy::default();
        let axes = axes([0.62; 6]);
        let features = TrackFeatures {
            tempo_bpm: Some(128.0),
            ..Default::default()
        };
        let advisory = synthesize(
            &SynthesisInput {
                axes: &axes,
                score: Some(CompositeScore::compute(&axes, &policy)),
                features: &features,
                timing: None,
                neighbors: &[],
                norms: NormsAvailability::Unavailable {
                    reason: "lane tier1:2015_2024 not in snapshot",
                },
                framing: FramingObservation::default(),
            },
            &policy,
        );

        assert!((advisory.canonical_score.expect("score") - 0.58).abs() < 1e-9);
        assert_eq!(advisory.score_band, ScoreBand::Developing);
        assert_eq!(advisory.axes.len(), 6);
        for report in &advisory.axes {
            assert_eq!(report.z, None);
            assert_eq!(report.market_position, PercentileBin::Unknown);
            assert_eq!(report.level, AxisLevel::Mid);
        }
        assert_eq!(advisory.features_vs_market.len(), 6);
        assert!(advisory
            .features_vs_market
            .iter()
            .all(|f| f.market_position == PercentileBin::Unknown && f.z.is_none()));
        assert!(!advisory.market_comparison.is_available());
        assert!(advisory.warnings[0].contains("Market norms unavailable"));
        assert_eq!(advisory.composite_z, None);
    }

    #[test]
    fn null_markers_are_serialized_not_omitted() {
        let policy = ScoringPolicy::default();
        let axes = axes([0.5; 6]);
        let advisory = synthesize(
            &SynthesisInput {
                axes: &axes,
                score: None,
                features: &TrackFeatures::default(),
                timing: None,
                neighbors: &[],
                norms: NormsAvailability::Unavailable { reason: "no snapshot" },
                framing: FramingObservation::default(),
            },
            &policy,
        );
        let json: Value = serde_json::to_value(&advisory).expect("serialize");
        assert_eq!(json["axes"][0]["z"], Value::Null);
        assert_eq!(json["axes"][0]["market_position"], "unknown");
        assert_eq!(json["score_band"], "unknown");
        assert_eq!(json["market_comparison"]["status"], "unavailable");
        for key in ["structure", "groove", "loudness", "mood", "historical", "strategy"] {
            assert!(json["intent_summaries"].get(key).is_some(), "{key}");
        }
        assert!(json.get("diagnostics").is_none());
    }

    #[test]
    fn norms_drive_z_levels_and_positions() {
        let policy = ScoringPolicy::default();
        let axes = axes([0.9, 0.5, 0.5, 0.8, 0.4, 0.5]);
        let features = TrackFeatures {
            tempo_bpm: Some(135.0),
            duration_sec: Some(140.0),
            loudness_lufs: Some(-8.0),
            ..Default::default()
        };
        let norms = resolved();
        let score = CompositeScore::compute(&axes, &policy);
        let advisory = synthesize(
            &SynthesisInput {
                axes: &axes,
                score: Some(score),
                features: &features,
                timing: None,
                neighbors: &[],
                norms: NormsAvailability::Available(&norms),
                framing: FramingObservation::default(),
            },
            &policy,
        );

        let tempo_fit = &advisory.axes[0];
        assert!((tempo_fit.z.expect("z") - 3.0).abs() < 1e-9);
        assert_eq!(tempo_fit.level, AxisLevel::High);
        assert_eq!(tempo_fit.market_position, PercentileBin::AboveP90);

        // no axis stats for RuntimeFit: raw fallback
        assert_eq!(advisory.axes[1].z, None);
        assert_eq!(advisory.axes[1].level, AxisLevel::Mid);

        assert_eq!(advisory.axes[3].level, AxisLevel::High);
        assert_eq!(advisory.axes[4].level, AxisLevel::Low);

        let kinds: Vec<_> = advisory.optimization.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                crate::SuggestionKind::MarketAlignment,
                crate::SuggestionKind::StructureExtend,
                crate::SuggestionKind::AxisLift,
                crate::SuggestionKind::EnergyVsDanceability,
                crate::SuggestionKind::LaneChoice,
            ]
        );

        let expected_composite_z = (composite_score(&axes, &policy) - 0.5) / 0.05;
        assert!((advisory.composite_z.expect("composite z") - expected_composite_z).abs() < 1e-9);
        match &advisory.market_comparison {
            MarketComparison::Available { norms_used } => {
                assert_eq!(norms_used.lane, "tier1:2015_2024");
                assert_eq!(norms_used.version, "2024-YE");
            }
            other => panic!("expected available norms, got {other:?}"),
        }
        assert!(advisory
            .intent_summaries
            .strategy
            .iter()
            .any(|line| line.starts_with("Strongest axis: TempoFit")));
    }

    #[test]
    fn diagnostics_follow_policy_flag() {
        let axes = axes([0.9; 6]);
        let policy = ScoringPolicy::default().with_emit_diagnostics(true);
        let advisory = synthesize(
            &SynthesisInput {
                axes: &axes,
                score: Some(CompositeScore::compute(&axes, &policy)),
                features: &TrackFeatures::default(),
                timing: None,
                neighbors: &[],
                norms: NormsAvailability::Unavailable { reason: "none" },
                framing: FramingObservation::default(),
            },
            &policy,
        );
        let diagnostics = advisory.diagnostics.expect("diagnostics");
        assert!(diagnostics.capped);
        assert!((diagnostics.raw_mean - 0.9).abs() < 1e-12);
        assert_eq!(advisory.provenance.policy_fingerprint, policy.scoring_fingerprint());
    }

    #[test]
    fn framing_blocks_never_move_the_score() {
        let policy = ScoringPolicy::default();
        let axes = axes([0.71, 0.42, 0.66, 0.58, 0.93, 0.12]);
        let norms = resolved();
        let build = |framing: FramingObservation| {
            synthesize(
                &SynthesisInput {
                    axes: &axes,
                    score: Some(CompositeScore::compute(&axes, &policy)),
                    features: &TrackFeatures::default(),
                    timing: None,
                    neighbors: &[],
                    norms: NormsAvailability::Available(&norms),
                    framing,
                },
                &policy,
            )
        };
        let neutral = build(FramingObservation::default());
        let pushed = build(FramingObservation::new(0.95, 0.1));

        let a = neutral.canonical_score.expect("score");
        let b = pushed.canonical_score.expect("score");
        assert_eq!(a.to_bits(), b.to_bits());
        assert_eq!(neutral.composite_z, pushed.composite_z);
        assert_eq!(neutral.score_band, pushed.score_band);
        assert_eq!(neutral.optimization, pushed.optimization);

        assert_eq!(neutral.goldilocks.delta_market, 0.0);
        assert!((pushed.goldilocks.delta_market - -0.45).abs() < 1e-12);
        assert!(pushed.structural_gates.drops(crate::DroppedFeature::ChorusLift));
        assert!(pushed.structural_gates.drops(crate::DroppedFeature::Exposures));
    }
}
