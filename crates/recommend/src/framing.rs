//! Advisory-only framing blocks: the Goldilocks market/emotional target and
//! the structural feature gates.
//!
//! Both are built after the score and read nothing that feeds it, so they
//! can never move `canonical_score`.

use policy::ScoringPolicy;
use scoring::TimingOutcome;
use serde::{Deserialize, Serialize};

/// Target for both framing dimensions.
pub const GOLDILOCKS_TARGET: f64 = 0.50;

const GOLDILOCKS_RATIONALE: &str =
    "Shift modestly toward market framing while tempering emotive claims.";
const GOLDILOCKS_SAFETY: &str = "Goldilocks is advisory-only; the canonical score is unchanged.";
const STRUCTURAL_REASONING: &str =
    "Subfeatures dropped due to structural eligibility, not numeric scoring logic.";

/// How market-facing and how emotive the pitch around a track currently
/// reads, each in `[0, 1]`. Both default to the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FramingObservation {
    pub market: f64,
    pub emotional: f64,
}

impl Default for FramingObservation {
    fn default() -> Self {
        Self {
            market: GOLDILOCKS_TARGET,
            emotional: GOLDILOCKS_TARGET,
        }
    }
}

impl FramingObservation {
    /// Values are clamped to `[0, 1]`; a non-finite value reads as the target.
    pub fn new(market: f64, emotional: f64) -> Self {
        let clean = |v: f64| {
            if v.is_finite() {
                v.clamp(0.0, 1.0)
            } else {
                GOLDILOCKS_TARGET
            }
        };
        Self {
            market: clean(market),
            emotional: clean(emotional),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goldilocks {
    pub target_market: f64,
    pub target_emotional: f64,
    pub observed_market: f64,
    pub observed_emotional: f64,
    /// `target - observed`; positive means move toward more of it.
    pub delta_market: f64,
    pub delta_emotional: f64,
    pub rationale: String,
    pub safety_note: String,
}

impl Goldilocks {
    pub fn from_observation(observed: FramingObservation) -> Self {
        Self {
            target_market: GOLDILOCKS_TARGET,
            target_emotional: GOLDILOCKS_TARGET,
            observed_market: observed.market,
            observed_emotional: observed.emotional,
            delta_market: GOLDILOCKS_TARGET - observed.market,
            delta_emotional: GOLDILOCKS_TARGET - observed.emotional,
            rationale: GOLDILOCKS_RATIONALE.to_string(),
            safety_note: GOLDILOCKS_SAFETY.to_string(),
        }
    }
}

/// Subfeature withheld from the advisory for structural reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroppedFeature {
    /// No time-to-chorus survived the gate.
    ChorusLift,
    /// Exposure counting is not enabled.
    Exposures,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralNotes {
    pub struct_mode: String,
    pub struct_reliable: bool,
    pub use_timing: bool,
    pub use_exposures: bool,
    pub timing_gate_threshold: f64,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralGates {
    pub drop: Vec<DroppedFeature>,
    pub notes: StructuralNotes,
}

impl StructuralGates {
    pub fn evaluate(timing: Option<&TimingOutcome>, policy: &ScoringPolicy) -> Self {
        let mut drop = Vec::new();
        if timing.and_then(|t| t.timing_seconds).is_none() {
            drop.push(DroppedFeature::ChorusLift);
        }
        drop.push(DroppedFeature::Exposures);

        Self {
            drop,
            notes: StructuralNotes {
                struct_mode: "optional".to_string(),
                struct_reliable: false,
                use_timing: true,
                use_exposures: false,
                timing_gate_threshold: policy.timing_confidence_gate,
                reasoning: STRUCTURAL_REASONING.to_string(),
            },
        }
    }

    pub fn drops(&self, feature: DroppedFeature) -> bool {
        self.drop.contains(&feature)
    }
}
