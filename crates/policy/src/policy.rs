use serde::{Deserialize, Serialize};

use crate::PolicyError;

/// Presentation-only wording attached to a policy.
///
/// None of these fields may influence a score, a z-score or a band.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyCommentary {
    /// Free-form notes about structural priors shown to the reader.
    #[serde(default)]
    pub structural_priors: Vec<String>,
    /// Explanation of why the cap sits where it does.
    #[serde(default)]
    pub caps_note: Option<String>,
}

/// Raw-value cut points for axis levels when no cohort statistics exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawAxisThresholds {
    /// Values at or below this are `low`.
    pub low_max: f64,
    /// Values at or below this (and above `low_max`) are `mid`.
    pub mid_max: f64,
}

impl Default for RawAxisThresholds {
    fn default() -> Self {
        Self {
            low_max: 0.39,
            mid_max: 0.69,
        }
    }
}

/// Immutable scoring configuration consumed by every stage.
///
/// `ScoringPolicy` is cheap to clone and serde-friendly so it can be loaded
/// from YAML and recorded alongside results for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    /// Audio share in a fused KPI. Reported in provenance only.
    #[serde(default = "ScoringPolicy::default_weight")]
    pub weight: f64,
    /// Upper bound applied to the composite mean, in [0, 1].
    #[serde(default = "ScoringPolicy::default_score_cap")]
    pub score_cap: f64,
    /// Minimum timing confidence required to pass timing through, in [0, 1].
    #[serde(default = "ScoringPolicy::default_timing_confidence_gate")]
    pub timing_confidence_gate: f64,
    /// Loudness window used by the chorus-lift estimator, in seconds.
    #[serde(default = "ScoringPolicy::default_lift_window_duration")]
    pub lift_window_duration: f64,
    /// Lane key used when a request carries no classified lane.
    #[serde(default = "ScoringPolicy::default_lane_id")]
    pub lane_id: String,
    /// Seeds recorded for replay of any stochastic upstream stage.
    #[serde(default)]
    pub reproducibility_seeds: Vec<i64>,
    /// Attach a diagnostics block to every advisory.
    #[serde(default)]
    pub emit_diagnostics: bool,
    /// Symmetric z-score threshold separating low / mid / high axis levels.
    #[serde(default = "ScoringPolicy::default_axis_level_threshold")]
    pub axis_level_threshold: f64,
    /// Raw-value cut points used when z-scores are unavailable.
    #[serde(default)]
    pub raw_axis_thresholds: RawAxisThresholds,
    /// Wording that accompanies the policy. Never read by numeric code.
    #[serde(default)]
    pub commentary: PolicyCommentary,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            weight: Self::default_weight(),
            score_cap: Self::default_score_cap(),
            timing_confidence_gate: Self::default_timing_confidence_gate(),
            lift_window_duration: Self::default_lift_window_duration(),
            lane_id: Self::default_lane_id(),
            reproducibility_seeds: Vec::new(),
            emit_diagnostics: false,
            axis_level_threshold: Self::default_axis_level_threshold(),
            raw_axis_thresholds: RawAxisThresholds::default(),
            commentary: PolicyCommentary::default(),
        }
    }
}

impl ScoringPolicy {
    pub(crate) fn default_weight() -> f64 {
        1.0
    }

    pub(crate) fn default_score_cap() -> f64 {
        0.58
    }

    pub(crate) fn default_timing_confidence_gate() -> f64 {
        0.60
    }

    pub(crate) fn default_lift_window_duration() -> f64 {
        6.0
    }

    pub(crate) fn default_lane_id() -> String {
        "advisory".to_string()
    }

    pub(crate) fn default_axis_level_threshold() -> f64 {
        0.5
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_score_cap(mut self, cap: f64) -> Self {
        self.score_cap = cap;
        self
    }

    pub fn with_timing_confidence_gate(mut self, gate: f64) -> Self {
        self.timing_confidence_gate = gate;
        self
    }

    pub fn with_lift_window_duration(mut self, seconds: f64) -> Self {
        self.lift_window_duration = seconds;
        self
    }

    pub fn with_lane_id(mut self, lane_id: impl Into<String>) -> Self {
        self.lane_id = lane_id.into();
        self
    }

    pub fn with_reproducibility_seeds(mut self, seeds: Vec<i64>) -> Self {
        self.reproducibility_seeds = seeds;
        self
    }

    pub fn with_emit_diagnostics(mut self, emit: bool) -> Self {
        self.emit_diagnostics = emit;
        self
    }

    pub fn with_axis_level_threshold(mut self, threshold: f64) -> Self {
        self.axis_level_threshold = threshold;
        self
    }

    pub fn with_raw_axis_thresholds(mut self, thresholds: RawAxisThresholds) -> Self {
        self.raw_axis_thresholds = thresholds;
        self
    }

    pub fn with_commentary(mut self, commentary: PolicyCommentary) -> Self {
        self.commentary = commentary;
        self
    }

    /// Check every numeric field against its documented range.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(PolicyError::InvalidConfig(
                "weight must be a finite value >= 0.0".into(),
            ));
        }
        if !unit_interval(self.score_cap) {
            return Err(PolicyError::InvalidConfig(
                "score_cap must be between 0.0 and 1.0".into(),
            ));
        }
        if !unit_interval(self.timing_confidence_gate) {
            return Err(PolicyError::InvalidConfig(
                "timing_confidence_gate must be between 0.0 and 1.0".into(),
            ));
        }
        if !self.lift_window_duration.is_finite() || self.lift_window_duration <= 0.0 {
            return Err(PolicyError::InvalidConfig(
                "lift_window_duration must be greater than zero".into(),
            ));
        }
        if self.lane_id.trim().is_empty() {
            return Err(PolicyError::InvalidConfig(
                "lane_id must not be empty".into(),
            ));
        }
        if !self.axis_level_threshold.is_finite() || self.axis_level_threshold <= 0.0 {
            return Err(PolicyError::InvalidConfig(
                "axis_level_threshold must be greater than zero".into(),
            ));
        }
        let RawAxisThresholds { low_max, mid_max } = self.raw_axis_thresholds;
        if !unit_interval(low_max) || !unit_interval(mid_max) || low_max >= mid_max {
            return Err(PolicyError::InvalidConfig(
                "raw_axis_thresholds must satisfy 0 <= low_max < mid_max <= 1".into(),
            ));
        }
        Ok(())
    }

    /// Stable identity of everything that can change a numeric output.
    ///
    /// See [`crate::fingerprint_policy`] for the exact byte layout.
    pub fn scoring_fingerprint(&self) -> String {
        crate::fingerprint_policy(self)
    }
}

fn unit_interval(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}
