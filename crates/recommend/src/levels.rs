use policy::ScoringPolicy;
use scoring::Axis;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Three-way axis reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisLevel {
    Low,
    Mid,
    High,
}

impl AxisLevel {
    /// Level from a z-score when one exists, otherwise from the raw value.
    ///
    /// With z: `z < -t` is low, `z > t` is high, where
    /// `t = policy.axis_level_threshold`. Without z the raw cut points in
    /// `policy.raw_axis_thresholds` apply, both upper-inclusive.
    pub fn classify(raw: f64, z: Option<f64>, policy: &ScoringPolicy) -> Self {
        match z {
            Some(z) => Self::from_z(z, policy.axis_level_threshold),
            None => Self::from_raw(raw, policy),
        }
    }

    pub fn from_z(z: f64, threshold: f64) -> Self {
        if z < -threshold {
            AxisLevel::Low
        } else if z > threshold {
            AxisLevel::High
        } else {
            AxisLevel::Mid
        }
    }

    pub fn from_raw(raw: f64, policy: &ScoringPolicy) -> Self {
        let cuts = policy.raw_axis_thresholds;
        if raw <= cuts.low_max {
            AxisLevel::Low
        } else if raw <= cuts.mid_max {
            AxisLevel::Mid
        } else {
            AxisLevel::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AxisLevel::Low => "low",
            AxisLevel::Mid => "mid",
            AxisLevel::High => "high",
        }
    }
}

impl fmt::Display for AxisLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reader-facing sentence for an axis at a level.
pub fn axis_comment(axis: Axis, level: AxisLevel) -> &'static str {
    use AxisLevel::{High, Low, Mid};
    match (axis, level) {
        (Axis::TempoFit, Low) => "TempoFit is low; tempo sits off typical norms.",
        (Axis::TempoFit, Mid) => "TempoFit is moderate; workable vs norms.",
        (Axis::TempoFit, High) => "TempoFit is strong; tempo aligns with norms.",
        (Axis::RuntimeFit, Low) => "RuntimeFit is low; structure length diverges from norms.",
        (Axis::RuntimeFit, Mid) => "RuntimeFit is moderate.",
        (Axis::RuntimeFit, High) => "RuntimeFit is strong; runtime fits norms well.",
        (Axis::LoudnessFit, Low) => "LoudnessFit is low; loudness differs from modern masters.",
        (Axis::LoudnessFit, Mid) => "LoudnessFit is workable.",
        (Axis::LoudnessFit, High) => "LoudnessFit is strong; loudness matches norms.",
        (Axis::Energy, Low) => "Energy is restrained; may feel subdued versus norms.",
        (Axis::Energy, Mid) => "Energy is balanced.",
        (Axis::Energy, High) => "Energy is strong; matches impactful material.",
        (Axis::Danceability, Low) => "Danceability is low; groove may feel unstable or niche.",
        (Axis::Danceability, Mid) => "Danceability is workable.",
        (Axis::Danceability, High) => "Danceability is high; groove is body-friendly.",
        (Axis::Valence, Low) => "Valence is low; mood skews darker.",
        (Axis::Valence, Mid) => "Valence is balanced.",
        (Axis::Valence, High) => "Valence is high; bright/positive mood.",
    }
}
