use serde::{Deserialize, Serialize};
use std::fmt;

/// Percentile and moment summary for one feature or axis.
///
/// Every field is optional: snapshots are produced by an external job and
/// routinely omit stats that could not be computed for a lane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    #[serde(default)]
    pub p10: Option<f64>,
    #[serde(default)]
    pub p25: Option<f64>,
    #[serde(default)]
    pub p50: Option<f64>,
    #[serde(default)]
    pub p75: Option<f64>,
    #[serde(default)]
    pub p90: Option<f64>,
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub std: Option<f64>,
}

impl FeatureStats {
    pub fn zscore(&self, value: Option<f64>) -> Option<f64> {
        zscore(value, self.mean, self.std)
    }

    pub fn percentile_bin(&self, value: Option<f64>) -> PercentileBin {
        PercentileBin::classify(value, self)
    }
}

/// Mean and standard deviation of a scalar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MomentStats {
    #[serde(default)]
    pub mean: Option<f64>,
    #[serde(default)]
    pub std: Option<f64>,
}

impl MomentStats {
    pub fn zscore(&self, value: Option<f64>) -> Option<f64> {
        zscore(value, self.mean, self.std)
    }
}

/// `(value - mean) / std`.
///
/// `None` if any input is missing or non-finite; `0.0` when `std == 0`.
pub fn zscore(value: Option<f64>, mean: Option<f64>, std: Option<f64>) -> Option<f64> {
    let (v, m, s) = (value?, mean?, std?);
    if !v.is_finite() || !m.is_finite() || !s.is_finite() {
        return None;
    }
    if s == 0.0 {
        return Some(0.0);
    }
    Some((v - m) / s)
}

/// Position of a value relative to a cohort's percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PercentileBin {
    BelowP10,
    BetweenP10P25,
    BetweenP25P50,
    BetweenP50P75,
    BetweenP75P90,
    AboveP90,
    Unknown,
}

impl PercentileBin {
    /// Bin `value` against `p10..p90`.
    ///
    /// Lower edges are exclusive up to p75; `p90` itself falls in
    /// `between_p75_p90`. Any missing or non-finite input yields `Unknown`.
    pub fn classify(value: Option<f64>, stats: &FeatureStats) -> Self {
        let cuts = [stats.p10, stats.p25, stats.p50, stats.p75, stats.p90];
        let (Some(v), [Some(p10), Some(p25), Some(p50), Some(p75), Some(p90)]) = (value, cuts)
        else {
            return PercentileBin::Unknown;
        };
        if ![v, p10, p25, p50, p75, p90].iter().all(|x| x.is_finite()) {
            return PercentileBin::Unknown;
        }

        if v < p10 {
            PercentileBin::BelowP10
        } else if v < p25 {
            PercentileBin::BetweenP10P25
        } else if v < p50 {
            PercentileBin::BetweenP25P50
        } else if v < p75 {
            PercentileBin::BetweenP50P75
        } else if v <= p90 {
            PercentileBin::BetweenP75P90
        } else {
            PercentileBin::AboveP90
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PercentileBin::BelowP10 => "below_p10",
            PercentileBin::BetweenP10P25 => "between_p10_p25",
            PercentileBin::BetweenP25P50 => "between_p25_p50",
            PercentileBin::BetweenP50P75 => "between_p50_p75",
            PercentileBin::BetweenP75P90 => "between_p75_p90",
            PercentileBin::AboveP90 => "above_p90",
            PercentileBin::Unknown => "unknown",
        }
    }

    /// `below_p10` or `between_p10_p25`.
    pub fn is_low(self) -> bool {
        matches!(self, PercentileBin::BelowP10 | PercentileBin::BetweenP10P25)
    }

    /// `between_p75_p90` or `above_p90`.
    pub fn is_high(self) -> bool {
        matches!(self, PercentileBin::BetweenP75P90 | PercentileBin::AboveP90)
    }
}

impl fmt::Display for PercentileBin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
