use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ScoringError;

/// Number of axes in every audio axis vector.
pub const AXIS_COUNT: usize = 6;

/// The six normalized audio axes, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Axis {
    TempoFit,
    RuntimeFit,
    LoudnessFit,
    Energy,
    Danceability,
    Valence,
}

impl Axis {
    /// Canonical iteration order. Suggestions and reports follow it.
    pub const ALL: [Axis; AXIS_COUNT] = [
        Axis::TempoFit,
        Axis::RuntimeFit,
        Axis::LoudnessFit,
        Axis::Energy,
        Axis::Danceability,
        Axis::Valence,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Axis::TempoFit => "TempoFit",
            Axis::RuntimeFit => "RuntimeFit",
            Axis::LoudnessFit => "LoudnessFit",
            Axis::Energy => "Energy",
            Axis::Danceability => "Danceability",
            Axis::Valence => "Valence",
        }
    }

    fn position(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Exactly six finite axis values.
///
/// Length and finiteness are checked once at construction; after that the
/// vector is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct AxisVector {
    values: [f64; AXIS_COUNT],
}

impl AxisVector {
    /// Build from a slice, rejecting any length other than six and any
    /// non-finite value. No padding or truncation happens here.
    pub fn from_slice(values: &[f64]) -> Result<Self, ScoringError> {
        if values.len() != AXIS_COUNT {
            return Err(ScoringError::invalid(format!(
                "axis vector must have exactly {AXIS_COUNT} values, got {}",
                values.len()
            )));
        }
        if let Some((idx, bad)) = values.iter().enumerate().find(|(_, v)| !v.is_finite()) {
            return Err(ScoringError::invalid(format!(
                "axis {} is not numeric ({bad})",
                Axis::ALL[idx]
            )));
        }
        let mut out = [0.0; AXIS_COUNT];
        out.copy_from_slice(values);
        Ok(Self { values: out })
    }

    pub fn get(&self, axis: Axis) -> f64 {
        self.values[axis.position()]
    }

    pub fn values(&self) -> &[f64; AXIS_COUNT] {
        &self.values
    }

    /// `(axis, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (Axis, f64)> + '_ {
        Axis::ALL.iter().map(move |&axis| (axis, self.get(axis)))
    }

    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / AXIS_COUNT as f64
    }
}

impl TryFrom<Vec<f64>> for AxisVector {
    type Error = ScoringError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_slice(&values)
    }
}

impl TryFrom<&[f64]> for AxisVector {
    type Error = ScoringError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        Self::from_slice(values)
    }
}

impl From<AxisVector> for Vec<f64> {
    fn from(axes: AxisVector) -> Self {
        axes.values.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wrong_lengths() {
        for len in [0usize, 5, 7, 12] {
            let values = vec![0.5; len];
            let err = AxisVector::from_slice(&values).unwrap_err();
            assert!(
                matches!(err, ScoringError::InvalidInput(ref msg) if msg.contains("exactly 6")),
                "len {len} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_non_finite_values() {
        let err = AxisVector::from_slice(&[0.1, 0.2, f64::NAN, 0.4, 0.5, 0.6]).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidInput(ref msg) if msg.contains("LoudnessFit")));
    }

    #[test]
    fn iterates_in_canonical_order() {
        let axes = AxisVector::from_slice(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]).expect("axes");
        let names: Vec<_> = axes.iter().map(|(axis, _)| axis.name()).collect();
        assert_eq!(
            names,
            ["TempoFit", "RuntimeFit", "LoudnessFit", "Energy", "Danceability", "Valence"]
        );
        assert_eq!(axes.get(Axis::Valence), 0.6);
    }

    #[test]
    fn serde_enforces_length() {
        let parsed: Result<AxisVector, _> = serde_json::from_str("[0.1, 0.2, 0.3]");
        assert!(parsed.is_err());
        let ok: AxisVector =
            serde_json::from_str("[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]").expect("six values");
        assert_eq!(ok.get(Axis::TempoFit), 0.1);
    }
}
