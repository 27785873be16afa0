use serde::{Deserialize, Serialize};
use std::fmt;

/// Track-level measurements compared against market percentiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    TempoBpm,
    DurationSec,
    LoudnessLufs,
    Energy,
    Danceability,
    Valence,
}

impl Feature {
    /// Report order.
    pub const ALL: [Feature; 6] = [
        Feature::TempoBpm,
        Feature::DurationSec,
        Feature::LoudnessLufs,
        Feature::Energy,
        Feature::Danceability,
        Feature::Valence,
    ];

    /// Key used in snapshot `features` maps.
    pub fn key(self) -> &'static str {
        match self {
            Feature::TempoBpm => "tempo_bpm",
            Feature::DurationSec => "duration_sec",
            Feature::LoudnessLufs => "loudness_lufs",
            Feature::Energy => "energy",
            Feature::Danceability => "danceability",
            Feature::Valence => "valence",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Raw extracted measurements. Any of them may be missing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackFeatures {
    #[serde(default)]
    pub tempo_bpm: Option<f64>,
    #[serde(default)]
    pub duration_sec: Option<f64>,
    #[serde(default)]
    pub loudness_lufs: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub valence: Option<f64>,
}

impl TrackFeatures {
    pub fn get(&self, feature: Feature) -> Option<f64> {
        match feature {
            Feature::TempoBpm => self.tempo_bpm,
            Feature::DurationSec => self.duration_sec,
            Feature::LoudnessLufs => self.loudness_lufs,
            Feature::Energy => self.energy,
            Feature::Danceability => self.danceability,
            Feature::Valence => self.valence,
        }
    }

    pub fn is_empty(&self) -> bool {
        Feature::ALL.iter().all(|f| self.get(*f).is_none())
    }
}
