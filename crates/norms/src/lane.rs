//! Lane classification: `(chart_rank, release_year, source_kind) -> (tier, era_bucket)`.
//!
//! Pure functions over ordered threshold tables. The free functions use the
//! default tables; a [`LaneClassifier`] carries tables loaded from config.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::NormsError;

/// Era label for a year that is present but outside every configured range.
pub const MISC_ERA: &str = "misc";

/// One rung of the tier ladder: ranks `<= rank_ceiling` map to `tier`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierThreshold {
    pub rank_ceiling: u32,
    pub tier: u8,
}

/// Inclusive year range mapped to an era label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EraRange {
    pub start: i32,
    pub end: i32,
    pub label: String,
}

impl EraRange {
    pub fn new(start: i32, end: i32, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    fn contains(&self, year: i32) -> bool {
        (self.start..=self.end).contains(&year)
    }
}

/// What kind of track a lane is being assigned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// A released reference track with chart history.
    #[default]
    Reference,
    /// An unreleased work in progress.
    #[serde(rename = "wip")]
    WorkInProgress,
}

/// Cohort identity used to pick comparison statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lane {
    pub tier: Option<u8>,
    pub era_bucket: Option<String>,
}

impl Lane {
    pub fn key(&self) -> Option<String> {
        lane_key(self.tier, self.era_bucket.as_deref())
    }
}

/// Tier and era tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaneClassifier {
    /// Ascending by `rank_ceiling`; first match wins.
    pub tiers: Vec<TierThreshold>,
    /// Checked in order; first match wins.
    pub eras: Vec<EraRange>,
}

impl Default for LaneClassifier {
    fn default() -> Self {
        Self {
            tiers: vec![
                TierThreshold {
                    rank_ceiling: 40,
                    tier: 1,
                },
                TierThreshold {
                    rank_ceiling: 100,
                    tier: 2,
                },
                TierThreshold {
                    rank_ceiling: 200,
                    tier: 3,
                },
            ],
            eras: vec![
                EraRange::new(1985, 1994, "1985_1994"),
                EraRange::new(1995, 2004, "1995_2004"),
                EraRange::new(2005, 2014, "2005_2014"),
                EraRange::new(2015, 2024, "2015_2024"),
            ],
        }
    }
}

impl LaneClassifier {
    pub fn new(tiers: Vec<TierThreshold>, eras: Vec<EraRange>) -> Self {
        Self { tiers, eras }
    }

    /// Tables must be non-empty, tiers strictly ascending, ranges non-inverted.
    pub fn validate(&self) -> Result<(), NormsError> {
        let invalid = |msg: String| Err(NormsError::Configuration(msg));
        if self.tiers.is_empty() {
            return invalid("at least one tier threshold is required".into());
        }
        if self
            .tiers
            .windows(2)
            .any(|pair| pair[0].rank_ceiling >= pair[1].rank_ceiling)
        {
            return invalid("tier thresholds must be strictly ascending by rank_ceiling".into());
        }
        if self.eras.is_empty() {
            return invalid("at least one era range is required".into());
        }
        if let Some(bad) = self.eras.iter().find(|era| era.start > era.end) {
            return invalid(format!(
                "era '{}' has start {} after end {}",
                bad.label, bad.start, bad.end
            ));
        }
        if self
            .eras
            .iter()
            .any(|era| era.label.trim().is_empty() || era.label == MISC_ERA)
        {
            return invalid(format!("era labels must be non-empty and not '{MISC_ERA}'"));
        }
        Ok(())
    }

    pub fn tier_from_rank(&self, rank: Option<u32>) -> Option<u8> {
        let rank = rank?;
        self.tiers
            .iter()
            .find(|threshold| rank <= threshold.rank_ceiling)
            .map(|threshold| threshold.tier)
    }

    pub fn era_bucket(&self, year: Option<i32>) -> Option<String> {
        let year = year?;
        let label = self
            .eras
            .iter()
            .find(|era| era.contains(year))
            .map_or(MISC_ERA, |era| era.label.as_str());
        Some(label.to_string())
    }

    pub fn assign_lane(&self, year: Option<i32>, rank: Option<u32>, source: SourceKind) -> Lane {
        let mut tier = self.tier_from_rank(rank);
        let era_bucket = self.era_bucket(year);

        // A WIP with no chart rank stays tier-less. tier_from_rank already
        // returns None here; the branch pins that if the ladder ever grows a
        // default rung.
        if source == SourceKind::WorkInProgress && tier.is_none() {
            tier = None;
        }

        Lane { tier, era_bucket }
    }
}

static DEFAULT_CLASSIFIER: Lazy<LaneClassifier> = Lazy::new(LaneClassifier::default);

pub fn tier_from_rank(rank: Option<u32>) -> Option<u8> {
    DEFAULT_CLASSIFIER.tier_from_rank(rank)
}

pub fn era_bucket(year: Option<i32>) -> Option<String> {
    DEFAULT_CLASSIFIER.era_bucket(year)
}

pub fn assign_lane(year: Option<i32>, rank: Option<u32>, source: SourceKind) -> Lane {
    DEFAULT_CLASSIFIER.assign_lane(year, rank, source)
}

/// `"tier{tier}:{era}"`, or `None` unless both parts are present.
pub fn lane_key(tier: Option<u8>, era: Option<&str>) -> Option<String> {
    match (tier, era) {
        (Some(tier), Some(era)) => Some(format!("tier{tier}:{era}")),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_follow_ascending_ceilings() {
        assert_eq!(tier_from_rank(Some(10)), Some(1));
        assert_eq!(tier_from_rank(Some(40)), Some(1));
        assert_eq!(tier_from_rank(Some(41)), Some(2));
        assert_eq!(tier_from_rank(Some(80)), Some(2));
        assert_eq!(tier_from_rank(Some(150)), Some(3));
        assert_eq!(tier_from_rank(Some(250)), None);
        assert_eq!(tier_from_rank(None), None);
    }

    #[test]
    fn eras_are_inclusive_with_misc_fallback() {
        assert_eq!(era_bucket(Some(1990)).as_deref(), Some("1985_1994"));
        assert_eq!(era_bucket(Some(1985)).as_deref(), Some("1985_1994"));
        assert_eq!(era_bucket(Some(2024)).as_deref(), Some("2015_2024"));
        assert_eq!(era_bucket(Some(1970)).as_deref(), Some("misc"));
        assert_eq!(era_bucket(Some(2026)).as_deref(), Some("misc"));
        assert_eq!(era_bucket(None), None);
    }

    #[test]
    fn lane_key_requires_both_parts() {
        assert_eq!(
            lane_key(Some(1), Some("2015_2024")).as_deref(),
            Some("tier1:2015_2024")
        );
        assert_eq!(lane_key(None, Some("2015_2024")), None);
        assert_eq!(lane_key(Some(2), None), None);
    }

    #[test]
    fn wip_branch_matches_plain_classification() {
        for rank in [None, Some(5), Some(90), Some(500)] {
            for year in [None, Some(1990), Some(1970)] {
                assert_eq!(
                    assign_lane(year, rank, SourceKind::WorkInProgress),
                    assign_lane(year, rank, SourceKind::Reference),
                );
            }
        }
        let wip = assign_lane(Some(2020), None, SourceKind::WorkInProgress);
        assert_eq!(wip.tier, None);
        assert_eq!(wip.era_bucket.as_deref(), Some("2015_2024"));
        assert_eq!(wip.key(), None);
    }

    #[test]
    fn custom_tables_and_validation() {
        let classifier = LaneClassifier::new(
            vec![TierThreshold {
                rank_ceiling: 10,
                tier: 1,
            }],
            vec![EraRange::new(2000, 2009, "aughts")],
        );
        classifier.validate().expect("valid tables");
        assert_eq!(classifier.tier_from_rank(Some(11)), None);
        assert_eq!(classifier.era_bucket(Some(2003)).as_deref(), Some("aughts"));

        let unsorted = LaneClassifier::new(
            vec![
                TierThreshold {
                    rank_ceiling: 100,
                    tier: 2,
                },
                TierThreshold {
                    rank_ceiling: 40,
                    tier: 1,
                },
            ],
            LaneClassifier::default().eras,
        );
        assert!(matches!(
            unsorted.validate(),
            Err(NormsError::Configuration(msg)) if msg.contains("ascending")
        ));
    }

    #[test]
    fn source_kind_uses_wip_label() {
        let parsed: SourceKind = serde_json::from_str("\"wip\"").expect("wip");
        assert_eq!(parsed, SourceKind::WorkInProgress);
    }
}
