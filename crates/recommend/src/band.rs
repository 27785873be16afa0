use serde::{Deserialize, Serialize};
use std::fmt;

const EXPERIMENTAL_BELOW: f64 = 0.3;
const DEVELOPING_BELOW: f64 = 0.6;
const STRONG_BELOW: f64 = 0.85;

/// Qualitative bucket for the capped composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    Unknown,
    Experimental,
    Developing,
    Strong,
    Apex,
}

impl ScoreBand {
    /// Lower edges are inclusive: `0.3` is `developing`, `0.85` is `apex`.
    pub fn classify(score: Option<f64>) -> Self {
        match score {
            None => ScoreBand::Unknown,
            Some(s) if s.is_nan() => ScoreBand::Unknown,
            Some(s) if s < EXPERIMENTAL_BELOW => ScoreBand::Experimental,
            Some(s) if s < DEVELOPING_BELOW => ScoreBand::Developing,
            Some(s) if s < STRONG_BELOW => ScoreBand::Strong,
            Some(_) => ScoreBand::Apex,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ScoreBand::Unknown => "unknown",
            ScoreBand::Experimental => "experimental",
            ScoreBand::Developing => "developing",
            ScoreBand::Strong => "strong",
            ScoreBand::Apex => "apex",
        }
    }

    /// Experimental or developing: the lane-choice strategy applies.
    pub fn is_emerging(self) -> bool {
        matches!(self, ScoreBand::Experimental | ScoreBand::Developing)
    }

    /// One-line strategic reading of the band.
    pub fn narrative(self) -> &'static str {
        match self {
            ScoreBand::Experimental => {
                "Experimental/off-norm; decide whether to lean niche or adjust core axes toward norms."
            }
            ScoreBand::Developing => {
                "Developing/mixed; some axes align, others diverge. Choose lane: niche vs gradual norm alignment."
            }
            ScoreBand::Strong => {
                "Strong alignment; focus on mix clarity, vocals, and transitions rather than big structural changes."
            }
            ScoreBand::Apex => {
                "Apex alignment; keep polish high, avoid over-cooking dynamics, and refine transitions/vocals."
            }
            ScoreBand::Unknown => {
                "No composite score provided; you can still act on axes, norms and historical echo if available."
            }
        }
    }

    /// Band sentence quoting the score.
    pub fn comment(self, score: Option<f64>) -> String {
        match (self, score) {
            (ScoreBand::Experimental, Some(score)) => format!(
                "Score ≈ {score:.2} is experimental/off-norm; audio DNA diverges from typical hit archetypes."
            ),
            (ScoreBand::Developing, Some(score)) => {
                format!("Score ≈ {score:.2} is developing/mixed; some axes align, others diverge.")
            }
            (ScoreBand::Strong, Some(score)) => {
                format!("Score ≈ {score:.2} is strong; good alignment with long-running hit DNA.")
            }
            (ScoreBand::Apex, Some(score)) => format!(
                "Score ≈ {score:.2} is apex; very strong alignment with proven archetypes (not predictive)."
            ),
            _ => "No composite score provided; cannot position in bands.".to_string(),
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documented_examples() {
        assert_eq!(ScoreBand::classify(None), ScoreBand::Unknown);
        assert_eq!(ScoreBand::classify(Some(0.2)), ScoreBand::Experimental);
        assert_eq!(ScoreBand::classify(Some(0.5)), ScoreBand::Developing);
        assert_eq!(ScoreBand::classify(Some(0.75)), ScoreBand::Strong);
        assert_eq!(ScoreBand::classify(Some(0.95)), ScoreBand::Apex);
    }

    #[test]
    fn lower_edges_are_inclusive() {
        assert_eq!(ScoreBand::classify(Some(0.3)), ScoreBand::Developing);
        assert_eq!(ScoreBand::classify(Some(0.6)), ScoreBand::Strong);
        assert_eq!(ScoreBand::classify(Some(0.85)), ScoreBand::Apex);
        assert_eq!(ScoreBand::classify(Some(0.58)), ScoreBand::Developing);
    }

    #[test]
    fn comment_quotes_score() {
        let comment = ScoreBand::Developing.comment(Some(0.58));
        assert!(comment.contains("0.58"), "{comment}");
        assert!(ScoreBand::Unknown.comment(None).contains("No composite score"));
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&ScoreBand::Developing).expect("serialize");
        assert_eq!(json, "\"developing\"");
    }
}
