use index::Neighbor;
use serde::{Deserialize, Serialize};

const VERY_CLOSE_AT: f64 = 0.625;
const MODERATELY_CLOSE_AT: f64 = 0.5;

/// Reading of the closest reference track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEcho {
    pub available: bool,
    pub top_neighbor: Option<Neighbor>,
    pub similarity_label: Option<String>,
    pub comment: String,
}

/// Label for a similarity in `[0, 1]`, higher meaning closer.
pub fn similarity_label(similarity: f64) -> &'static str {
    if similarity >= VERY_CLOSE_AT {
        "very close echo"
    } else if similarity >= MODERATELY_CLOSE_AT {
        "moderately close echo"
    } else {
        "looser echo / unique"
    }
}

impl HistoricalEcho {
    /// `neighbors` is expected best-first, as returned by the index.
    pub fn from_neighbors(neighbors: &[Neighbor]) -> Self {
        let Some(top) = neighbors.first() else {
            return Self {
                available: false,
                top_neighbor: None,
                similarity_label: None,
                comment: "No historical echo neighbours available.".to_string(),
            };
        };
        let label = similarity_label(top.similarity);
        Self {
            available: true,
            top_neighbor: Some(top.clone()),
            similarity_label: Some(label.to_string()),
            comment: format!(
                "Closest reference: {} (similarity {:.3}), {label}; {} neighbour(s) retrieved.",
                top.id,
                top.similarity,
                neighbors.len()
            ),
        }
    }
}
