//! # Reference cohort similarity index
//!
//! Finds the reference tracks closest to a query feature vector (the
//! "historical echo"). The index is built once per cohort snapshot from
//! `(id, vector)` pairs and is read-only afterwards, so one instance can be
//! shared behind an `Arc` by any number of concurrent queries.
//!
//! ## Ranking rules
//!
//! - Cosine similarity is `1 - cosine_distance`; Euclidean and Manhattan map
//!   distance `d` to `1 / (1 + d)`.
//! - Results are sorted by similarity, descending. Ties keep insertion order.
//! - When `k` is not given, `clamp(round(sqrt(N)), 8, 64)` is used; at most
//!   `N` results are ever returned.
//!
//! ## Example
//!
//! ```
//! use index::{IndexConfig, Metric, SimilarityIndex};
//!
//! let index = SimilarityIndex::build(
//!     vec![
//!         ("ref-a", vec![1.0, 0.0]),
//!         ("ref-b", vec![0.0, 1.0]),
//!     ],
//!     IndexConfig::default(),
//! )
//! .unwrap();
//!
//! let hits = index.query(&[0.9, 0.1], Some(1), Some(Metric::Cosine)).unwrap();
//! assert_eq!(hits[0].id, "ref-a");
//! ```

pub mod ann;
mod metric;

pub use ann::AnnConfig;
pub use metric::Metric;

use ann::AnnIndex;
use hashbrown::HashMap;
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Lower bound of the default neighbour count.
pub const MIN_DEFAULT_K: usize = 8;
/// Upper bound of the default neighbour count.
pub const MAX_DEFAULT_K: usize = 64;

/// `clamp(round(sqrt(n)), 8, 64)`.
pub fn default_k(n: usize) -> usize {
    ((n as f64).sqrt().round() as usize).clamp(MIN_DEFAULT_K, MAX_DEFAULT_K)
}

/// Index construction settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Metric used when a query does not name one.
    #[serde(default)]
    pub metric: Metric,
    /// Neighbour count used when a query does not give one. `None` means the
    /// `sqrt(N)` rule.
    #[serde(default)]
    pub default_k: Option<usize>,
    /// Optional HNSW candidate stage (cosine only).
    #[serde(default)]
    pub ann: AnnConfig,
}

impl IndexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = Some(k);
        self
    }

    pub fn with_ann(mut self, ann: AnnConfig) -> Self {
        self.ann = ann;
        self
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.default_k == Some(0) {
            return Err(IndexError::invalid("default_k must be greater than zero"));
        }
        self.ann.validate()
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IndexError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl IndexError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        IndexError::InvalidInput(msg.into())
    }
}

/// One ranked reference track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub id: String,
    /// Higher is closer.
    pub similarity: f64,
    pub distance: f64,
}

/// Read-only nearest-neighbour index over a reference cohort.
pub struct SimilarityIndex {
    ids: Vec<String>,
    positions: HashMap<String, usize>,
    matrix: Array2<f32>,
    config: IndexConfig,
    ann: Option<AnnIndex>,
}

impl std::fmt::Debug for SimilarityIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimilarityIndex")
            .field("len", &self.ids.len())
            .field("dimension", &self.matrix.ncols())
            .field("config", &self.config)
            .field("ann", &self.ann.is_some())
            .finish()
    }
}

impl SimilarityIndex {
    /// Build from `(id, vector)` pairs in insertion order.
    ///
    /// Fails on an empty cohort, a zero-length or ragged vector, a non-finite
    /// component, or a duplicate id.
    pub fn build<I, S>(entries: I, config: IndexConfig) -> Result<Self, IndexError>
    where
        I: IntoIterator<Item = (S, Vec<f32>)>,
        S: Into<String>,
    {
        config.validate()?;

        let mut ids = Vec::new();
        let mut positions = HashMap::new();
        let mut flat: Vec<f32> = Vec::new();
        let mut dimension: Option<usize> = None;

        for (id, vector) in entries {
            let id = id.into();
            let dim = *dimension.get_or_insert(vector.len());
            if dim == 0 {
                return Err(IndexError::invalid("reference vectors must not be empty"));
            }
            if vector.len() != dim {
                return Err(IndexError::invalid(format!(
                    "reference '{id}' has dimension {}, expected {dim}",
                    vector.len()
                )));
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(IndexError::invalid(format!(
                    "reference '{id}' contains a non-finite value"
                )));
            }
            if positions.insert(id.clone(), ids.len()).is_some() {
                return Err(IndexError::invalid(format!("duplicate reference id '{id}'")));
            }
            ids.push(id);
            flat.extend_from_slice(&vector);
        }

        let Some(dimension) = dimension else {
            return Err(IndexError::invalid("reference cohort is empty"));
        };
        let matrix = Array2::from_shape_vec((ids.len(), dimension), flat)
            .map_err(|e| IndexError::invalid(e.to_string()))?;
        let ann = AnnIndex::build(&matrix, config.ann);

        debug!(
            len = ids.len(),
            dimension,
            ann = ann.is_some(),
            "similarity_index_built"
        );

        Ok(Self {
            ids,
            positions,
            matrix,
            config,
            ann,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Always false: an empty cohort cannot be built.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    pub fn vector(&self, id: &str) -> Option<ArrayView1<'_, f32>> {
        self.positions.get(id).map(|&row| self.matrix.row(row))
    }

    /// Neighbour count used when a query passes `k = None`.
    pub fn default_k(&self) -> usize {
        self.config.default_k.unwrap_or_else(|| default_k(self.len()))
    }

    /// Up to `k` nearest references, best first.
    pub fn query(
        &self,
        vector: &[f32],
        k: Option<usize>,
        metric: Option<Metric>,
    ) -> Result<Vec<Neighbor>, IndexError> {
        self.ranked(vector, k, metric, None)
    }

    /// Like [`query`](Self::query) but never returns `exclude_id`.
    pub fn query_excluding(
        &self,
        vector: &[f32],
        k: Option<usize>,
        metric: Option<Metric>,
        exclude_id: &str,
    ) -> Result<Vec<Neighbor>, IndexError> {
        let exclude = self.positions.get(exclude_id).copied();
        self.ranked(vector, k, metric, exclude)
    }

    /// Neighbours of a reference already in the cohort, excluding itself.
    pub fn query_by_id(
        &self,
        id: &str,
        k: Option<usize>,
        metric: Option<Metric>,
    ) -> Result<Vec<Neighbor>, IndexError> {
        let row = self
            .positions
            .get(id)
            .copied()
            .ok_or_else(|| IndexError::invalid(format!("unknown reference id '{id}'")))?;
        let vector = self.matrix.row(row).to_vec();
        self.ranked(&vector, k, metric, Some(row))
    }

    /// Run independent queries in parallel. Output order matches input order.
    pub fn query_batch(
        &self,
        vectors: &[Vec<f32>],
        k: Option<usize>,
        metric: Option<Metric>,
    ) -> Result<Vec<Vec<Neighbor>>, IndexError> {
        vectors
            .par_iter()
            .map(|vector| self.ranked(vector, k, metric, None))
            .collect()
    }

    fn ranked(
        &self,
        vector: &[f32],
        k: Option<usize>,
        metric: Option<Metric>,
        exclude: Option<usize>,
    ) -> Result<Vec<Neighbor>, IndexError> {
        let k = match k {
            Some(0) => return Err(IndexError::invalid("k must be greater than zero")),
            Some(k) => k,
            None => self.default_k(),
        };
        if vector.len() != self.dimension() {
            return Err(IndexError::invalid(format!(
                "query has dimension {}, expected {}",
                vector.len(),
                self.dimension()
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(IndexError::invalid("query contains a non-finite value"));
        }
        let metric = metric.unwrap_or(self.config.metric);
        let query = ArrayView1::from(vector);

        let mut rows: Vec<usize> = match (&self.ann, metric) {
            (Some(ann), Metric::Cosine) => {
                let mut rows = ann.candidates(vector, k + usize::from(exclude.is_some()));
                // candidates arrive in graph order; restore insertion order
                rows.sort_unstable();
                rows.dedup();
                rows
            }
            _ => (0..self.len()).collect(),
        };
        if let Some(skip) = exclude {
            rows.retain(|&row| row != skip);
        }

        let mut scored: Vec<(usize, f64, f64)> = rows
            .into_iter()
            .map(|row| {
                let distance = metric.distance(query, self.matrix.row(row));
                (row, metric.similarity(distance), distance)
            })
            .collect();

        // Stable: equal similarities keep insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(row, similarity, distance)| Neighbor {
                id: self.ids[row].clone(),
                similarity,
                distance,
            })
            .collect())
    }
}
