//! HNSW candidate generation for large cosine cohorts.
//!
//! The graph only proposes candidates. Every candidate is re-scored exactly
//! by [`crate::SimilarityIndex`] and ordered with the same stable rule as a
//! full scan, so enabling ANN can lose neighbours (recall < 100%) but never
//! reorders the ones it finds.
//!
//! ## When to enable
//!
//! - cohorts well above `min_vectors_for_ann` (default 1000)
//! - callers that accept approximate recall
//!
//! Off by default: the exact scan is the reproducible path.

use hnsw_rs::prelude::*;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::IndexError;

/// Configuration for the HNSW candidate stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnConfig {
    /// Neighbours per graph node. Default: 16
    pub m: usize,
    /// Candidate list size while building. Default: 200
    pub ef_construction: usize,
    /// Candidate list size while searching. Default: 50
    pub ef_search: usize,
    /// Candidates fetched per requested neighbour. Default: 4
    pub oversample_factor: usize,
    /// Whether the graph is built at all. Default: false
    pub enabled: bool,
    /// Below this cohort size the exact scan is used even if enabled.
    /// Default: 1000
    pub min_vectors_for_ann: usize,
}

impl Default for AnnConfig {
    fn default() -> Self {
        Self {
            m: 16,
            ef_construction: 200,
            ef_search: 50,
            oversample_factor: 4,
            enabled: false,
            min_vectors_for_ann: 1000,
        }
    }
}

impl AnnConfig {
    pub fn with_m(mut self, m: usize) -> Self {
        self.m = m;
        self
    }

    pub fn with_ef_construction(mut self, ef: usize) -> Self {
        self.ef_construction = ef;
        self
    }

    pub fn with_ef_search(mut self, ef: usize) -> Self {
        self.ef_search = ef;
        self
    }

    pub fn with_oversample_factor(mut self, factor: usize) -> Self {
        self.oversample_factor = factor;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_min_vectors_for_ann(mut self, min: usize) -> Self {
        self.min_vectors_for_ann = min;
        self
    }

    /// Check if ANN should be used given the cohort size.
    pub fn should_use_ann(&self, num_vectors: usize) -> bool {
        self.enabled && num_vectors >= self.min_vectors_for_ann
    }

    pub fn validate(&self) -> Result<(), IndexError> {
        if self.m == 0 || self.ef_construction == 0 || self.ef_search == 0 {
            return Err(IndexError::invalid(
                "ann m, ef_construction and ef_search must be greater than zero",
            ));
        }
        if self.oversample_factor == 0 {
            return Err(IndexError::invalid(
                "ann oversample_factor must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// HNSW graph over the rows of a reference matrix.
pub(crate) struct AnnIndex {
    config: AnnConfig,
    hnsw: Hnsw<'static, f32, DistCosine>,
    len: usize,
}

impl AnnIndex {
    /// Build a graph over every row. Returns `None` when the config or cohort
    /// size says the exact scan should be used instead.
    pub(crate) fn build(matrix: &Array2<f32>, config: AnnConfig) -> Option<Self> {
        let nb_elem = matrix.nrows();
        if !config.should_use_ann(nb_elem) {
            return None;
        }

        let nb_layer = 16.min((nb_elem as f32).ln().trunc().max(1.0) as usize);
        let hnsw = Hnsw::<f32, DistCosine>::new(
            config.m,
            nb_elem,
            nb_layer,
            config.ef_construction,
            DistCosine {},
        );

        // parallel_insert wants &[(&Vec<f32>, usize)]
        let rows: Vec<Vec<f32>> = matrix.rows().into_iter().map(|row| row.to_vec()).collect();
        let data: Vec<(&Vec<f32>, usize)> = rows.iter().enumerate().map(|(i, v)| (v, i)).collect();
        hnsw.parallel_insert(&data);

        Some(Self {
            config,
            hnsw,
            len: nb_elem,
        })
    }

    /// Row indices of up to `k * oversample_factor` approximate neighbours.
    pub(crate) fn candidates(&self, query: &[f32], k: usize) -> Vec<usize> {
        let wanted = k
            .saturating_mul(self.config.oversample_factor)
            .max(k)
            .min(self.len);
        let ef = self.config.ef_search.max(wanted);
        self.hnsw
            .search(query, wanted, ef)
            .into_iter()
            .map(|neighbour| neighbour.get_origin_id())
            .filter(|&row| row < self.len)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_ann_off() {
        let config = AnnConfig::default();
        assert_eq!(config.m, 16);
        assert_eq!(config.ef_construction, 200);
        assert_eq!(config.ef_search, 50);
        assert!(!config.enabled);
        assert!(!config.should_use_ann(1_000_000));
    }

    #[test]
    fn builder_and_threshold() {
        let config = AnnConfig::default()
            .with_enabled(true)
            .with_min_vectors_for_ann(500)
            .with_m(32)
            .with_ef_search(80);
        assert_eq!(config.m, 32);
        assert_eq!(config.ef_search, 80);
        assert!(config.should_use_ann(500));
        assert!(!config.should_use_ann(499));
        config.validate().expect("valid");
        assert!(matches!(
            config.with_oversample_factor(0).validate(),
            Err(IndexError::InvalidInput(msg)) if msg.contains("oversample_factor")
        ));
    }

    #[test]
    fn small_cohort_skips_graph() {
        let matrix = Array2::<f32>::zeros((10, 4));
        let config = AnnConfig::default().with_enabled(true);
        assert!(AnnIndex::build(&matrix, config).is_none());
    }

    #[test]
    fn graph_proposes_the_exact_match() {
        let n = 64;
        let mut matrix = Array2::<f32>::zeros((n, 3));
        for (i, mut row) in matrix.rows_mut().into_iter().enumerate() {
            let angle = i as f32 * 0.05;
            row[0] = angle.cos();
            row[1] = angle.sin();
            row[2] = 0.1;
        }
        let config = AnnConfig::default()
            .with_enabled(true)
            .with_min_vectors_for_ann(16);
        let ann = AnnIndex::build(&matrix, config).expect("graph built");
        let query = matrix.row(10).to_vec();
        let candidates = ann.candidates(&query, 3);
        assert!(!candidates.is_empty());
        assert!(candidates.len() <= 12);
        assert!(candidates.contains(&10));
    }
}
