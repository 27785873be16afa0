//! YAML configuration for the advisory pipeline.
//!
//! One file carries the scoring policy, the lane tables, where norms
//! snapshots live, how the reference index queries, and which cache backend
//! to use. Every section is optional and falls back to the library defaults.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "us-hot100"
//!
//! policy:
//!   score_cap: 0.58
//!   timing_confidence_gate: 0.6
//!   lift_window_duration: 6.0
//!   lane_id: "advisory"
//!   reproducibility_seeds: [7, 11]
//!   emit_diagnostics: false
//!   axis_level_threshold: 0.5
//!   commentary:
//!     caps_note: "Cap reflects the ceiling observed for archetypal hits."
//!
//! lanes:
//!   tiers:
//!     - { rank_ceiling: 40, tier: 1 }
//!     - { rank_ceiling: 100, tier: 2 }
//!   eras:
//!     - { start: 2015, end: 2024, label: "2015_2024" }
//!
//! norms:
//!   dir: "/srv/advisor/norms"
//!   region: "US"
//!   tier: "Hot100"
//!   version: "latest"
//!
//! index:
//!   metric: "cosine"
//!   default_k: 10
//!   ann:
//!     enabled: false
//!     oversample_factor: 4
//!
//! cache:
//!   backend: "file"
//!   path: "/var/cache/advisor"
//!   compression: "zstd"
//!   level: 3
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use cache::{CacheBackendConfig, CacheConfig, CompressionCodec, CompressionConfig};
use index::{AnnConfig, IndexConfig, Metric};
use norms::{EraRange, LATEST_VERSION, LaneClassifier, SnapshotLoader, TierThreshold};
use policy::ScoringPolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::NormsSource;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),

    #[error("missing required field: {0}")]
    MissingField(String),
}

/// Top-level YAML configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdvisorConfig {
    /// Configuration format version
    pub version: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub policy: ScoringPolicy,

    #[serde(default)]
    pub lanes: LanesYamlConfig,

    #[serde(default)]
    pub norms: Option<NormsYamlConfig>,

    #[serde(default)]
    pub index: IndexYamlConfig,

    #[serde(default)]
    pub cache: CacheYamlConfig,
}

impl AdvisorConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: AdvisorConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.policy
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("policy: {e}")))?;
        self.lanes.validate()?;
        if let Some(norms) = &self.norms {
            norms.validate()?;
        }
        self.index.validate()?;
        self.cache.validate()?;
        Ok(())
    }

    pub fn to_policy(&self) -> Result<ScoringPolicy, ConfigLoadError> {
        self.policy
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("policy: {e}")))?;
        Ok(self.policy.clone())
    }

    pub fn to_lane_classifier(&self) -> Result<LaneClassifier, ConfigLoadError> {
        self.lanes.to_lane_classifier()
    }

    pub fn to_index_config(&self) -> Result<IndexConfig, ConfigLoadError> {
        self.index.to_index_config()
    }

    pub fn to_cache_config(&self) -> Result<CacheConfig, ConfigLoadError> {
        self.cache.to_cache_config()
    }

    /// The `norms` section, which is the only one without defaults.
    pub fn norms(&self) -> Result<&NormsYamlConfig, ConfigLoadError> {
        self.norms
            .as_ref()
            .ok_or_else(|| ConfigLoadError::MissingField("norms".to_string()))
    }
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            policy: ScoringPolicy::default(),
            lanes: LanesYamlConfig::default(),
            norms: None,
            index: IndexYamlConfig::default(),
            cache: CacheYamlConfig::default(),
        }
    }
}

/// Lane tables. Omitted lists keep the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanesYamlConfig {
    #[serde(default = "default_tiers")]
    pub tiers: Vec<TierThreshold>,

    #[serde(default = "default_eras")]
    pub eras: Vec<EraRange>,
}

impl LanesYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.to_lane_classifier().map(|_| ())
    }

    pub fn to_lane_classifier(&self) -> Result<LaneClassifier, ConfigLoadError> {
        let classifier = LaneClassifier::new(self.tiers.clone(), self.eras.clone());
        classifier
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("lanes: {e}")))?;
        Ok(classifier)
    }
}

impl Default for LanesYamlConfig {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            eras: default_eras(),
        }
    }
}

/// Where to find norms snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormsYamlConfig {
    pub dir: PathBuf,
    pub region: String,
    pub tier: String,

    #[serde(default = "default_norms_version")]
    pub version: String,
}

impl NormsYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        for (field, value) in [
            ("region", &self.region),
            ("tier", &self.tier),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigLoadError::MissingField(format!("norms.{field}")));
            }
        }
        Ok(())
    }

    pub fn loader(&self) -> SnapshotLoader {
        SnapshotLoader::new(&self.dir)
    }

    pub fn to_norms_source(&self) -> NormsSource {
        NormsSource::new(self.loader(), &self.region, &self.tier, &self.version)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnYamlConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_ann_m")]
    pub m: usize,

    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    #[serde(default = "default_ef_search")]
    pub ef_search: usize,

    #[serde(default = "default_oversample_factor")]
    pub oversample_factor: usize,

    #[serde(default = "default_min_vectors_for_ann")]
    pub min_vectors_for_ann: usize,
}

impl Default for AnnYamlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            m: default_ann_m(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
            oversample_factor: default_oversample_factor(),
            min_vectors_for_ann: default_min_vectors_for_ann(),
        }
    }
}

/// Reference index query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexYamlConfig {
    #[serde(default = "default_metric")]
    pub metric: String,

    #[serde(default)]
    pub default_k: Option<usize>,

    #[serde(default)]
    pub ann: AnnYamlConfig,
}

impl IndexYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.to_index_config().map(|_| ())
    }

    pub fn to_index_config(&self) -> Result<IndexConfig, ConfigLoadError> {
        let metric: Metric = self
            .metric
            .parse()
            .map_err(|e| ConfigLoadError::Validation(format!("index.metric: {e}")))?;
        let ann = AnnConfig::default()
            .with_enabled(self.ann.enabled)
            .with_m(self.ann.m)
            .with_ef_construction(self.ann.ef_construction)
            .with_ef_search(self.ann.ef_search)
            .with_oversample_factor(self.ann.oversample_factor)
            .with_min_vectors_for_ann(self.ann.min_vectors_for_ann);
        let mut config = IndexConfig::new().with_metric(metric).with_ann(ann);
        if let Some(k) = self.default_k {
            config = config.with_default_k(k);
        }
        config
            .validate()
            .map_err(|e| ConfigLoadError::Validation(format!("index: {e}")))?;
        Ok(config)
    }
}

impl Default for IndexYamlConfig {
    fn default() -> Self {
        Self {
            metric: default_metric(),
            default_k: None,
            ann: AnnYamlConfig::default(),
        }
    }
}

/// Feature cache backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheYamlConfig {
    #[serde(default = "default_cache_backend")]
    pub backend: String,

    /// Directory for `file`, database path for `redb`.
    #[serde(default)]
    pub path: Option<PathBuf>,

    #[serde(default = "default_compression")]
    pub compression: String,

    #[serde(default = "default_compression_level")]
    pub level: i32,
}

impl CacheYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        self.to_cache_config().map(|_| ())
    }

    pub fn to_cache_config(&self) -> Result<CacheConfig, ConfigLoadError> {
        let backend = match self.backend.as_str() {
            "memory" | "in_memory" => CacheBackendConfig::in_memory(),
            "noop" => CacheBackendConfig::noop(),
            "file" => CacheBackendConfig::file(self.required_path()?),
            "redb" => CacheBackendConfig::redb(self.required_path()?),
            other => {
                return Err(ConfigLoadError::Validation(format!(
                    "cache.backend must be one of memory, file, noop, redb; got '{other}'"
                )));
            }
        };
        let codec = match self.compression.as_str() {
            "none" => CompressionCodec::None,
            "zstd" => CompressionCodec::Zstd,
            other => {
                return Err(ConfigLoadError::Validation(format!(
                    "cache.compression must be 'none' or 'zstd'; got '{other}'"
                )));
            }
        };
        if !(1..=22).contains(&self.level) {
            return Err(ConfigLoadError::Validation(
                "cache.level must be within 1..=22".to_string(),
            ));
        }
        Ok(CacheConfig::new()
            .with_backend(backend)
            .with_compression(CompressionConfig {
                codec,
                level: self.level,
            }))
    }

    fn required_path(&self) -> Result<PathBuf, ConfigLoadError> {
        self.path
            .clone()
            .ok_or_else(|| ConfigLoadError::MissingField(format!("cache.path ({})", self.backend)))
    }
}

impl Default for CacheYamlConfig {
    fn default() -> Self {
        Self {
            backend: default_cache_backend(),
            path: None,
            compression: default_compression(),
            level: default_compression_level(),
        }
    }
}

// Helper functions for serde defaults
fn default_tiers() -> Vec<TierThreshold> {
    LaneClassifier::default().tiers
}
fn default_eras() -> Vec<EraRange> {
    LaneClassifier::default().eras
}
fn default_norms_version() -> String {
    LATEST_VERSION.to_string()
}
fn default_metric() -> String {
    Metric::default().as_str().to_string()
}
fn default_ann_m() -> usize {
    AnnConfig::default().m
}
fn default_ef_construction() -> usize {
    AnnConfig::default().ef_construction
}
fn default_ef_search() -> usize {
    AnnConfig::default().ef_search
}
fn default_oversample_factor() -> usize {
    AnnConfig::default().oversample_factor
}
fn default_min_vectors_for_ann() -> usize {
    AnnConfig::default().min_vectors_for_ann
}
fn default_cache_backend() -> String {
    "memory".to_string()
}
fn default_compression() -> String {
    "none".to_string()
}
fn default_compression_level() -> i32 {
    3
}
