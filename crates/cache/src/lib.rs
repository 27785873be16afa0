//! # Content-addressed feature cache
//!
//! Memoizes expensive upstream extraction keyed by *what* was processed
//! (a content hash of the source) and *how* (a configuration fingerprint).
//!
//! ## Key layout
//!
//! ```text
//! key = "{content_hash}-{hex(SHA-256(config_fingerprint))[..12]}"
//! ```
//!
//! The full fingerprint is also stored inside the entry and compared on
//! load, so two configurations never share an entry even on a prefix
//! collision.
//!
//! ## Staleness
//!
//! When a caller supplies the source's current mtime, an entry recorded
//! with a different mtime (beyond [`MTIME_TOLERANCE_SECS`]) or with no mtime
//! at all is reported as [`CacheLookup::Stale`] and treated as a miss.
//! An entry that no longer decodes is a plain miss; the next store
//! overwrites it.
//!
//! ## Backends
//!
//! [`CacheBackend`] is a byte-level capability contract implemented by
//! in-memory, file, noop and (feature `backend-redb`) redb backends. The
//! [`FeatureCache`] facade is identical over all of them.

mod backend;
mod hashing;

#[cfg(feature = "backend-redb")]
pub use backend::RedbBackend;
pub use backend::{CacheBackend, CacheBackendConfig, FileBackend, InMemoryBackend, NoopBackend};
pub use hashing::{content_hash, file_content_hash, source_mtime};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use zstd::{decode_all, encode_all};

/// Bump when the serialized [`CacheEntry`] layout changes.
pub const CACHE_SCHEMA_VERSION: u16 = 1;

/// Two mtimes closer than this are considered equal.
pub const MTIME_TOLERANCE_SECS: f64 = 1e-3;

const FINGERPRINT_PREFIX_LEN: usize = 12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("backend error: {0}")]
    Backend(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("compression error: {0}")]
    Compression(String),
    #[error("io error: {0}")]
    Io(String),
}

impl CacheError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(e: std::io::Error) -> Self {
        CacheError::Io(e.to_string())
    }
}

/// Compression codec applied to serialized entries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CompressionCodec {
    #[default]
    None,
    Zstd,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompressionConfig {
    pub codec: CompressionCodec,
    /// Zstd level, 1-22.
    pub level: i32,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            codec: CompressionCodec::default(),
            level: 3,
        }
    }
}

impl CompressionConfig {
    pub fn zstd(level: i32) -> Self {
        Self {
            codec: CompressionCodec::Zstd,
            level,
        }
    }

    fn compress(&self, data: Vec<u8>) -> Result<Vec<u8>, CacheError> {
        match self.codec {
            CompressionCodec::None => Ok(data),
            CompressionCodec::Zstd => {
                encode_all(data.as_slice(), self.level).map_err(|e| CacheError::Compression(e.to_string()))
            }
        }
    }

    fn decompress(&self, data: Vec<u8>) -> Result<Vec<u8>, CacheError> {
        match self.codec {
            CompressionCodec::None => Ok(data),
            CompressionCodec::Zstd => {
                decode_all(data.as_slice()).map_err(|e| CacheError::Compression(e.to_string()))
            }
        }
    }
}

/// Settings for a [`FeatureCache`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheConfig {
    pub backend: CacheBackendConfig,
    pub compression: CompressionConfig,
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: CacheBackendConfig) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_compression(mut self, compression: CompressionConfig) -> Self {
        self.compression = compression;
        self
    }
}

/// One memoized computation.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CacheEntry {
    #[serde(default = "default_schema_version")]
    pub schema_version: u16,
    pub content_hash: String,
    pub config_fingerprint: String,
    pub payload: Value,
    pub source_mtime: Option<f64>,
    pub stored_at: DateTime<Utc>,
}

const fn default_schema_version() -> u16 {
    CACHE_SCHEMA_VERSION
}

/// Outcome of [`FeatureCache::lookup`].
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CacheEntry),
    Miss,
    /// Key matched but the source changed since the entry was stored.
    Stale {
        stored_mtime: Option<f64>,
        current_mtime: f64,
    },
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }

    /// The payload on a hit; `None` for both miss and stale.
    pub fn into_payload(self) -> Option<Value> {
        match self {
            CacheLookup::Hit(entry) => Some(entry.payload),
            CacheLookup::Miss | CacheLookup::Stale { .. } => None,
        }
    }
}

/// Backend key for `(content_hash, config_fingerprint)`.
pub fn cache_key(content_hash: &str, config_fingerprint: &str) -> String {
    let digest = hex::encode(Sha256::digest(config_fingerprint.as_bytes()));
    format!("{content_hash}-{}", &digest[..FINGERPRINT_PREFIX_LEN])
}

fn mtimes_match(stored: Option<f64>, current: f64) -> bool {
    stored.is_some_and(|stored| (stored - current).abs() <= MTIME_TOLERANCE_SECS)
}

/// Typed facade over a [`CacheBackend`].
pub struct FeatureCache {
    backend: Box<dyn CacheBackend>,
    compression: CompressionConfig,
}

impl FeatureCache {
    pub fn new(config: CacheConfig) -> Result<Self, CacheError> {
        let backend = config.backend.build()?;
        Ok(Self::with_backend(backend, config.compression))
    }

    /// Wrap an existing backend (custom implementations, tests).
    pub fn with_backend(backend: Box<dyn CacheBackend>, compression: CompressionConfig) -> Self {
        Self {
            backend,
            compression,
        }
    }

    pub fn in_memory() -> Self {
        Self::with_backend(Box::new(InMemoryBackend::new()), CompressionConfig::default())
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Look up an entry, applying fingerprint and mtime checks.
    pub fn lookup(
        &self,
        content_hash: &str,
        config_fingerprint: &str,
        current_mtime: Option<f64>,
    ) -> Result<CacheLookup, CacheError> {
        let key = cache_key(content_hash, config_fingerprint);
        let Some(bytes) = self.backend.load(&key)? else {
            return Ok(CacheLookup::Miss);
        };
        let entry = match self.decode(bytes) {
            Ok(entry) => entry,
            // torn write, corruption or a codec change: recompute and overwrite
            Err(err @ (CacheError::Decode(_) | CacheError::Compression(_))) => {
                warn!(key = %key, error = %err, "cache_entry_undecodable");
                return Ok(CacheLookup::Miss);
            }
            Err(err) => return Err(err),
        };

        if entry.content_hash != content_hash || entry.config_fingerprint != config_fingerprint {
            debug!(key = %key, "cache_fingerprint_mismatch");
            return Ok(CacheLookup::Miss);
        }
        if let Some(current) = current_mtime {
            if !mtimes_match(entry.source_mtime, current) {
                debug!(
                    key = %key,
                    stored_mtime = ?entry.source_mtime,
                    current_mtime = current,
                    "cache_stale"
                );
                return Ok(CacheLookup::Stale {
                    stored_mtime: entry.source_mtime,
                    current_mtime: current,
                });
            }
        }
        Ok(CacheLookup::Hit(entry))
    }

    /// Payload on a fresh hit, `None` on miss or staleness.
    pub fn load(
        &self,
        content_hash: &str,
        config_fingerprint: &str,
        current_mtime: Option<f64>,
    ) -> Result<Option<Value>, CacheError> {
        Ok(self
            .lookup(content_hash, config_fingerprint, current_mtime)?
            .into_payload())
    }

    /// Overwrite the entry for this key, stamping the wall-clock store time.
    pub fn store(
        &self,
        content_hash: &str,
        config_fingerprint: &str,
        payload: Value,
        source_mtime: Option<f64>,
    ) -> Result<CacheEntry, CacheError> {
        let entry = CacheEntry {
            schema_version: CACHE_SCHEMA_VERSION,
            content_hash: content_hash.to_string(),
            config_fingerprint: config_fingerprint.to_string(),
            payload,
            source_mtime,
            stored_at: Utc::now(),
        };
        let key = cache_key(content_hash, config_fingerprint);
        let bytes = self.encode(&entry)?;
        self.backend.store(&key, &bytes)?;
        Ok(entry)
    }

    pub fn remove(&self, content_hash: &str, config_fingerprint: &str) -> Result<(), CacheError> {
        self.backend.remove(&cache_key(content_hash, config_fingerprint))
    }

    /// Return the cached value, or run `compute`, store its result and
    /// return it. Stale entries are recomputed.
    pub fn load_or_compute<T, E, F>(
        &self,
        content_hash: &str,
        config_fingerprint: &str,
        current_mtime: Option<f64>,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: From<CacheError>,
        F: FnOnce() -> Result<T, E>,
    {
        if let CacheLookup::Hit(entry) =
            self.lookup(content_hash, config_fingerprint, current_mtime)?
        {
            match serde_json::from_value::<T>(entry.payload) {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(error = %err, content_hash, "cache_payload_type_mismatch");
                }
            }
        }

        let value = compute()?;
        let payload =
            serde_json::to_value(&value).map_err(|e| CacheError::Encode(e.to_string()))?;
        self.store(content_hash, config_fingerprint, payload, current_mtime)?;
        Ok(value)
    }

    /// Sweep backend debris and drop entries that no longer decode.
    pub fn gc(&self) -> Result<usize, CacheError> {
        let mut removed = self.backend.gc()?;
        for key in self.backend.keys()? {
            let Some(bytes) = self.backend.load(&key)? else {
                continue;
            };
            if self.decode(bytes).is_err() {
                self.backend.remove(&key)?;
                removed += 1;
            }
        }
        debug!(backend = self.backend.name(), removed, "cache_gc");
        Ok(removed)
    }

    fn encode(&self, entry: &CacheEntry) -> Result<Vec<u8>, CacheError> {
        let bytes = serde_json::to_vec(entry).map_err(|e| CacheError::Encode(e.to_string()))?;
        self.compression.compress(bytes)
    }

    fn decode(&self, bytes: Vec<u8>) -> Result<CacheEntry, CacheError> {
        let bytes = self.compression.decompress(bytes)?;
        serde_json::from_slice(&bytes).map_err(|e| CacheError::Decode(e.to_string()))
    }
}
