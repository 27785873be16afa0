use crate::CacheError;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

/// Byte-level storage for cache entries.
///
/// Every `store` must be atomic from a reader's point of view: a concurrent
/// `load` sees either the previous value or the new one, never a mix.
pub trait CacheBackend: Send + Sync {
    /// Read the bytes stored under `key`.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    /// Replace whatever is stored under `key`.
    fn store(&self, key: &str, value: &[u8]) -> Result<(), CacheError>;
    /// Remove `key` if present.
    fn remove(&self, key: &str) -> Result<(), CacheError>;
    /// Every key currently stored.
    fn keys(&self) -> Result<Vec<String>, CacheError>;
    /// Remove backend-level debris (e.g. abandoned temp files). Returns the
    /// number of items removed.
    fn gc(&self) -> Result<usize, CacheError> {
        Ok(0)
    }
    /// Short label for logs.
    fn name(&self) -> &'static str;
}

/// Configuration for selecting and building a backend.
///
/// ```
/// use cache::CacheBackendConfig;
///
/// let memory = CacheBackendConfig::in_memory();
/// let files = CacheBackendConfig::file("/var/cache/advisor");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum CacheBackendConfig {
    /// Process-local map. Lost on exit.
    #[default]
    InMemory,
    /// One JSON file per entry under `dir`, written via temp file + rename.
    File { dir: PathBuf },
    /// Never stores anything; every lookup misses.
    Noop,
    /// Redb database at `path`. Requires the `backend-redb` feature.
    Redb { path: PathBuf },
}

impl CacheBackendConfig {
    pub fn in_memory() -> Self {
        CacheBackendConfig::InMemory
    }

    pub fn file<P: Into<PathBuf>>(dir: P) -> Self {
        CacheBackendConfig::File { dir: dir.into() }
    }

    pub fn noop() -> Self {
        CacheBackendConfig::Noop
    }

    pub fn redb<P: Into<PathBuf>>(path: P) -> Self {
        CacheBackendConfig::Redb { path: path.into() }
    }

    /// Build the configured backend.
    pub fn build(&self) -> Result<Box<dyn CacheBackend>, CacheError> {
        match self {
            CacheBackendConfig::InMemory => Ok(Box::new(InMemoryBackend::new())),
            CacheBackendConfig::File { dir } => Ok(Box::new(FileBackend::open(dir)?)),
            CacheBackendConfig::Noop => Ok(Box::new(NoopBackend)),
            CacheBackendConfig::Redb { path } => {
                #[cfg(feature = "backend-redb")]
                {
                    Ok(Box::new(RedbBackend::open(path)?))
                }
                #[cfg(not(feature = "backend-redb"))]
                {
                    let _ = path;
                    Err(CacheError::backend("redb backend disabled at compile time"))
                }
            }
        }
    }
}

/// An in-memory backend using a `RwLock` around a `HashMap`.
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheBackend for InMemoryBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| CacheError::backend("poisoned lock"))?;
        Ok(guard.get(key).cloned())
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        // Whole-value replace under one write lock.
        self.entries
            .write()
            .map_err(|_| CacheError::backend("poisoned lock"))?
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .map_err(|_| CacheError::backend("poisoned lock"))?
            .remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let guard = self
            .entries
            .read()
            .map_err(|_| CacheError::backend("poisoned lock"))?;
        Ok(guard.keys().cloned().collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Backend that stores nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBackend;

impl CacheBackend for NoopBackend {
    fn load(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(None)
    }

    fn store(&self, _key: &str, _value: &[u8]) -> Result<(), CacheError> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(Vec::new())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

mod file;
pub use file::FileBackend;

#[cfg(feature = "backend-redb")]
pub mod redb;

#[cfg(feature = "backend-redb")]
pub use self::redb::RedbBackend;
