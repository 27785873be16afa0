//! Directory-per-cache backend.
//!
//! Each entry is `{dir}/{key}.entry`. Writes go to a sibling temp file that
//! is renamed over the destination, so readers never observe a partial
//! entry. Temp files left behind by a crash are swept by `gc`.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::Builder;
use tracing::debug;

use crate::{CacheBackend, CacheError};

const ENTRY_EXT: &str = "entry";
const TEMP_SUFFIX: &str = ".tmp";

pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    /// Open (creating if needed) a cache directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, CacheError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> Result<PathBuf, CacheError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.{ENTRY_EXT}")))
    }
}

/// Keys become file names, so only a conservative alphabet is accepted.
fn validate_key(key: &str) -> Result<(), CacheError> {
    let ok = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(CacheError::backend(format!("invalid cache key '{key}'")))
    }
}

impl CacheBackend for FileBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let path = self.entry_path(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        let mut tmp = Builder::new()
            .prefix(".")
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.dir)?;
        tmp.write_all(value)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| CacheError::Io(e.error.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let path = self.entry_path(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn gc(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let is_temp = name
                .to_str()
                .is_some_and(|n| n.starts_with('.') && n.ends_with(TEMP_SUFFIX));
            if is_temp && entry.file_type()?.is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(dir = %self.dir.display(), removed, "cache_temp_files_removed");
        }
        Ok(removed)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn store_load_remove_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let backend = FileBackend::open(dir.path()).expect("open");
        assert_eq!(backend.load("k1").expect("load"), None);

        backend.store("k1", b"first").expect("store");
        backend.store("k1", b"second").expect("overwrite");
        assert_eq!(backend.load("k1").expect("load"), Some(b"second".to_vec()));
        assert_eq!(backend.keys().expect("keys"), vec!["k1".to_string()]);

        backend.remove("k1").expect("remove");
        backend.remove("k1").expect("remove twice");
        assert_eq!(backend.load("k1").expect("load"), None);
    }

    #[test]
    fn rejects_path_like_keys() {
        let dir = TempDir::new().expect("tempdir");
        let backend = FileBackend::open(dir.path()).expect("open");
        for key in ["../escape", "a/b", "", ".hidden"] {
            assert!(backend.store(key, b"x").is_err(), "{key:?}");
        }
    }

    #[test]
    fn gc_sweeps_abandoned_temp_files() {
        let dir = TempDir::new().expect("tempdir");
        let backend = FileBackend::open(dir.path()).expect("open");
        backend.store("keep", b"v").expect("store");
        fs::write(dir.path().join(".abc123.tmp"), b"torn").expect("write temp");

        assert_eq!(backend.gc().expect("gc"), 1);
        assert_eq!(backend.keys().expect("keys"), vec!["keep".to_string()]);
        assert_eq!(backend.gc().expect("gc again"), 0);
    }
}
