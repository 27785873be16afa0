//! Redb-backed cache storage.
//!
//! Every store runs in its own write transaction, which gives the atomic
//! replace the cache contract needs without any extra locking here.
//!
//! ```yaml
//! cache:
//!   backend: "redb"
//!   path: "/var/cache/advisor/features.redb"
//! ```

use crate::{CacheBackend, CacheError};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

const ENTRIES: TableDefinition<&str, &[u8]> = TableDefinition::new("advisor_cache_entries");

pub struct RedbBackend {
    db: Arc<Database>,
}

impl RedbBackend {
    /// Open or create a database file and make sure the table exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        let db = Database::create(path).map_err(CacheError::backend)?;

        let write_txn = db.begin_write().map_err(CacheError::backend)?;
        {
            let _table = write_txn.open_table(ENTRIES).map_err(CacheError::backend)?;
        }
        write_txn.commit().map_err(CacheError::backend)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl CacheBackend for RedbBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let read_txn = self.db.begin_read().map_err(CacheError::backend)?;
        let table = read_txn.open_table(ENTRIES).map_err(CacheError::backend)?;
        let value = table.get(key).map_err(CacheError::backend)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn store(&self, key: &str, value: &[u8]) -> Result<(), CacheError> {
        let write_txn = self.db.begin_write().map_err(CacheError::backend)?;
        {
            let mut table = write_txn.open_table(ENTRIES).map_err(CacheError::backend)?;
            table.insert(key, value).map_err(CacheError::backend)?;
        }
        write_txn.commit().map_err(CacheError::backend)
    }

    fn remove(&self, key: &str) -> Result<(), CacheError> {
        let write_txn = self.db.begin_write().map_err(CacheError::backend)?;
        {
            let mut table = write_txn.open_table(ENTRIES).map_err(CacheError::backend)?;
            table.remove(key).map_err(CacheError::backend)?;
        }
        write_txn.commit().map_err(CacheError::backend)
    }

    fn keys(&self) -> Result<Vec<String>, CacheError> {
        let read_txn = self.db.begin_read().map_err(CacheError::backend)?;
        let table = read_txn.open_table(ENTRIES).map_err(CacheError::backend)?;
        let mut keys = Vec::new();
        for item in table.iter().map_err(CacheError::backend)? {
            let (key, _) = item.map_err(CacheError::backend)?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }

    fn name(&self) -> &'static str {
        "redb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn store_overwrites_and_remove_clears() {
        let file = NamedTempFile::new().expect("temp file");
        let backend = RedbBackend::open(file.path()).expect("open");

        backend.store("k", b"one").expect("store");
        backend.store("k", b"two").expect("overwrite");
        assert_eq!(backend.load("k").expect("load"), Some(b"two".to_vec()));
        assert_eq!(backend.keys().expect("keys"), vec!["k".to_string()]);

        backend.remove("k").expect("remove");
        assert_eq!(backend.load("k").expect("load"), None);
    }
}
