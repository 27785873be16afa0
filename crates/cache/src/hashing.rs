//! Source identity helpers.
//!
//! ```text
//! content_hash = hex(SHA-256(bytes))
//! ```

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::CacheError;

/// Hex SHA-256 of a byte slice.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Hex SHA-256 of a file's contents, streamed.
pub fn file_content_hash<P: AsRef<Path>>(path: P) -> Result<String, CacheError> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Modification time in seconds since the Unix epoch, if the platform reports one.
pub fn source_mtime<P: AsRef<Path>>(path: P) -> Result<Option<f64>, CacheError> {
    let modified = match std::fs::metadata(path)?.modified() {
        Ok(time) => time,
        Err(_) => return Ok(None),
    };
    Ok(modified
        .duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_secs_f64()))
}
