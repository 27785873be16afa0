//! Filesystem snapshot loader.
//!
//! Snapshots live in one directory as `{region}_{tier}_{version}.json`.
//! `version = "latest"` picks the lexicographically greatest version among
//! files matching the region/tier prefix whose body declares that exact
//! region and tier.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::Deserialize;
use tracing::{debug, info};

use crate::{CohortNormsSnapshot, NormsError, SnapshotIdentity};

/// Version alias resolved by directory scan.
pub const LATEST_VERSION: &str = "latest";

const SNAPSHOT_EXT: &str = ".json";

/// Loads snapshots from a directory and keeps each one after first use.
pub struct SnapshotLoader {
    root: PathBuf,
    loaded: RwLock<HashMap<SnapshotIdentity, Arc<CohortNormsSnapshot>>>,
}

impl SnapshotLoader {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self {
            root: root.into(),
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Load `(region, tier, version)`, resolving `"latest"` first.
    pub fn load(
        &self,
        region: &str,
        tier: &str,
        version: &str,
    ) -> Result<Arc<CohortNormsSnapshot>, NormsError> {
        let version = if version == LATEST_VERSION {
            self.latest_version(region, tier)?
        } else {
            version.to_string()
        };
        let identity = SnapshotIdentity {
            region: region.to_string(),
            tier: tier.to_string(),
            version,
        };

        if let Some(hit) = self
            .loaded
            .read()
            .map_err(|_| NormsError::Configuration("poisoned snapshot cache".into()))?
            .get(&identity)
        {
            return Ok(Arc::clone(hit));
        }

        let path = self.root.join(file_name(&identity));
        if !path.is_file() {
            return Err(NormsError::MissingNorms(format!(
                "no snapshot at {}",
                path.display()
            )));
        }
        let snapshot = CohortNormsSnapshot::from_json_str(&fs::read_to_string(&path)?)?;
        if snapshot.identity() != &identity {
            return Err(NormsError::Configuration(format!(
                "snapshot {} declares {:?}, expected {:?}",
                path.display(),
                snapshot.identity(),
                identity
            )));
        }

        info!(
            region = %identity.region,
            tier = %identity.tier,
            version = %identity.version,
            lanes = snapshot.lane_keys().count(),
            "norms_snapshot_loaded"
        );

        let snapshot = Arc::new(snapshot);
        self.loaded
            .write()
            .map_err(|_| NormsError::Configuration("poisoned snapshot cache".into()))?
            .insert(identity, Arc::clone(&snapshot));
        Ok(snapshot)
    }

    /// Greatest version among `{region}_{tier}_*.json` files whose declared
    /// identity is exactly `(region, tier)`.
    ///
    /// The file-name prefix alone is ambiguous: `US_Hot100_Dance_v1.json`
    /// matches the `US_Hot100_` prefix but belongs to tier `Hot100_Dance`.
    pub fn latest_version(&self, region: &str, tier: &str) -> Result<String, NormsError> {
        let prefix = format!("{region}_{tier}_");
        let mut candidates: Vec<String> = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(version) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(SNAPSHOT_EXT))
            else {
                continue;
            };
            if !version.is_empty() {
                candidates.push(version.to_string());
            }
        }

        candidates.sort_unstable_by(|a, b| b.cmp(a));
        for version in candidates {
            let identity = SnapshotIdentity {
                region: region.to_string(),
                tier: tier.to_string(),
                version,
            };
            let path = self.root.join(file_name(&identity));
            match declared_identity(&path) {
                Some(declared) if declared == identity => return Ok(identity.version),
                declared => {
                    debug!(
                        path = %path.display(),
                        declared = ?declared,
                        "snapshot_candidate_skipped"
                    );
                }
            }
        }

        Err(NormsError::MissingNorms(format!(
            "no snapshots for {region}/{tier} in {}",
            self.root.display()
        )))
    }
}

/// Identity fields only; the lane tables are not parsed.
#[derive(Deserialize)]
struct DeclaredIdentity {
    region: Option<String>,
    tier: Option<String>,
    version: Option<String>,
}

/// `None` when the file is unreadable or lacks an identity.
fn declared_identity(path: &Path) -> Option<SnapshotIdentity> {
    let body = fs::read_to_string(path).ok()?;
    let declared: DeclaredIdentity = serde_json::from_str(&body).ok()?;
    Some(SnapshotIdentity {
        region: declared.region?,
        tier: declared.tier?,
        version: declared.version?,
    })
}

fn file_name(identity: &SnapshotIdentity) -> String {
    format!(
        "{}_{}_{}{SNAPSHOT_EXT}",
        identity.region, identity.tier, identity.version
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_snapshot(dir: &Path, region: &str, tier: &str, version: &str) {
        let body = serde_json::json!({
            "region": region,
            "tier": tier,
            "version": version,
            "lanes": { "tier1:2015_2024": { "composite": { "mean": 0.5, "std": 0.1 } } }
        });
        fs::write(
            dir.join(format!("{region}_{tier}_{version}.json")),
            body.to_string(),
        )
        .expect("write snapshot");
    }

    #[test]
    fn latest_picks_greatest_version() {
        let dir = TempDir::new().expect("tempdir");
        write_snapshot(dir.path(), "US", "Hot100", "2023-YE");
        write_snapshot(dir.path(), "US", "Hot100", "2024-YE");
        write_snapshot(dir.path(), "US", "Hot100", "2024-MID");
        write_snapshot(dir.path(), "UK", "Hot100", "2099-YE");

        let loader = SnapshotLoader::new(dir.path());
        let snapshot = loader.load("US", "Hot100", LATEST_VERSION).expect("latest");
        assert_eq!(snapshot.identity().version, "2024-YE");
    }

    #[test]
    fn repeated_loads_share_one_snapshot() {
        let dir = TempDir::new().expect("tempdir");
        write_snapshot(dir.path(), "US", "Hot100", "2024-YE");
        let loader = SnapshotLoader::new(dir.path());
        let a = loader.load("US", "Hot100", "2024-YE").expect("first");
        let b = loader.load("US", "Hot100", "2024-YE").expect("second");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn missing_version_is_missing_norms() {
        let dir = TempDir::new().expect("tempdir");
        let loader = SnapshotLoader::new(dir.path());
        assert!(matches!(
            loader.load("US", "Hot100", "2024-YE"),
            Err(NormsError::MissingNorms(_))
        ));
        assert!(matches!(
            loader.load("US", "Hot100", LATEST_VERSION),
            Err(NormsError::MissingNorms(_))
        ));
    }

    #[test]
    fn identity_mismatch_is_configuration_error() {
        let dir = TempDir::new().expect("tempdir");
        let body = serde_json::json!({"region": "CA", "tier": "Hot100", "version": "v1"});
        fs::write(dir.path().join("US_Hot100_v1.json"), body.to_string()).expect("write");
        let loader = SnapshotLoader::new(dir.path());
        assert!(matches!(
            loader.load("US", "Hot100", "v1"),
            Err(NormsError::Configuration(_))
        ));
    }

    #[test]
    fn latest_ignores_tiers_sharing_a_prefix() {
        let dir = TempDir::new().expect("tempdir");
        write_snapshot(dir.path(), "US", "Hot100", "2024-YE");
        write_snapshot(dir.path(), "US", "Hot100_Dance", "v1");

        let loader = SnapshotLoader::new(dir.path());
        assert_eq!(
            loader.latest_version("US", "Hot100").expect("latest"),
            "2024-YE"
        );
        let snapshot = loader.load("US", "Hot100", LATEST_VERSION).expect("latest");
        assert_eq!(snapshot.identity().tier, "Hot100");
        assert_eq!(snapshot.identity().version, "2024-YE");

        let dance = loader
            .load("US", "Hot100_Dance", LATEST_VERSION)
            .expect("dance latest");
        assert_eq!(dance.identity().version, "v1");
    }

    #[test]
    fn latest_with_only_foreign_tier_files_is_missing_norms() {
        let dir = TempDir::new().expect("tempdir");
        write_snapshot(dir.path(), "US", "Hot100_Dance", "v1");
        let loader = SnapshotLoader::new(dir.path());
        assert!(matches!(
            loader.load("US", "Hot100", LATEST_VERSION),
            Err(NormsError::MissingNorms(_))
        ));
    }
}
