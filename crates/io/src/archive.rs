//! Immutable snapshots of cost maps for retired sub-groups.

use std::fs;
use std::path::PathBuf;

use shiprecon_recon::CostMaps;

use crate::error::StoreError;
use crate::store::write_replacing;

/// One `<key>.json` file per archive under a directory.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    dir: PathBuf,
}

impl ArchiveStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !key.starts_with('.');
        if !valid {
            return Err(StoreError::ArchiveKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }

    pub fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.path(key)?.exists())
    }

    pub fn get(&self, key: &str) -> Result<CostMaps, StoreError> {
        let path = self.path(key)?;
        let bytes = fs::read(&path).map_err(|source| StoreError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| StoreError::Json { path, source })
    }

    /// Store a snapshot. Returns `false` without writing when `key` exists.
    pub fn put(&self, key: &str, maps: &CostMaps) -> Result<bool, StoreError> {
        let path = self.path(key)?;
        if path.exists() {
            tracing::debug!(key, "archive already stored");
            return Ok(false);
        }
        fs::create_dir_all(&self.dir).map_err(|source| StoreError::Write {
            path: self.dir.clone(),
            source,
        })?;
        let bytes = serde_json::to_vec_pretty(maps).map_err(|source| StoreError::Json {
            path: path.clone(),
            source,
        })?;
        write_replacing(&path, &bytes)?;
        tracing::info!(key, keys = maps.tracking_costs.len(), "stored archive");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiprecon_recon::TrackingKey;
    use tempfile::tempdir;

    fn maps(t: &str, cents: i64) -> CostMaps {
        let mut m = CostMaps::default();
        m.tracking_costs.insert(TrackingKey::single(t).unwrap(), cents);
        m.po_costs.insert(format!("PO-{t}"), cents);
        m
    }

    #[test]
    fn put_then_get() {
        let dir = tempdir().unwrap();
        let store = ArchiveStore::new(dir.path().join("archives"));
        assert!(!store.has("mysite-2020").unwrap());
        assert!(store.put("mysite-2020", &maps("T1", 100)).unwrap());
        assert!(store.has("mysite-2020").unwrap());
        assert_eq!(store.get("mysite-2020").unwrap(), maps("T1", 100));
    }

    #[test]
    fn put_never_overwrites() {
        let dir = tempdir().unwrap();
        let store = ArchiveStore::new(dir.path());
        store.put("old", &maps("T1", 100)).unwrap();
        assert!(!store.put("old", &maps("T2", 999)).unwrap());
        assert_eq!(store.get("old").unwrap(), maps("T1", 100));
    }

    #[test]
    fn rejects_path_like_keys() {
        let store = ArchiveStore::new("/tmp/unused");
        assert!(matches!(store.has("../x"), Err(StoreError::ArchiveKey(_))));
        assert!(matches!(store.has(""), Err(StoreError::ArchiveKey(_))));
    }
}
