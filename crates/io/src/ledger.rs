//! Per-group record of every cost a source has reported.
//!
//! Adapters skip keys they were told are already known, so the only place a
//! known key's cost lives after the first fetch is here. Costs applied to
//! clusters always come from the full ledger entry for the group.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use shiprecon_recon::{CostMaps, TrackingKey};

use crate::error::StoreError;
use crate::store::write_replacing;

pub const LEDGER_FILE: &str = "ledger.json";

#[derive(Debug, Clone)]
pub struct CostLedger {
    path: PathBuf,
    groups: BTreeMap<String, CostMaps>,
}

impl CostLedger {
    /// Load `<data_dir>/ledger.json`; a missing file is an empty ledger.
    pub fn load(data_dir: &Path) -> Result<Self, StoreError> {
        let path = data_dir.join(LEDGER_FILE);
        let groups = if path.exists() {
            let bytes = fs::read(&path).map_err(|source| StoreError::Read {
                path: path.clone(),
                source,
            })?;
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Json {
                path: path.clone(),
                source,
            })?
        } else {
            BTreeMap::new()
        };
        Ok(Self { path, groups })
    }

    pub fn known_keys(&self, group: &str) -> BTreeSet<TrackingKey> {
        self.groups
            .get(group)
            .map(CostMaps::known_keys)
            .unwrap_or_default()
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &CostMaps)> {
        self.groups.iter().map(|(g, m)| (g.as_str(), m))
    }

    /// Fold freshly fetched maps into the group's entry.
    pub fn merge(&mut self, group: &str, fetched: CostMaps) {
        let keys = fetched.tracking_costs.len();
        self.groups.entry(group.to_string()).or_default().extend(fetched);
        tracing::debug!(group, keys, "merged fetched costs into ledger");
    }

    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let bytes = serde_json::to_vec_pretty(&self.groups).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;
        write_replacing(&self.path, &bytes)
    }
}
