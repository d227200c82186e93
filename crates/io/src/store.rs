//! Cluster store: a local JSON file plus an optional remote mirror.
//!
//! The mirror is authoritative when reachable. Every load and save runs the
//! collection through `dedupe`, so files written before a fix that produced
//! duplicates are repaired on first read.

use std::fs;
use std::path::{Path, PathBuf};

use shiprecon_recon::{dedupe, Cluster};

use crate::error::StoreError;

pub const CLUSTERS_FILE: &str = "clusters.json";

/// A copy of the cluster store kept somewhere other than the local data dir.
pub trait RemoteMirror {
    /// Human-readable location, used in logs and errors.
    fn name(&self) -> String;

    /// Stored bytes, or `None` when the mirror has never been written.
    fn pull(&self) -> Result<Option<Vec<u8>>, StoreError>;

    fn push(&self, bytes: &[u8]) -> Result<(), StoreError>;
}

/// Mirror backed by a directory another tool keeps in sync.
#[derive(Debug, Clone)]
pub struct DirMirror {
    dir: PathBuf,
}

impl DirMirror {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file(&self) -> PathBuf {
        self.dir.join(CLUSTERS_FILE)
    }
}

impl RemoteMirror for DirMirror {
    fn name(&self) -> String {
        self.dir.display().to_string()
    }

    fn pull(&self) -> Result<Option<Vec<u8>>, StoreError> {
        if !self.dir.is_dir() {
            return Err(StoreError::Mirror {
                name: self.name(),
                message: "directory is not available".to_string(),
            });
        }
        let path = self.file();
        if !path.exists() {
            return Ok(None);
        }
        fs::read(&path)
            .map(Some)
            .map_err(|source| StoreError::Read { path, source })
    }

    fn push(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if !self.dir.is_dir() {
            return Err(StoreError::Mirror {
                name: self.name(),
                message: "directory is not available".to_string(),
            });
        }
        write_replacing(&self.file(), bytes)
    }
}

pub struct ClusterStore {
    local: PathBuf,
    mirror: Option<Box<dyn RemoteMirror>>,
}

impl ClusterStore {
    /// Store at `<data_dir>/clusters.json` with no mirror.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            local: data_dir.join(CLUSTERS_FILE),
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, mirror: Box<dyn RemoteMirror>) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn local_path(&self) -> &Path {
        &self.local
    }

    /// Mirror first, then the local file, else empty.
    ///
    /// An unreachable or empty mirror falls back to the local copy; a mirror
    /// holding corrupt data is an error.
    pub fn load(&self) -> Result<Vec<Cluster>, StoreError> {
        if let Some(mirror) = &self.mirror {
            match mirror.pull() {
                Ok(Some(bytes)) => {
                    let clusters = parse(&bytes, Path::new(&mirror.name()))?;
                    tracing::info!(mirror = %mirror.name(), clusters = clusters.len(), "loaded clusters from mirror");
                    return Ok(dedupe(clusters));
                }
                Ok(None) => {
                    tracing::info!(mirror = %mirror.name(), "mirror is empty, using local store");
                }
                Err(e) => {
                    tracing::warn!(mirror = %mirror.name(), error = %e, "mirror unavailable, using local store");
                }
            }
        }

        if !self.local.exists() {
            tracing::info!(path = %self.local.display(), "no cluster store yet");
            return Ok(Vec::new());
        }
        let bytes = fs::read(&self.local).map_err(|source| StoreError::Read {
            path: self.local.clone(),
            source,
        })?;
        let clusters = parse(&bytes, &self.local)?;
        tracing::debug!(path = %self.local.display(), clusters = clusters.len(), "loaded clusters");
        Ok(dedupe(clusters))
    }

    /// Dedupe, write locally, then push to the mirror. Returns what was written.
    pub fn save(&self, clusters: Vec<Cluster>) -> Result<Vec<Cluster>, StoreError> {
        let clusters = dedupe(clusters);
        let bytes = serde_json::to_vec_pretty(&clusters).map_err(|source| StoreError::Json {
            path: self.local.clone(),
            source,
        })?;

        if let Some(parent) = self.local.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        write_replacing(&self.local, &bytes)?;
        tracing::info!(path = %self.local.display(), clusters = clusters.len(), "saved clusters");

        if let Some(mirror) = &self.mirror {
            mirror.push(&bytes)?;
            tracing::info!(mirror = %mirror.name(), "pushed clusters to mirror");
        }
        Ok(clusters)
    }
}

fn parse(bytes: &[u8], origin: &Path) -> Result<Vec<Cluster>, StoreError> {
    serde_json::from_slice(bytes).map_err(|source| StoreError::Json {
        path: origin.to_path_buf(),
        source,
    })
}

/// Write to a sibling temp file and rename over `path`.
pub(crate) fn write_replacing(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes).map_err(|source| StoreError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}
