use std::path::PathBuf;

use shiprecon_recon::RowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{name}: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    /// `row` is the 1-based line of the record, header included.
    #[error("{name}: row {row}: {source}")]
    Row {
        name: String,
        row: usize,
        #[source]
        source: RowError,
    },

    #[error("{name}: missing column '{column}'")]
    MissingColumn { name: String, column: String },

    #[error("invalid archive key '{0}'")]
    ArchiveKey(String),

    #[error("mirror {name}: {message}")]
    Mirror { name: String, message: String },
}

impl StoreError {
    /// True for malformed content, as opposed to filesystem failures.
    pub fn is_parse(&self) -> bool {
        matches!(
            self,
            StoreError::Json { .. }
                | StoreError::Csv { .. }
                | StoreError::Row { .. }
                | StoreError::MissingColumn { .. }
        )
    }
}
