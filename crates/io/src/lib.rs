//! `shiprecon-io`: persistence for the reconciliation engine.
//!
//! Cluster store with an optional remote mirror, per-group cost ledger,
//! immutable archive snapshots, and CSV import/export.

pub mod archive;
pub mod csv;
pub mod error;
pub mod ledger;
pub mod store;

pub use archive::ArchiveStore;
pub use error::StoreError;
pub use ledger::CostLedger;
pub use store::{ClusterStore, DirMirror, RemoteMirror};
