//! `shiprecon-recon`: cluster merge/dedupe engine.
//!
//! Pure engine crate: receives trackings and cost maps, returns clusters.
//! No CLI, network or file IO.

pub mod cluster;
pub mod costs;
pub mod digest;
pub mod engine;
pub mod error;
pub mod money;
pub mod row;
pub mod tracking;

pub use cluster::Cluster;
pub use costs::{apply_costs, fill_expected_costs, CostMaps, TrackingKey};
pub use engine::{consolidate, dedupe, find_by_shared_key, find_cluster, merge_by_shared_key, update};
pub use error::RowError;
pub use tracking::Tracking;
