//! `shiprecon-sources`: where reimbursed costs come from.
//!
//! Each configured buying group maps to one [`SourceAdapter`] variant. The
//! [`CostReconciler`] picks the adapter for a group, runs it under the
//! attempt budget, and returns plain [`CostMaps`]; applying them to
//! clusters is the caller's job.
//!
//! [`CostMaps`]: shiprecon_recon::CostMaps

pub mod adapter;
pub mod client;
pub mod error;
pub mod orchestrator;
pub mod payment_sheet;
pub mod portal;
pub mod retry;
pub mod tracking_api;

pub use adapter::SourceAdapter;
pub use error::FetchError;
pub use orchestrator::CostReconciler;
pub use retry::with_retry;
