//! Per-group cost fetching under a bounded attempt budget.

use std::collections::BTreeSet;

use shiprecon_config::Settings;
use shiprecon_io::ArchiveStore;
use shiprecon_recon::{CostMaps, TrackingKey};

use crate::adapter::SourceAdapter;
use crate::error::FetchError;
use crate::retry::with_retry;

pub struct CostReconciler {
    settings: Settings,
    archives: ArchiveStore,
}

impl CostReconciler {
    pub fn new(settings: Settings) -> Self {
        let archives = ArchiveStore::new(settings.archive_dir());
        Self { settings, archives }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Configured group ids, sorted.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.settings.groups.keys().map(String::as_str)
    }

    pub fn adapter(&self, group: &str) -> Result<SourceAdapter, FetchError> {
        let config = self
            .settings
            .group(group)
            .ok_or_else(|| FetchError::UnknownGroup(group.to_string()))?;
        SourceAdapter::from_config(group, config, &self.settings)
    }

    /// A single attempt.
    pub fn fetch_costs(
        &self,
        group: &str,
        known: &BTreeSet<TrackingKey>,
        full: bool,
    ) -> Result<CostMaps, FetchError> {
        self.adapter(group)?.fetch_costs(known, full, &self.archives)
    }

    /// Up to `max_attempts` full fetches. Unknown groups and configuration
    /// errors fail on the spot; anything else is retried and, once the
    /// budget is spent, reported as `RetriesExhausted` with the last cause.
    pub fn fetch_costs_with_retry(
        &self,
        group: &str,
        known: &BTreeSet<TrackingKey>,
        full: bool,
    ) -> Result<CostMaps, FetchError> {
        let adapter = self.adapter(group)?;
        tracing::info!(group, kind = adapter.kind().as_str(), known = known.len(), full, "fetching costs");
        let maps = with_retry(group, self.settings.max_attempts, |attempt| {
            tracing::debug!(group, attempt, "fetch attempt");
            adapter.fetch_costs(known, full, &self.archives)
        })?;
        tracing::info!(
            group,
            keys = maps.tracking_costs.len(),
            pos = maps.po_costs.len(),
            "fetched costs",
        );
        Ok(maps)
    }
}
