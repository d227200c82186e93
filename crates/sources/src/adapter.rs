//! Closed set of cost sources, one variant per backend kind.

use std::collections::BTreeSet;
use std::time::Duration;

use shiprecon_config::{resolve_credentials, ConfigError, GroupConfig, Settings, SourceKind};
use shiprecon_io::ArchiveStore;
use shiprecon_recon::{CostMaps, TrackingKey};

use crate::client::FetchClient;
use crate::error::FetchError;
use crate::payment_sheet::PaymentSheetSource;
use crate::portal::PortalSource;
use crate::tracking_api::TrackingApiSource;

pub enum SourceAdapter {
    Portal(PortalSource),
    TrackingApi(TrackingApiSource),
    PaymentSheet(PaymentSheetSource),
}

fn require<'a>(group_id: &str, value: Option<&'a str>, field: &str) -> Result<&'a str, FetchError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(FetchError::Config(ConfigError::Invalid {
            problems: vec![format!("groups.{group_id}: missing {field}")],
        })),
    }
}

impl SourceAdapter {
    /// Build the adapter for one configured group. Credentials are resolved
    /// here, so a missing password fails before any request is made.
    pub fn from_config(
        group_id: &str,
        group: &GroupConfig,
        settings: &Settings,
    ) -> Result<Self, FetchError> {
        let client = || -> Result<FetchClient, FetchError> {
            Ok(FetchClient::new(group_id, Duration::from_secs(settings.http_timeout_secs))?
                .with_retries(settings.http_retries))
        };

        let adapter = match group.kind {
            SourceKind::Portal => {
                let base_url = require(group_id, group.base_url.as_deref(), "base_url")?;
                let credentials = resolve_credentials(group_id, group)?;
                SourceAdapter::Portal(
                    PortalSource::new(client()?, base_url, group_id, credentials)
                        .with_stale_after_days(group.stale_after_days)
                        .with_archives(group.archives.clone()),
                )
            }
            SourceKind::TrackingApi => {
                let base_url = require(group_id, group.base_url.as_deref(), "base_url")?;
                let credentials = resolve_credentials(group_id, group)?;
                SourceAdapter::TrackingApi(TrackingApiSource::new(client()?, base_url, credentials))
            }
            SourceKind::PaymentSheet => {
                let file = group.file.as_ref().ok_or_else(|| {
                    FetchError::Config(ConfigError::Invalid {
                        problems: vec![format!("groups.{group_id}: missing file")],
                    })
                })?;
                SourceAdapter::PaymentSheet(PaymentSheetSource::new(file))
            }
        };
        tracing::debug!(group = group_id, kind = group.kind.as_str(), "built source adapter");
        Ok(adapter)
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceAdapter::Portal(_) => SourceKind::Portal,
            SourceAdapter::TrackingApi(_) => SourceKind::TrackingApi,
            SourceAdapter::PaymentSheet(_) => SourceKind::PaymentSheet,
        }
    }

    /// One complete fetch. Safe to call again after a failure.
    pub fn fetch_costs(
        &self,
        known: &BTreeSet<TrackingKey>,
        full: bool,
        archives: &ArchiveStore,
    ) -> Result<CostMaps, FetchError> {
        match self {
            SourceAdapter::Portal(source) => source.fetch_costs(known, full, archives),
            SourceAdapter::TrackingApi(source) => source.fetch_costs(known, full),
            SourceAdapter::PaymentSheet(source) => source.fetch_costs(known, full),
        }
    }
}
