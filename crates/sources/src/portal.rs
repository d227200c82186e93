//! Receipts portal: a paginated JSON listing of check-ins, newest first.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use shiprecon_config::Credentials;
use shiprecon_io::ArchiveStore;
use shiprecon_recon::{CostMaps, TrackingKey};

use crate::client::{money_field, text_field, FetchClient};
use crate::error::FetchError;

/// One receipt row as the portal lists it.
#[derive(Debug, Deserialize)]
struct ReceiptRow {
    #[serde(default)]
    po: Value,
    #[serde(default)]
    cost: Value,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    trackings: String,
    #[serde(default)]
    modified_at: String,
}

#[derive(Debug, Deserialize)]
struct ReceiptPage {
    rows: Vec<ReceiptRow>,
    #[serde(default)]
    has_next: bool,
}

/// Tracking numbers on a receipt: comma-separated, dashes removed.
fn parse_trackings(raw: &str) -> Option<TrackingKey> {
    TrackingKey::new(raw.replace('-', "").split(','))
}

pub struct PortalSource {
    client: FetchClient,
    base_url: String,
    site: String,
    credentials: Credentials,
    stale_after_days: u32,
    archives: Vec<String>,
    today: NaiveDate,
}

impl PortalSource {
    pub fn new(client: FetchClient, base_url: &str, site: &str, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            site: site.to_string(),
            credentials,
            stale_after_days: 30,
            archives: Vec::new(),
            today: chrono::Utc::now().date_naive(),
        }
    }

    pub fn with_stale_after_days(mut self, days: u32) -> Self {
        self.stale_after_days = days;
        self
    }

    pub fn with_archives(mut self, archives: Vec<String>) -> Self {
        self.archives = archives;
        self
    }

    /// Reference date for the staleness shortcut.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    fn login(&self) -> Result<String, FetchError> {
        let url = format!("{}/api/login", self.base_url);
        let payload = json!({
            "username": self.credentials.username,
            "password": self.credentials.password,
        });
        let body = self.client.request_json(|http| http.post(&url).json(&payload))?;
        body["token"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .ok_or_else(|| FetchError::upstream(self.client.source_name(), "login response missing 'token'"))
    }

    fn is_stale(&self, modified_at: &str) -> bool {
        match NaiveDate::parse_from_str(modified_at.trim(), "%Y-%m-%d") {
            Ok(date) => (self.today - date).num_days() > i64::from(self.stale_after_days),
            Err(_) => false,
        }
    }

    /// Scan one site's receipts.
    ///
    /// Without `full`, the scan stops at the first row that is both already
    /// known and older than the staleness window; everything after it was
    /// seen on an earlier run.
    pub fn fetch_site(
        &self,
        site: &str,
        known: &BTreeSet<TrackingKey>,
        full: bool,
    ) -> Result<CostMaps, FetchError> {
        let source = self.client.source_name();
        let token = self.login()?;
        let url = format!("{}/api/receipts", self.base_url);
        let mut maps = CostMaps::default();
        let mut page = 1u32;

        loop {
            let params = [("site", site.to_string()), ("page", page.to_string())];
            let body = self
                .client
                .request_json(|http| http.get(&url).bearer_auth(&token).query(&params))?;
            let listing: ReceiptPage = serde_json::from_value(body).map_err(|e| {
                FetchError::upstream(source, format!("unexpected receipts page {page}: {e}"))
            })?;
            tracing::debug!(site, page, rows = listing.rows.len(), "fetched receipts page");

            for row in &listing.rows {
                let cost = money_field(source, &row.cost, "cost")?;
                let has_cost = !text_field(&row.cost).is_empty();
                let po = text_field(&row.po);

                if let Some(key) = parse_trackings(&row.trackings) {
                    if !full && known.contains(&key) && self.is_stale(&row.modified_at) {
                        tracing::info!(site, page, key = %key, "reached previously seen receipts, stopping");
                        return Ok(maps);
                    }
                    if has_cost {
                        let entry = maps.tracking_costs.entry(key.clone()).or_insert(0);
                        if row.verified {
                            *entry += cost;
                        }
                    }
                    maps.link_po(&key, &po);
                }
                if has_cost && !po.is_empty() {
                    *maps.po_costs.entry(po).or_insert(0) += cost;
                }
            }

            if !listing.has_next || listing.rows.is_empty() {
                break;
            }
            page += 1;
        }

        tracing::info!(site, pages = page, keys = maps.tracking_costs.len(), "scanned receipts");
        Ok(maps)
    }

    /// The live site plus every configured archive.
    ///
    /// Archives missing from `store` are fetched in full and stored first;
    /// stored archives are never fetched again.
    pub fn fetch_costs(
        &self,
        known: &BTreeSet<TrackingKey>,
        full: bool,
        store: &ArchiveStore,
    ) -> Result<CostMaps, FetchError> {
        let mut maps = self.fetch_site(&self.site, known, full)?;

        for archive in &self.archives {
            if !store.has(archive)? {
                tracing::info!(archive = %archive, "fetching archive");
                let snapshot = self.fetch_site(archive, &BTreeSet::new(), true)?;
                store.put(archive, &snapshot)?;
            }
            let snapshot = store.get(archive)?;
            tracing::debug!(archive = %archive, keys = snapshot.tracking_costs.len(), "merged archive");
            maps.extend(snapshot);
        }
        Ok(maps)
    }
}
