//! Payment export read from a CSV file.

use std::collections::BTreeSet;
use std::path::PathBuf;

use shiprecon_io::csv::read_table;
use shiprecon_recon::row::RowView;
use shiprecon_recon::{CostMaps, TrackingKey};

use crate::error::FetchError;

pub const TRACKING_COLUMN: &str = "Tracking";
pub const AMOUNT_COLUMN: &str = "Amount";
pub const STATUS_COLUMN: &str = "Status";

/// USPS label scans carry an 8-character routing prefix.
const USPS_LABEL_LEN: usize = 30;
const USPS_PREFIX_LEN: usize = 8;

fn normalize_tracking(raw: &str) -> String {
    let tracking = raw.trim().to_uppercase();
    if tracking.chars().count() == USPS_LABEL_LEN {
        tracking.chars().skip(USPS_PREFIX_LEN).collect()
    } else {
        tracking
    }
}

pub struct PaymentSheetSource {
    path: PathBuf,
}

impl PaymentSheetSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Every paid row, summed per tracking number. The sheet is always read
    /// in full, so `known` and `full` change nothing.
    pub fn fetch_costs(
        &self,
        _known: &BTreeSet<TrackingKey>,
        _full: bool,
    ) -> Result<CostMaps, FetchError> {
        let name = self.path.display().to_string();
        let table = read_table(&self.path)?;
        table.require(&name, TRACKING_COLUMN)?;
        table.require(&name, AMOUNT_COLUMN)?;

        let rows = table.parse_rows(&name, |header, row| {
            let view = RowView::new(header, row)?;
            let paid = !view.has(STATUS_COLUMN)
                || view.text(STATUS_COLUMN).trim().eq_ignore_ascii_case("paid");
            Ok((paid, normalize_tracking(view.text(TRACKING_COLUMN)), view.money(AMOUNT_COLUMN)?))
        })?;

        let mut maps = CostMaps::default();
        let mut skipped = 0usize;
        for (paid, tracking, cents) in rows {
            if !paid {
                skipped += 1;
                continue;
            }
            let Some(key) = TrackingKey::single(&tracking) else {
                continue;
            };
            *maps.tracking_costs.entry(key).or_insert(0) += cents;
            *maps.po_costs.entry(tracking).or_insert(0) += cents;
        }
        tracing::info!(
            path = %self.path.display(),
            keys = maps.tracking_costs.len(),
            skipped,
            "read payment sheet",
        );
        Ok(maps)
    }
}
