use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::RowError;
use crate::money::format_cents;
use crate::row::{join_set, RowView};

/// Sentinel for "no ship date seen yet". Sorts before every ISO date.
pub const UNKNOWN_SHIP_DATE: &str = "0";

/// One billable reconciliation unit: a set of orders and the trackings that
/// fulfilled them, with what was billed, what was reimbursed, and any manual
/// correction.
///
/// Every field is written by the store; fields missing from stores written
/// by older code fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cluster {
    pub orders: BTreeSet<String>,
    pub trackings: BTreeSet<String>,
    pub group: String,
    pub expected_cost_cents: i64,
    pub tracked_cost_cents: i64,
    pub non_reimbursed_trackings: BTreeSet<String>,
    pub last_ship_date: String,
    pub purchase_orders: BTreeSet<String>,
    pub adjustment_cents: i64,
    pub to_email: String,
    pub notes: String,
    pub manual_override: bool,
}

impl Default for Cluster {
    fn default() -> Self {
        Self {
            orders: BTreeSet::new(),
            trackings: BTreeSet::new(),
            group: String::new(),
            expected_cost_cents: 0,
            tracked_cost_cents: 0,
            non_reimbursed_trackings: BTreeSet::new(),
            last_ship_date: UNKNOWN_SHIP_DATE.to_string(),
            purchase_orders: BTreeSet::new(),
            adjustment_cents: 0,
            to_email: String::new(),
            notes: String::new(),
            manual_override: false,
        }
    }
}

pub const CLUSTER_HEADER: [&str; 13] = [
    "Orders",
    "Trackings",
    "Amount Billed",
    "Amount Reimbursed",
    "Non-Reimbursed Trackings",
    "Last Ship Date",
    "POs",
    "Group",
    "Manual Cost Adjustment",
    "Manual Override",
    "Total Diff",
    "Notes",
    "To Email",
];

impl Cluster {
    pub fn new(group: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            ..Self::default()
        }
    }

    /// Fold `other` into `self`.
    ///
    /// Sets union, amounts add, the ship date advances, notes concatenate,
    /// and the manual override survives only if both sides carry it.
    /// `group` and `to_email` are left as they are on `self`.
    pub fn merge_with(&mut self, other: &Cluster) {
        self.orders.extend(other.orders.iter().cloned());
        self.trackings.extend(other.trackings.iter().cloned());
        self.expected_cost_cents += other.expected_cost_cents;
        self.tracked_cost_cents += other.tracked_cost_cents;
        if other.last_ship_date > self.last_ship_date {
            self.last_ship_date = other.last_ship_date.clone();
        }
        self.purchase_orders
            .extend(other.purchase_orders.iter().cloned());
        self.adjustment_cents += other.adjustment_cents;
        if !other.notes.is_empty() {
            if self.notes.is_empty() {
                self.notes = other.notes.clone();
            } else {
                self.notes = format!("{}, {}", self.notes, other.notes);
            }
        }
        self.manual_override = self.manual_override && other.manual_override;
        self.non_reimbursed_trackings
            .extend(other.non_reimbursed_trackings.iter().cloned());
    }

    /// Billed minus reimbursed minus the manual adjustment.
    pub fn total_diff_cents(&self) -> i64 {
        self.expected_cost_cents - self.tracked_cost_cents - self.adjustment_cents
    }

    pub fn header() -> Vec<String> {
        CLUSTER_HEADER.iter().map(|s| s.to_string()).collect()
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            join_set(&self.orders),
            join_set(&self.trackings),
            format_cents(self.expected_cost_cents),
            format_cents(self.tracked_cost_cents),
            join_set(&self.non_reimbursed_trackings),
            self.last_ship_date.clone(),
            // Leading quote stops spreadsheets from reading numeric POs as numbers.
            format!("'{}", join_set(&self.purchase_orders)),
            self.group.clone(),
            format_cents(self.adjustment_cents),
            self.manual_override.to_string(),
            format_cents(self.total_diff_cents()),
            self.notes.clone(),
            self.to_email.clone(),
        ]
    }

    pub fn from_row(header: &[String], row: &[String]) -> Result<Self, RowError> {
        let view = RowView::new(header, row)?;
        let pos = view.text("POs");
        let pos = pos.trim().trim_start_matches('\'');

        Ok(Self {
            orders: view.set("Orders"),
            trackings: view.set("Trackings"),
            group: view.text("Group").trim().to_string(),
            expected_cost_cents: view.money("Amount Billed")?,
            tracked_cost_cents: view.money("Amount Reimbursed")?,
            non_reimbursed_trackings: view.set("Non-Reimbursed Trackings"),
            last_ship_date: view.date("Last Ship Date", UNKNOWN_SHIP_DATE)?,
            purchase_orders: crate::row::split_set(pos),
            adjustment_cents: view.money("Manual Cost Adjustment")?,
            to_email: view.text("To Email").to_string(),
            notes: view.text("Notes").to_string(),
            manual_override: view.flag("Manual Override")?,
        })
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "orders: {:?}, trackings: {:?}, group: {}, expected cost: {}, tracked cost: {}, \
             last_ship_date: {}, purchase_orders: {:?}, adjustment: {}",
            self.orders,
            self.trackings,
            self.group,
            format_cents(self.expected_cost_cents),
            format_cents(self.tracked_cost_cents),
            self.last_ship_date,
            self.purchase_orders,
            format_cents(self.adjustment_cents),
        )
    }
}
