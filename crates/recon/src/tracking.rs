use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cluster::UNKNOWN_SHIP_DATE;
use crate::error::RowError;
use crate::money::format_cents;
use crate::row::RowView;

/// A single observed shipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tracking {
    pub tracking_number: String,
    pub group: String,
    pub order_ids: BTreeSet<String>,
    pub price_cents: i64,
    pub to_email: String,
    pub ship_date: String,
    pub delivery_date: String,
    pub tracked_cost_cents: i64,
    pub items: String,
    pub merchant: String,
    pub reconcile: bool,
}

pub const TRACKING_HEADER: [&str; 9] = [
    "Tracking Number",
    "Order Number(s)",
    "To Email",
    "Ship Date",
    "Est. Delivery Date",
    "Group",
    "Amount Reimbursed",
    "Merchant",
    "Items",
];

impl Tracking {
    pub fn new(
        tracking_number: impl Into<String>,
        group: impl Into<String>,
        order_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            tracking_number: tracking_number.into(),
            group: group.into(),
            order_ids: order_ids.into_iter().map(Into::into).collect(),
            price_cents: 0,
            to_email: String::new(),
            ship_date: UNKNOWN_SHIP_DATE.to_string(),
            delivery_date: String::new(),
            tracked_cost_cents: 0,
            items: String::new(),
            merchant: String::new(),
            reconcile: true,
        }
    }

    /// Carrier tracking page, inferred from the number's shape.
    pub fn tracking_url(&self) -> Option<String> {
        let n = &self.tracking_number;
        if n.starts_with("TBA") {
            None
        } else if n.starts_with("1Z") {
            Some(format!("https://www.ups.com/track?loc=en_US&tracknum={n}"))
        } else if n.len() == 12 || n.len() == 15 {
            Some(format!(
                "https://www.fedex.com/apps/fedextrack/?tracknumbers={n}"
            ))
        } else if n.len() == 22 {
            Some(format!(
                "https://tools.usps.com/go/TrackConfirmAction?qtc_tLabels1={n}"
            ))
        } else {
            None
        }
    }

    pub fn header() -> Vec<String> {
        TRACKING_HEADER.iter().map(|s| s.to_string()).collect()
    }

    pub fn to_row(&self) -> Vec<String> {
        let number = match self.tracking_url() {
            Some(url) => format!("=HYPERLINK(\"{url}\", \"{}\")", self.tracking_number),
            None => self.tracking_number.clone(),
        };
        vec![
            number,
            self.order_ids
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", "),
            self.to_email.clone(),
            self.ship_date.clone(),
            self.delivery_date.clone(),
            self.group.clone(),
            format_cents(self.tracked_cost_cents),
            self.merchant.clone(),
            self.items.clone(),
        ]
    }

    pub fn from_row(header: &[String], row: &[String]) -> Result<Self, RowError> {
        let view = RowView::new(header, row)?;
        Ok(Self {
            tracking_number: unwrap_hyperlink(view.text("Tracking Number")).to_string(),
            group: view.text("Group").trim().to_string(),
            order_ids: view.set("Order Number(s)"),
            price_cents: view.money("Price")?,
            to_email: view.text("To Email").trim().to_string(),
            ship_date: view.date("Ship Date", UNKNOWN_SHIP_DATE)?,
            delivery_date: view.date("Est. Delivery Date", "")?,
            tracked_cost_cents: view.money("Amount Reimbursed")?,
            items: view.text("Items").to_string(),
            merchant: view.text("Merchant").to_string(),
            reconcile: true,
        })
    }
}

/// `=HYPERLINK("url", "1Z...")` → `1Z...`; plain values pass through trimmed.
fn unwrap_hyperlink(cell: &str) -> &str {
    let cell = cell.trim();
    if !cell.starts_with("=HYPERLINK(") {
        return cell;
    }
    let inner = cell.trim_end_matches(')');
    inner
        .rsplit(',')
        .next()
        .map(|s| s.trim().trim_matches('"'))
        .unwrap_or(cell)
}

impl fmt::Display for Tracking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "number: {}, group: {}, order(s): {:?}, price: {}, to_email: {}, ship_date: {}, \
             items: {}, merchant: {}, reconcile: {}, delivery_date: {}",
            self.tracking_number,
            self.group,
            self.order_ids,
            format_cents(self.price_cents),
            self.to_email,
            self.ship_date,
            self.items,
            self.merchant,
            self.reconcile,
            self.delivery_date,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carrier_urls() {
        let ups = Tracking::new("1Z999AA10123456784", "g", ["o"]);
        assert!(ups.tracking_url().unwrap().contains("ups.com"));
        let fedex = Tracking::new("123456789012", "g", ["o"]);
        assert!(fedex.tracking_url().unwrap().contains("fedex.com"));
        let usps = Tracking::new("9400111899223197428490", "g", ["o"]);
        assert!(usps.tracking_url().unwrap().contains("usps.com"));
        let amazon = Tracking::new("TBA123456789012", "g", ["o"]);
        assert!(amazon.tracking_url().is_none());
        let other = Tracking::new("XYZ", "g", ["o"]);
        assert!(other.tracking_url().is_none());
    }

    #[test]
    fn row_roundtrip_through_hyperlink() {
        let mut t = Tracking::new("1Z999AA10123456784", "mysite", ["112-1", "112-2"]);
        t.to_email = "me@example.com".into();
        t.ship_date = "2021-01-05".into();
        t.delivery_date = "2021-01-09".into();
        t.tracked_cost_cents = 4999;
        t.items = "2x Widget".into();
        t.merchant = "Amazon".into();

        let row = t.to_row();
        assert!(row[0].starts_with("=HYPERLINK("));
        assert_eq!(row[1], "112-1, 112-2");

        let back = Tracking::from_row(&Tracking::header(), &row).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn from_row_parses_price_and_serial_dates() {
        let header: Vec<String> = ["Tracking Number", "Order Number(s)", "Price", "Ship Date", "Group"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let row: Vec<String> = ["TBA1", " o1 , o2", "$1,200.00", "43831", "g"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let t = Tracking::from_row(&header, &row).unwrap();
        assert_eq!(t.tracking_number, "TBA1");
        assert_eq!(t.order_ids.len(), 2);
        assert!(t.order_ids.contains("o1"));
        assert_eq!(t.price_cents, 120000);
        assert_eq!(t.ship_date, "2020-01-01");
        assert_eq!(t.delivery_date, "");
        assert!(t.reconcile);
    }

    #[test]
    fn from_row_rejects_bad_price() {
        let header: Vec<String> = vec!["Tracking Number".into(), "Price".into()];
        let row: Vec<String> = vec!["T1".into(), "n/a".into()];
        assert!(matches!(
            Tracking::from_row(&header, &row),
            Err(RowError::Amount { .. })
        ));
    }
}
