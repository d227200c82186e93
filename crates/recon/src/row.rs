//! Header-indexed access to a tabular row.
//!
//! Import is column-name driven, so every column is independently optional.
//! A missing column and an empty cell both read as `""`.

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};

use crate::error::RowError;
use crate::money::parse_money;

pub struct RowView<'a> {
    header: &'a [String],
    row: &'a [String],
}

impl<'a> RowView<'a> {
    pub fn new(header: &'a [String], row: &'a [String]) -> Result<Self, RowError> {
        if row.len() > header.len() {
            return Err(RowError::Width {
                cells: row.len(),
                columns: header.len(),
            });
        }
        Ok(Self { header, row })
    }

    pub fn has(&self, column: &str) -> bool {
        self.header.iter().any(|h| h == column)
    }

    /// Raw cell text, or `""` when the column or the cell is absent.
    pub fn text(&self, column: &str) -> &'a str {
        self.header
            .iter()
            .position(|h| h == column)
            .and_then(|i| self.row.get(i))
            .map(|s| s.as_str())
            .unwrap_or("")
    }

    /// Comma-separated set; blanks are dropped.
    pub fn set(&self, column: &str) -> BTreeSet<String> {
        split_set(self.text(column))
    }

    pub fn money(&self, column: &str) -> Result<i64, RowError> {
        let value = self.text(column);
        parse_money(value)
            .map(|v| v.unwrap_or(0))
            .map_err(|_| RowError::Amount {
                column: column.into(),
                value: value.into(),
            })
    }

    pub fn flag(&self, column: &str) -> Result<bool, RowError> {
        let value = self.text(column);
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "false" | "no" | "0" => Ok(false),
            "true" | "yes" | "1" => Ok(true),
            _ => Err(RowError::Flag {
                column: column.into(),
                value: value.into(),
            }),
        }
    }

    /// Date cell as an ISO string. Spreadsheet serial numbers are converted;
    /// anything else is kept verbatim. Empty cells yield `default`.
    pub fn date(&self, column: &str, default: &str) -> Result<String, RowError> {
        let value = self.text(column).trim();
        if value.is_empty() {
            return Ok(default.to_string());
        }
        if value != "0" && value.chars().all(|c| c.is_ascii_digit()) {
            return serial_to_date(value).ok_or_else(|| RowError::Date {
                column: column.into(),
                value: value.into(),
            });
        }
        Ok(value.to_string())
    }
}

pub fn split_set(value: &str) -> BTreeSet<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_set(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Spreadsheet serial day number to `YYYY-MM-DD`.
///
/// Serial 1 is 1900-01-01 and the format counts a phantom 1900-02-29
/// (serial 60), so serials from 60 on are offset by one more day. The
/// phantom day itself lands on 1900-02-28. Out-of-range serials are `None`.
pub fn serial_to_date(serial: &str) -> Option<String> {
    let days: i64 = serial.parse().ok()?;
    let offset = if days < 60 { 1 } else { 2 };
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?;
    let date = epoch.checked_add_signed(Duration::try_days(days - offset)?)?;
    Some(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_columns_read_empty() {
        let header = strings(&["A", "B"]);
        let row = strings(&["1"]);
        let view = RowView::new(&header, &row).unwrap();
        assert_eq!(view.text("A"), "1");
        assert_eq!(view.text("B"), "");
        assert_eq!(view.text("C"), "");
        assert!(view.set("C").is_empty());
        assert_eq!(view.money("C").unwrap(), 0);
    }

    #[test]
    fn too_wide_row_rejected() {
        let header = strings(&["A"]);
        let row = strings(&["1", "2"]);
        assert!(matches!(
            RowView::new(&header, &row),
            Err(RowError::Width { cells: 2, columns: 1 })
        ));
    }

    #[test]
    fn flags() {
        let header = strings(&["F", "G", "H"]);
        let row = strings(&["TRUE", "", "maybe"]);
        let view = RowView::new(&header, &row).unwrap();
        assert!(view.flag("F").unwrap());
        assert!(!view.flag("G").unwrap());
        assert!(view.flag("H").is_err());
    }

    #[test]
    fn serial_dates() {
        assert_eq!(serial_to_date("43831").as_deref(), Some("2020-01-01"));
        assert_eq!(serial_to_date("44197").as_deref(), Some("2021-01-01"));
        assert_eq!(serial_to_date("1").as_deref(), Some("1900-01-01"));
        assert_eq!(serial_to_date("59").as_deref(), Some("1900-02-28"));
        assert_eq!(serial_to_date("61").as_deref(), Some("1900-03-01"));
    }

    #[test]
    fn out_of_range_serial_is_an_error() {
        assert_eq!(serial_to_date("99999999999999999"), None);
        assert_eq!(serial_to_date("999999999999999999999"), None);

        let header = strings(&["Last Ship Date"]);
        let row = strings(&["99999999999999999"]);
        let view = RowView::new(&header, &row).unwrap();
        let err = view.date("Last Ship Date", "0").unwrap_err();
        assert!(matches!(err, RowError::Date { .. }), "{err}");
    }

    #[test]
    fn date_cells() {
        let header = strings(&["Ship Date", "Other"]);
        let row = strings(&["43831", "2020-03-04"]);
        let view = RowView::new(&header, &row).unwrap();
        assert_eq!(view.date("Ship Date", "0").unwrap(), "2020-01-01");
        assert_eq!(view.date("Other", "0").unwrap(), "2020-03-04");
        assert_eq!(view.date("Missing", "0").unwrap(), "0");
    }

    #[test]
    fn set_roundtrip() {
        let set = split_set(" b, a ,,c");
        assert_eq!(join_set(&set), "a,b,c");
    }
}
