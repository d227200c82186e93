// CSV import/export for clusters, trackings and cost maps

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

use shiprecon_recon::money::format_cents;
use shiprecon_recon::{Cluster, CostMaps, RowError, Tracking};

use crate::error::StoreError;

/// Columns of the billed-amount export read by [`import_order_costs`].
pub const ORDER_COLUMN: &str = "Order Number";
pub const AMOUNT_COLUMN: &str = "Amount";

/// A header plus data rows, all cells as text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn has_column(&self, column: &str) -> bool {
        self.header.iter().any(|h| h == column)
    }

    pub fn require(&self, name: &str, column: &str) -> Result<(), StoreError> {
        if self.has_column(column) {
            Ok(())
        } else {
            Err(StoreError::MissingColumn {
                name: name.to_string(),
                column: column.to_string(),
            })
        }
    }

    /// Convert every data row, failing on the first bad one.
    pub fn parse_rows<T>(
        &self,
        name: &str,
        parse: impl Fn(&[String], &[String]) -> Result<T, RowError>,
    ) -> Result<Vec<T>, StoreError> {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| {
                parse(&self.header, row).map_err(|source| StoreError::Row {
                    name: name.to_string(),
                    row: idx + 2,
                    source,
                })
            })
            .collect()
    }
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// Payment exports from spreadsheet tools in some locales use `;`.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b','];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let target = match counts.first() {
            Some(&n) if n > 1 => n,
            _ => continue,
        };
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (Windows-1252 exports are common).
pub fn read_file_as_utf8(path: &Path) -> Result<String, StoreError> {
    let mut file = std::fs::File::open(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)
        .map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Parse CSV text with a header row. Blank lines are skipped; header cells
/// are trimmed and a leading byte-order mark is dropped.
pub fn read_table_str(content: &str, name: &str) -> Result<Table, StoreError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(sniff_delimiter(content))
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut table = Table::default();
    for (idx, result) in reader.records().enumerate() {
        let record = result.map_err(|source| StoreError::Csv {
            name: name.to_string(),
            source,
        })?;
        if idx == 0 {
            table.header = record.iter().map(|h| h.trim().to_string()).collect();
            continue;
        }
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        table.rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(table)
}

pub fn read_table(path: &Path) -> Result<Table, StoreError> {
    let content = read_file_as_utf8(path)?;
    read_table_str(&content, &path.display().to_string())
}

pub fn import_clusters(path: &Path) -> Result<Vec<Cluster>, StoreError> {
    let table = read_table(path)?;
    table.parse_rows(&path.display().to_string(), Cluster::from_row)
}

pub fn import_trackings(path: &Path) -> Result<Vec<Tracking>, StoreError> {
    let name = path.display().to_string();
    let table = read_table(path)?;
    table.require(&name, "Tracking Number")?;
    table.parse_rows(&name, Tracking::from_row)
}

/// Billed amount per order id. Repeated orders accumulate.
pub fn import_order_costs(path: &Path) -> Result<BTreeMap<String, i64>, StoreError> {
    let name = path.display().to_string();
    let table = read_table(path)?;
    table.require(&name, ORDER_COLUMN)?;
    table.require(&name, AMOUNT_COLUMN)?;

    let pairs = table.parse_rows(&name, |header, row| {
        let view = shiprecon_recon::row::RowView::new(header, row)?;
        Ok((view.text(ORDER_COLUMN).trim().to_string(), view.money(AMOUNT_COLUMN)?))
    })?;

    let mut costs = BTreeMap::new();
    for (order, cents) in pairs {
        if !order.is_empty() {
            *costs.entry(order).or_insert(0) += cents;
        }
    }
    Ok(costs)
}

fn write_rows<W: Write>(
    out: W,
    header: Vec<String>,
    rows: impl Iterator<Item = Vec<String>>,
) -> Result<(), StoreError> {
    let csv_err = |source| StoreError::Csv {
        name: "output".to_string(),
        source,
    };
    let mut writer = csv::WriterBuilder::new().from_writer(out);
    writer.write_record(&header).map_err(csv_err)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_err)?;
    }
    writer.flush().map_err(|e| csv_err(e.into()))?;
    Ok(())
}

pub fn write_clusters<W: Write>(out: W, clusters: &[Cluster]) -> Result<(), StoreError> {
    write_rows(out, Cluster::header(), clusters.iter().map(Cluster::to_row))
}

/// Tracking spreadsheet rows under the `Tracking Number,...` header.
pub fn write_trackings<W: Write>(out: W, trackings: &[Tracking]) -> Result<(), StoreError> {
    write_rows(out, Tracking::header(), trackings.iter().map(Tracking::to_row))
}

/// `Trackings,Amount` rows, one per tracking key.
pub fn write_cost_map<W: Write>(out: W, maps: &CostMaps) -> Result<(), StoreError> {
    write_rows(
        out,
        vec!["Trackings".to_string(), "Amount".to_string()],
        maps.tracking_costs
            .iter()
            .map(|(key, cents)| vec![key.to_string(), format_cents(*cents)]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    use shiprecon_recon::TrackingKey;

    #[test]
    fn sniff_semicolon_delimiter() {
        let content = "Tracking;Amount\n1Z999;12,50\n1Z998;3,00\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn sniff_comma_delimiter() {
        let content = "Tracking,Amount\n1Z999,12.50\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn sniff_tab_delimiter() {
        let content = "Tracking\tAmount\n1Z999\t12.50\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn table_skips_blank_lines_and_bom() {
        let table = read_table_str("\u{feff}A, B\n1,2\n,\n3,4\n", "t").unwrap();
        assert_eq!(table.header, vec!["A", "B"]);
        assert_eq!(table.rows.len(), 2);
    }

    #[test]
    fn cluster_csv_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusters.csv");

        let mut c = Cluster::new("mysite");
        c.orders = ["o1", "o2"].iter().map(|s| s.to_string()).collect();
        c.trackings.insert("T1".into());
        c.purchase_orders.insert("00123".into());
        c.expected_cost_cents = 1550;
        c.tracked_cost_cents = 1000;
        c.notes = "short, check".into();

        let mut buf = Vec::new();
        write_clusters(&mut buf, &[c.clone()]).unwrap();
        fs::write(&path, &buf).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("'00123"));
        assert_eq!(import_clusters(&path).unwrap(), vec![c]);
    }

    #[test]
    fn bad_row_fails_whole_import_with_row_number() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("clusters.csv");
        fs::write(
            &path,
            "Orders,Group,Amount Billed\no1,g,1.00\no2,g,abc\no3,g,2.00\n",
        )
        .unwrap();

        match import_clusters(&path) {
            Err(StoreError::Row { row, source, .. }) => {
                assert_eq!(row, 3);
                assert!(matches!(source, RowError::Amount { .. }));
            }
            other => panic!("expected row error, got {other:?}"),
        }
    }

    #[test]
    fn trackings_require_number_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.csv");
        fs::write(&path, "Group\ng\n").unwrap();
        assert!(matches!(
            import_trackings(&path),
            Err(StoreError::MissingColumn { .. })
        ));
    }

    #[test]
    fn order_costs_accumulate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("orders.csv");
        fs::write(
            &path,
            "Order Number,Amount\no1,\"$1,000.00\"\no2,5.25\no1,0.75\n,9.99\n",
        )
        .unwrap();
        let costs = import_order_costs(&path).unwrap();
        assert_eq!(costs.len(), 2);
        assert_eq!(costs["o1"], 100_075);
        assert_eq!(costs["o2"], 525);
    }

    #[test]
    fn windows_1252_is_decoded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "Café" with 0xE9
        fs::write(&path, b"Notes\nCaf\xe9\n").unwrap();
        let table = read_table(&path).unwrap();
        assert_eq!(table.rows[0][0], "Café");
    }

    #[test]
    fn cost_map_export() {
        let mut maps = CostMaps::default();
        maps.tracking_costs
            .insert(TrackingKey::new(["T1", "T2"]).unwrap(), 1234);
        let mut buf = Vec::new();
        write_cost_map(&mut buf, &maps).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "Trackings,Amount\n\"T1,T2\",12.34\n");
    }
}
