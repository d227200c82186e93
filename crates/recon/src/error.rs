use thiserror::Error;

/// Failure while importing a tabular row into a `Cluster` or `Tracking`.
///
/// Row import is all-or-nothing: the first malformed cell fails the row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowError {
    /// A monetary cell did not parse after stripping `$` and `,`.
    #[error("column '{column}': cannot parse amount '{value}'")]
    Amount { column: String, value: String },
    /// A boolean cell was not one of the accepted spellings.
    #[error("column '{column}': cannot parse flag '{value}'")]
    Flag { column: String, value: String },
    /// A date cell was neither an ISO date nor a spreadsheet serial number.
    #[error("column '{column}': cannot parse date '{value}'")]
    Date { column: String, value: String },
    /// The row has more cells than the header.
    #[error("row has {cells} cells but header has {columns}")]
    Width { cells: usize, columns: usize },
}
