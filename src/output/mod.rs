//! Rendering normalized records to output files.
//!
//! [`export`] writes an [`Aggregation`] to one of the [`ExportFormat`]s:
//!
//! | Format | Contents |
//! |--------|----------|
//! | `xlsx` | `Results` sheet (one row per target, filterable) and `Transposed` sheet (one row per column) |
//! | `csv`  | one row per target, line breaks inside cells replaced by spaces |
//! | `json` | array of column to value objects |

mod cli;
mod delimited;
mod json;
mod workbook;

pub use cli::print_summary;
pub use json::read_json;

use crate::aggregate::{titleize, Aggregation, NormalizedRecord, Schema};
use crate::error::ExportError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Excel workbook with a row-oriented and a transposed sheet
    Xlsx,
    /// Comma-separated values
    Csv,
    /// JSON array of records
    Json,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "xlsx" | "excel" => Ok(ExportFormat::Xlsx),
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            _ => Err(format!(
                "Unknown format: {}. Use 'xlsx', 'csv', or 'json'",
                s
            )),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// A rectangular table of strings with a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Lays records out in schema order. Headers are titleized column names.
    pub fn from_records(records: &[NormalizedRecord], schema: &Schema) -> Self {
        let columns: Vec<&str> = schema.columns().collect();

        let header = columns.iter().map(|c| titleize(c)).collect();
        let rows = records
            .iter()
            .map(|record| {
                columns
                    .iter()
                    .map(|c| record.get(c).unwrap_or_default().to_string())
                    .collect()
            })
            .collect();

        Self { header, rows }
    }

    /// Swaps rows and columns.
    ///
    /// The first column becomes the new header row (under `Index`); every
    /// other column becomes a row led by its header.
    pub fn transpose(&self) -> Table {
        let mut header = vec!["Index".to_string()];
        header.extend(self.rows.iter().map(|row| row.first().cloned().unwrap_or_default()));

        let rows = self
            .header
            .iter()
            .enumerate()
            .skip(1)
            .map(|(col, title)| {
                let mut row = vec![title.clone()];
                row.extend(
                    self.rows
                        .iter()
                        .map(|r| r.get(col).cloned().unwrap_or_default()),
                );
                row
            })
            .collect();

        Table { header, rows }
    }
}

/// Returns `name` with the format's extension appended unless it already
/// ends with it (case-insensitive). An existing different extension is kept.
pub fn output_path(name: &str, format: ExportFormat) -> PathBuf {
    let matches = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(format.extension()))
        .unwrap_or(false);

    if matches {
        PathBuf::from(name)
    } else {
        PathBuf::from(format!("{}.{}", name, format.extension()))
    }
}

/// Writes `aggregation` to `name` (extension corrected) and returns the path.
///
/// # Errors
///
/// Returns [`ExportError::NoRecords`] without touching the filesystem when
/// there is nothing to export.
pub fn export(
    aggregation: &Aggregation,
    format: ExportFormat,
    name: &str,
) -> Result<PathBuf, ExportError> {
    if aggregation.records.is_empty() {
        return Err(ExportError::NoRecords);
    }

    let path = output_path(name, format);
    info!(path = %path.display(), %format, records = aggregation.records.len(), "exporting");

    match format {
        ExportFormat::Xlsx => {
            let table = Table::from_records(&aggregation.records, &aggregation.schema);
            workbook::write(&table, &path)?;
        }
        ExportFormat::Csv => {
            let table = Table::from_records(&aggregation.records, &aggregation.schema);
            delimited::write(&table, &path)?;
        }
        ExportFormat::Json => json::write(&aggregation.records, &path)?,
    }

    Ok(path)
}
