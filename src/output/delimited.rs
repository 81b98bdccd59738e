use super::Table;
use crate::error::ExportError;
use std::path::Path;

/// Writes `table` as CSV. Line breaks inside a cell become single spaces.
pub(super) fn write(table: &Table, path: &Path) -> Result<(), ExportError> {
    let mut writer = csv::Writer::from_path(path)?;

    writer.write_record(&table.header)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| flatten(cell)))?;
    }

    writer.flush().map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Joins the lines of `cell` with spaces. `\r\n`, `\n` and a lone `\r` all break lines.
fn flatten(cell: &str) -> String {
    cell.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .collect::<Vec<_>>()
        .join(" ")
}
