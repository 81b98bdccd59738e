use super::Table;
use crate::error::ExportError;
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::borrow::Cow;
use std::path::Path;
use tracing::warn;

/// Excel worksheet limits. Anything past them is dropped, not an error.
const MAX_COLUMNS: usize = 16_384;
const MAX_ROWS: usize = 1_048_576;
const MAX_CELL_CHARS: usize = 32_767;

/// Writes `table` and its transposition as two sheets of one workbook.
pub(super) fn write(table: &Table, path: &Path) -> Result<(), ExportError> {
    let header_format = Format::new().set_bold();
    let mut workbook = Workbook::new();

    let sheet = workbook.add_worksheet();
    sheet.set_name("Results")?;
    fill_sheet(sheet, "Results", table, &header_format)?;

    let sheet = workbook.add_worksheet();
    sheet.set_name("Transposed")?;
    fill_sheet(sheet, "Transposed", &table.transpose(), &header_format)?;

    workbook.save(path)?;
    Ok(())
}

/// Header on row 0, data below, autofilter over every data row.
///
/// Columns and rows beyond the sheet limits are left out with a warning.
fn fill_sheet(
    sheet: &mut Worksheet,
    name: &str,
    table: &Table,
    header_format: &Format,
) -> Result<(), XlsxError> {
    let columns = table.header.len().min(MAX_COLUMNS);
    let rows = table.rows.len().min(MAX_ROWS - 1);

    if columns < table.header.len() {
        warn!(
            sheet = name,
            columns = table.header.len(),
            kept = columns,
            "too many columns for one worksheet, sheet cut short"
        );
    }
    if rows < table.rows.len() {
        warn!(
            sheet = name,
            rows = table.rows.len(),
            kept = rows,
            "too many rows for one worksheet, sheet cut short"
        );
    }

    for (col, title) in table.header.iter().take(columns).enumerate() {
        sheet.write_string_with_format(0, col as u16, clip_cell(title), header_format)?;
    }

    for (row, values) in table.rows.iter().take(rows).enumerate() {
        for (col, value) in values.iter().take(columns).enumerate() {
            sheet.write_string(row as u32 + 1, col as u16, clip_cell(value))?;
        }
    }

    if columns > 0 && rows > 0 {
        sheet.autofilter(0, 0, rows as u32, (columns - 1) as u16)?;
    }

    Ok(())
}

/// Truncates `value` to the longest string one cell can hold.
fn clip_cell(value: &str) -> Cow<'_, str> {
    match value.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => {
            warn!(
                chars = value.chars().count(),
                kept = MAX_CELL_CHARS,
                "cell value too long, truncated"
            );
            Cow::Owned(value[..end].to_string())
        }
        None => Cow::Borrowed(value),
    }
}
