// ============================================================
// WORKBOOK READER
// ============================================================
// First sheet of an .xlsx/.xls export as a RawTable

use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};

use crate::domain::error::{AppError, Result};
use crate::domain::transaction::RawTable;

pub fn read_first_sheet(path: &Path) -> Result<RawTable> {
    let mut workbook = open_workbook_auto(path).map_err(|e| {
        AppError::ParseError(format!("Failed to open workbook {}: {}", path.display(), e))
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::ParseError("No worksheet found in workbook".to_string()))?
        .map_err(|e| AppError::ParseError(format!("Failed to read worksheet: {}", e)))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .ok_or_else(|| AppError::ParseError("Workbook has no header row".to_string()))?
        .iter()
        .map(|cell| cell_text(cell).trim().to_lowercase())
        .collect();

    let rows = rows
        .map(|row| {
            (0..headers.len())
                .map(|idx| row.get(idx).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    Ok(RawTable { headers, rows })
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_datetime()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| cell.to_string()),
        Data::String(text) => text.trim().to_string(),
        other => other.to_string(),
    }
}
