// ============================================================
// TABULAR INPUT LAYER
// ============================================================
// Transaction exports: CSV with encoding fallback, or the first
// sheet of a workbook

mod csv_parser;
mod workbook_reader;

use std::path::Path;

use crate::domain::error::Result;
use crate::domain::transaction::RawTable;

pub use csv_parser::CsvParser;
pub use workbook_reader::read_first_sheet;

/// Loads a transaction export, choosing the reader by file extension.
pub fn load_table(path: &Path) -> Result<RawTable> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("xlsx") | Some("xlsm") | Some("xls") => read_first_sheet(path),
        _ => CsvParser::new().parse_file(path),
    }
}
