use crate::domain::error::{AppError, Result};
use rust_xlsxwriter::{Format, Workbook, Worksheet, XlsxError};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value.to_string())
        }
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<usize> for Cell {
    fn from(value: usize) -> Self {
        Cell::Number(value as f64)
    }
}

/// One worksheet: a bold header row followed by data rows.
#[derive(Debug, Clone, Default)]
pub struct SheetData {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl SheetData {
    pub fn new(name: &str, headers: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Cell>) {
        self.rows.push(row);
    }
}

fn xlsx_err(path: &Path) -> impl Fn(XlsxError) -> AppError + '_ {
    move |e| AppError::IoError(format!("Failed to write {}: {}", path.display(), e))
}

fn build_sheet(sheet: &SheetData, header_format: &Format) -> std::result::Result<Worksheet, XlsxError> {
    let mut worksheet = Worksheet::new();
    worksheet.set_name(&sheet.name)?;

    for (col, header) in sheet.headers.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, header.as_str(), header_format)?;
    }

    for (row_idx, row) in sheet.rows.iter().enumerate() {
        let excel_row = row_idx as u32 + 1;
        for (col, cell) in row.iter().enumerate() {
            match cell {
                Cell::Text(text) => {
                    worksheet.write_string(excel_row, col as u16, text.as_str())?;
                }
                Cell::Number(number) if number.is_finite() => {
                    worksheet.write_number(excel_row, col as u16, *number)?;
                }
                Cell::Number(_) | Cell::Empty => {}
            }
        }
    }

    Ok(worksheet)
}

/// Writes all sheets, in order, into a new workbook at `path`.
pub fn write_workbook(path: &Path, sheets: &[SheetData]) -> Result<()> {
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    for sheet in sheets {
        let worksheet = build_sheet(sheet, &header_format).map_err(xlsx_err(path))?;
        workbook.push_worksheet(worksheet);
    }

    workbook.save(path).map_err(xlsx_err(path))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto, Reader};

    #[test]
    fn test_written_workbook_has_sheets_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.xlsx");

        let mut summary = SheetData::new("Summary", &["Summary"]);
        summary.push_row(vec![Cell::from("2 onchainSpend transactions totaling $30.00.")]);
        let mut stats = SheetData::new("From Address", &["from_address", "Count", "Total_USD"]);
        stats.push_row(vec![Cell::from("0xabc"), Cell::from(2usize), Cell::from(30.0)]);

        write_workbook(&path, &[summary, stats]).unwrap();

        let mut workbook = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["Summary", "From Address"]);
        let range = workbook.worksheet_range("From Address").unwrap();
        assert_eq!(range.get_size(), (2, 3));
    }

    #[test]
    fn test_empty_strings_become_empty_cells() {
        assert_eq!(Cell::from(""), Cell::Empty);
        assert_eq!(Cell::from(String::new()), Cell::Empty);
    }
}
