// ============================================================
// DOCUMENT OUTPUT
// ============================================================
// Word, PDF and spreadsheet I/O for generated case files

pub mod docx;
pub mod pdf;
pub mod xlsx;

pub use docx::{read_docx_paragraphs, write_docx};
pub use xlsx::{write_workbook, Cell, SheetData};
