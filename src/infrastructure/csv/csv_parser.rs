// ============================================================
// CSV PARSER
// ============================================================
// Read transaction exports into a RawTable with encoding fallback

use std::path::Path;

use csv::{ReaderBuilder, Trim};
use encoding_rs::WINDOWS_1252;

use crate::domain::error::{AppError, Result};
use crate::domain::transaction::RawTable;

/// CSV parser with encoding detection. Values are trimmed; the delimiter
/// is a comma unless the header line has none.
#[derive(Default)]
pub struct CsvParser;

impl CsvParser {
    pub fn new() -> Self {
        Self
    }

    pub fn parse_file(&self, path: &Path) -> Result<RawTable> {
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::IoError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let content = decode(&bytes);
        self.parse_content(&content)
    }

    /// Parses CSV text. Headers are trimmed and lower-cased; short rows are
    /// padded with empty cells.
    pub fn parse_content(&self, content: &str) -> Result<RawTable> {
        let header_line = content.lines().next().unwrap_or("");
        let delimiter = if header_line.contains(',') {
            b','
        } else {
            Self::detect_delimiter(content)
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(content.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| AppError::ParseError(format!("Failed to read CSV headers: {}", e)))?
            .iter()
            .map(|header| header.trim().to_lowercase())
            .collect();

        if headers.iter().all(|header| header.is_empty()) {
            return Err(AppError::ParseError("CSV file has no header row".to_string()));
        }

        let mut rows = Vec::new();
        for (index, result) in reader.records().enumerate() {
            let record = result.map_err(|e| {
                AppError::ParseError(format!("Failed to parse CSV row {}: {}", index + 1, e))
            })?;
            let row = (0..headers.len())
                .map(|idx| record.get(idx).unwrap_or("").to_string())
                .collect();
            rows.push(row);
        }

        Ok(RawTable { headers, rows })
    }

    /// Detect delimiter from content (comma, semicolon, tab, pipe)
    pub fn detect_delimiter(content: &str) -> u8 {
        let candidates = [b',', b';', b'\t', b'|'];
        let sample_lines: Vec<_> = content.lines().take(10).collect();
        if sample_lines.is_empty() {
            return b',';
        }

        let mut best_delimiter = b',';
        let mut best_score = 0.0f32;

        for &delimiter in &candidates {
            let field_counts: Vec<usize> = sample_lines
                .iter()
                .map(|line| line.bytes().filter(|&b| b == delimiter).count())
                .collect();

            // Score by consistency (low standard deviation) and frequency
            let avg = field_counts.iter().sum::<usize>() as f32 / field_counts.len() as f32;
            let variance = field_counts
                .iter()
                .map(|&x| (x as f32 - avg).powi(2))
                .sum::<f32>()
                / field_counts.len() as f32;
            let score = avg / (1.0 + variance.sqrt());

            if score > best_score {
                best_score = score;
                best_delimiter = delimiter;
            }
        }

        best_delimiter
    }
}

/// UTF-8 (BOM stripped) when valid, Windows-1252 otherwise.
fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text.into_owned()
        }
    }
}
