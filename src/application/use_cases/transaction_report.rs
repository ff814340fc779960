// ============================================================
// TRANSACTION REPORT
// ============================================================
// Normalize an exported transaction table, categorize rows and
// write the multi-sheet breakdown workbook.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::case::CaseContext;
use crate::domain::error::{AppError, Result};
use crate::domain::transaction::{
    format_currency, Category, ChainCategoryStat, CounterpartyStat, MonthCategoryStat, RawTable,
    Transaction, TransactionReport, DATE_COLUMN, NUMERIC_COLUMNS, TEXT_COLUMNS,
    TOP_COUNTERPARTIES,
};
use crate::infrastructure::csv::load_table;
use crate::infrastructure::documents::{write_workbook, Cell, SheetData};
use crate::infrastructure::storage::ensure_investigation_dir;

#[derive(Debug, Clone, Serialize)]
pub struct TransactionExport {
    pub path: PathBuf,
    pub report: TransactionReport,
}

pub struct TransactionReportUseCase;

impl TransactionReportUseCase {
    pub fn new() -> Self {
        Self
    }

    pub fn execute(&self, case: &CaseContext, input: Option<&Path>) -> Result<TransactionExport> {
        let input = input.ok_or_else(|| {
            AppError::ValidationError("Please upload a CSV file before running.".to_string())
        })?;

        info!(input = %input.display(), "Processing transactions");
        let table = load_table(input)?;
        let report = build_report(&table);
        let sheets = build_sheets(&table, &report);

        ensure_investigation_dir(case)?;
        let path = case.output_path("Transactions.xlsx");
        write_workbook(&path, &sheets)?;

        info!(
            rows = report.total_rows,
            valid = report.valid_rows,
            path = %path.display(),
            "Saved transaction summary"
        );
        Ok(TransactionExport { path, report })
    }
}

impl Default for TransactionReportUseCase {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================
// NORMALIZATION
// ============================================================

const DATETIME_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%d-%b-%Y %H:%M:%S",
];

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%d-%b-%Y"];

const ZONED_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f %z",
    "%Y-%m-%d %H:%M:%S%.f%z",
];

/// Lenient timestamp parsing. Offsets are dropped and the wall-clock time
/// kept.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.naive_local());
    }
    for format in ZONED_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(value, format) {
            return Some(parsed.naive_local());
        }
    }

    let value = value
        .strip_suffix(" UTC")
        .or_else(|| value.strip_suffix('Z'))
        .unwrap_or(value);
    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Some(parsed);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDate::parse_from_str(value, format) {
            return parsed.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Numeric cell to f64; thousands separators and `$` are ignored and
/// anything unparseable counts as zero.
pub fn parse_amount(value: &str) -> f64 {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != ',' && *c != '$' && !c.is_whitespace())
        .collect();
    match cleaned.parse::<f64>() {
        Ok(number) if number.is_finite() => number,
        _ => 0.0,
    }
}

struct Columns {
    date: Option<usize>,
    text: [Option<usize>; 8],
    numeric: [Option<usize>; 2],
}

impl Columns {
    fn locate(table: &RawTable) -> Self {
        Self {
            date: table.column_index(DATE_COLUMN),
            text: TEXT_COLUMNS.map(|name| table.column_index(name)),
            numeric: NUMERIC_COLUMNS.map(|name| table.column_index(name)),
        }
    }
}

fn cell<'a>(row: &'a [String], index: Option<usize>) -> &'a str {
    index
        .and_then(|idx| row.get(idx))
        .map(String::as_str)
        .unwrap_or("")
}

fn normalize_row(row: &[String], columns: &Columns) -> Transaction {
    let text = |slot: usize| cell(row, columns.text[slot]).to_lowercase();
    Transaction {
        create_date: parse_date(cell(row, columns.date)),
        activity_state: text(0),
        activity: text(1),
        funding_type: text(2),
        destination_type: text(3),
        from_address: text(4),
        destination: text(5),
        blockchain: text(6),
        to_currency: text(7),
        usd_value: parse_amount(cell(row, columns.numeric[0])),
        original_amount: parse_amount(cell(row, columns.numeric[1])),
    }
}

/// Every row of the table, type-coerced.
pub fn normalize(table: &RawTable) -> Vec<Transaction> {
    let columns = Columns::locate(table);
    table
        .rows
        .iter()
        .map(|row| normalize_row(row, &columns))
        .collect()
}

// ============================================================
// AGGREGATION
// ============================================================

#[derive(Default)]
struct Totals {
    count: usize,
    total: f64,
    min: f64,
    max: f64,
}

impl Totals {
    fn add(&mut self, amount: f64) {
        if self.count == 0 {
            self.min = amount;
            self.max = amount;
        } else {
            self.min = self.min.min(amount);
            self.max = self.max.max(amount);
        }
        self.count += 1;
        self.total += amount;
    }
}

fn summary_lines(rows: &[&Transaction], has_activity: bool) -> Vec<String> {
    let mut lines = Vec::new();

    for category in Category::NAMED {
        let matching: Vec<&&Transaction> =
            rows.iter().filter(|tx| tx.category() == category).collect();
        if matching.is_empty() {
            continue;
        }
        let total: f64 = matching.iter().map(|tx| tx.amount()).sum();
        let dates: Vec<NaiveDateTime> = matching.iter().filter_map(|tx| tx.create_date).collect();
        let line = match (dates.iter().min(), dates.iter().max()) {
            (Some(first), Some(last)) => format!(
                "{} {} transactions totaling {}, from {} to {}.",
                matching.len(),
                category,
                format_currency(total),
                first.date(),
                last.date()
            ),
            _ => format!(
                "{} {} transactions totaling {}.",
                matching.len(),
                category,
                format_currency(total)
            ),
        };
        lines.push(line);
    }

    if has_activity {
        let mut order: Vec<&str> = Vec::new();
        let mut totals: HashMap<&str, Totals> = HashMap::new();
        for tx in rows {
            let activity = tx.activity.as_str();
            if !totals.contains_key(activity) {
                order.push(activity);
            }
            totals.entry(activity).or_default().add(tx.amount());
        }
        for activity in order {
            if let Some(stat) = totals.get(activity) {
                lines.push(format!(
                    "{} '{}' transactions totaling {}.",
                    stat.count,
                    activity,
                    format_currency(stat.total)
                ));
            }
        }
    }

    lines
}

/// Groups by key, then keeps the largest totals. Ties keep key order.
fn top_counterparties<'a, I>(keys: I) -> Vec<CounterpartyStat>
where
    I: Iterator<Item = (&'a str, f64)>,
{
    let mut grouped: BTreeMap<&str, Totals> = BTreeMap::new();
    for (key, amount) in keys {
        grouped.entry(key).or_default().add(amount);
    }
    let mut stats: Vec<CounterpartyStat> = grouped
        .into_iter()
        .map(|(key, totals)| CounterpartyStat {
            key: key.to_string(),
            count: totals.count,
            total_usd: totals.total,
        })
        .collect();
    stats.sort_by(|a, b| b.total_usd.total_cmp(&a.total_usd));
    stats.truncate(TOP_COUNTERPARTIES);
    stats
}

/// Aggregates a loaded table. Columns the export lacks leave the
/// dependent breakdown empty.
pub fn build_report(table: &RawTable) -> TransactionReport {
    let transactions = normalize(table);
    let valid: Vec<&Transaction> = transactions.iter().filter(|tx| !tx.is_excluded()).collect();
    debug!(
        total = transactions.len(),
        valid = valid.len(),
        "Filtered failed and denied rows"
    );

    let destination_stats = if table.has_column("destination_type") && table.has_column("destination")
    {
        top_counterparties(
            valid
                .iter()
                .filter(|tx| tx.destination_type == "blockchain")
                .map(|tx| (tx.destination.as_str(), tx.amount())),
        )
    } else {
        Vec::new()
    };

    let from_address_stats = if table.has_column("from_address") {
        top_counterparties(
            valid
                .iter()
                .filter(|tx| !tx.from_address.is_empty() && tx.from_address != "null")
                .map(|tx| (tx.from_address.as_str(), tx.amount())),
        )
    } else {
        Vec::new()
    };

    let mut by_month: BTreeMap<(String, &'static str), (Category, Totals)> = BTreeMap::new();
    for tx in &valid {
        if let Some(month_year) = tx.month_year() {
            let category = tx.category();
            by_month
                .entry((month_year, category.as_str()))
                .or_insert_with(|| (category, Totals::default()))
                .1
                .add(tx.amount());
        }
    }
    let month_breakdown = by_month
        .into_iter()
        .map(|((month_year, _), (category, totals))| MonthCategoryStat {
            month_year,
            category,
            count: totals.count,
            total_usd: totals.total,
            min_usd: totals.min,
            max_usd: totals.max,
        })
        .collect();

    let chain_breakdown = if table.has_column("blockchain") {
        let mut by_chain: BTreeMap<(&str, &'static str), (Category, Totals)> = BTreeMap::new();
        for tx in &valid {
            let category = tx.category();
            by_chain
                .entry((tx.blockchain.as_str(), category.as_str()))
                .or_insert_with(|| (category, Totals::default()))
                .1
                .add(tx.amount());
        }
        by_chain
            .into_iter()
            .map(|((blockchain, _), (category, totals))| ChainCategoryStat {
                blockchain: blockchain.to_string(),
                category,
                count: totals.count,
                total_usd: totals.total,
            })
            .collect()
    } else {
        Vec::new()
    };

    TransactionReport {
        total_rows: transactions.len(),
        valid_rows: valid.len(),
        summary_lines: summary_lines(&valid, table.has_column("activity")),
        destination_stats,
        from_address_stats,
        month_breakdown,
        chain_breakdown,
    }
}

// ============================================================
// WORKBOOK LAYOUT
// ============================================================

fn counterparty_sheet(name: &str, key_header: &str, stats: &[CounterpartyStat]) -> SheetData {
    let mut sheet = SheetData::new(name, &[key_header, "Count", "Total_USD"]);
    for stat in stats {
        sheet.push_row(vec![
            Cell::from(stat.key.as_str()),
            Cell::from(stat.count),
            Cell::from(stat.total_usd),
        ]);
    }
    sheet
}

fn raw_sheet(table: &RawTable) -> SheetData {
    let headers: Vec<&str> = table.headers.iter().map(String::as_str).collect();
    let mut sheet = SheetData::new("Raw Transactions", &headers);

    for row in &table.rows {
        let cells = table
            .headers
            .iter()
            .zip(row)
            .map(|(header, value)| {
                if header == DATE_COLUMN {
                    parse_date(value)
                        .map(|date| Cell::from(date.format("%Y-%m-%d %H:%M:%S").to_string()))
                        .unwrap_or(Cell::Empty)
                } else if NUMERIC_COLUMNS.contains(&header.as_str()) {
                    Cell::from(parse_amount(value))
                } else if TEXT_COLUMNS.contains(&header.as_str()) {
                    Cell::from(value.to_lowercase())
                } else {
                    Cell::from(value.as_str())
                }
            })
            .collect();
        sheet.push_row(cells);
    }
    sheet
}

/// Sheets in workbook order. `Summary` and `Raw Transactions` are always
/// present; the breakdowns only when they have rows.
pub fn build_sheets(table: &RawTable, report: &TransactionReport) -> Vec<SheetData> {
    let mut sheets = Vec::new();

    let mut summary = SheetData::new("Summary", &["Summary"]);
    for line in &report.summary_lines {
        summary.push_row(vec![Cell::from(line.as_str())]);
    }
    sheets.push(summary);

    if !report.destination_stats.is_empty() {
        sheets.push(counterparty_sheet(
            "Destination Blockchain",
            "destination",
            &report.destination_stats,
        ));
    }
    if !report.from_address_stats.is_empty() {
        sheets.push(counterparty_sheet(
            "From Address",
            "from_address",
            &report.from_address_stats,
        ));
    }

    if !report.month_breakdown.is_empty() {
        let mut sheet = SheetData::new(
            "Month-Year Breakdown",
            &["month_year", "category", "Count", "Total_USD", "Min_USD", "Max_USD"],
        );
        for stat in &report.month_breakdown {
            sheet.push_row(vec![
                Cell::from(stat.month_year.as_str()),
                Cell::from(stat.category.as_str()),
                Cell::from(stat.count),
                Cell::from(stat.total_usd),
                Cell::from(stat.min_usd),
                Cell::from(stat.max_usd),
            ]);
        }
        sheets.push(sheet);
    }

    if !report.chain_breakdown.is_empty() {
        let mut sheet = SheetData::new(
            "Blockchain by Type",
            &["blockchain", "category", "Count", "Total_USD"],
        );
        for stat in &report.chain_breakdown {
            sheet.push_row(vec![
                Cell::from(stat.blockchain.as_str()),
                Cell::from(stat.category.as_str()),
                Cell::from(stat.count),
                Cell::from(stat.total_usd),
            ]);
        }
        sheets.push(sheet);
    }

    sheets.push(raw_sheet(table));
    sheets
}
