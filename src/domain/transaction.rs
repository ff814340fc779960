// ============================================================
// TRANSACTION DOMAIN
// ============================================================
// Normalized transaction rows, categories and report shapes.
// No I/O here.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const TEXT_COLUMNS: [&str; 8] = [
    "activity_state",
    "activity",
    "funding_type",
    "destination_type",
    "from_address",
    "destination",
    "blockchain",
    "to_currency",
];

pub const NUMERIC_COLUMNS: [&str; 2] = ["usd_value_updated", "original_currency_amount_updated"];

pub const DATE_COLUMN: &str = "create_date";

/// States whose rows are excluded from every aggregation.
pub const EXCLUDED_STATES: [&str; 2] = ["failed", "denied"];

/// Maximum rows kept in the per-destination and per-sender tables.
pub const TOP_COUNTERPARTIES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "onchainReceive")]
    OnchainReceive,
    #[serde(rename = "onchainSpend")]
    OnchainSpend,
    #[serde(rename = "incomingWire")]
    IncomingWire,
    #[serde(rename = "outgoingWire")]
    OutgoingWire,
    #[serde(rename = "other")]
    Other,
}

impl Category {
    /// Named categories in reporting order; `Other` is never summarized.
    pub const NAMED: [Category; 4] = [
        Category::OnchainReceive,
        Category::OnchainSpend,
        Category::IncomingWire,
        Category::OutgoingWire,
    ];

    pub fn classify(activity: &str, funding_type: &str) -> Category {
        match (activity, funding_type) {
            ("receive", "blockchain") => Category::OnchainReceive,
            ("spend", _) => Category::OnchainSpend,
            ("receive", "fiat_account") => Category::IncomingWire,
            ("eft_transfer", _) => Category::OutgoingWire,
            _ => Category::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::OnchainReceive => "onchainReceive",
            Category::OnchainSpend => "onchainSpend",
            Category::IncomingWire => "incomingWire",
            Category::OutgoingWire => "outgoingWire",
            Category::Other => "other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw table as loaded from disk: lower-cased headers and string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }
}

/// One transaction after type coercion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transaction {
    pub create_date: Option<NaiveDateTime>,
    pub activity_state: String,
    pub activity: String,
    pub funding_type: String,
    pub destination_type: String,
    pub from_address: String,
    pub destination: String,
    pub blockchain: String,
    pub to_currency: String,
    pub usd_value: f64,
    pub original_amount: f64,
}

impl Transaction {
    pub fn is_excluded(&self) -> bool {
        EXCLUDED_STATES.contains(&self.activity_state.as_str())
    }

    pub fn category(&self) -> Category {
        Category::classify(&self.activity, &self.funding_type)
    }

    /// USD value, or the original-currency amount when no USD value exists.
    pub fn amount(&self) -> f64 {
        if self.usd_value == 0.0 {
            self.original_amount
        } else {
            self.usd_value
        }
    }

    pub fn month_year(&self) -> Option<String> {
        self.create_date
            .map(|date| date.format("%Y-%m").to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterpartyStat {
    pub key: String,
    pub count: usize,
    pub total_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthCategoryStat {
    pub month_year: String,
    pub category: Category,
    pub count: usize,
    pub total_usd: f64,
    pub min_usd: f64,
    pub max_usd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainCategoryStat {
    pub blockchain: String,
    pub category: Category,
    pub count: usize,
    pub total_usd: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionReport {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub summary_lines: Vec<String>,
    pub destination_stats: Vec<CounterpartyStat>,
    pub from_address_stats: Vec<CounterpartyStat>,
    pub month_breakdown: Vec<MonthCategoryStat>,
    pub chain_breakdown: Vec<ChainCategoryStat>,
}

/// `$1,234.56` style formatting, sign after the dollar sign.
pub fn format_currency(value: f64) -> String {
    if !value.is_finite() {
        return "$0.00".to_string();
    }
    let fixed = format!("{:.2}", value.abs());
    let (whole, fraction) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, ch) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 { "-" } else { "" };
    format!("${}{}.{}", sign, grouped, fraction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_classify() {
        assert_eq!(Category::classify("receive", "blockchain"), Category::OnchainReceive);
        assert_eq!(Category::classify("spend", "card"), Category::OnchainSpend);
        assert_eq!(Category::classify("receive", "fiat_account"), Category::IncomingWire);
        assert_eq!(Category::classify("eft_transfer", ""), Category::OutgoingWire);
        assert_eq!(Category::classify("receive", "ach"), Category::Other);
        assert_eq!(Category::classify("", ""), Category::Other);
    }

    #[test]
    fn test_amount_falls_back_to_original_currency() {
        let mut tx = Transaction {
            usd_value: 0.0,
            original_amount: 2.5,
            ..Default::default()
        };
        assert_eq!(tx.amount(), 2.5);
        tx.usd_value = 100.0;
        assert_eq!(tx.amount(), 100.0);
    }

    #[test]
    fn test_month_year() {
        let tx = Transaction {
            create_date: NaiveDate::from_ymd_opt(2024, 3, 9)
                .and_then(|d| d.and_hms_opt(10, 0, 0)),
            ..Default::default()
        };
        assert_eq!(tx.month_year().as_deref(), Some("2024-03"));
        assert_eq!(Transaction::default().month_year(), None);
    }

    #[test]
    fn test_excluded_states() {
        let mut tx = Transaction::default();
        tx.activity_state = "failed".to_string();
        assert!(tx.is_excluded());
        tx.activity_state = "completed".to_string();
        assert!(!tx.is_excluded());
    }

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(999.999), "$1,000.00");
        assert_eq!(format_currency(1234567.891), "$1,234,567.89");
        assert_eq!(format_currency(-5.0), "$-5.00");
        assert_eq!(format_currency(f64::NAN), "$0.00");
    }
}
