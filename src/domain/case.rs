use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use super::alert::AlertFields;
use super::error::AppError;

/// Directory name used when no case prefix has been entered yet.
pub const DEFAULT_CASE_DIR: &str = "Investigation_File";

/// Shared naming state for one investigation: the analyst-entered
/// `CustomerID_Name` prefix and the root every case folder lives under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaseContext {
    pub prefix: String,
    pub output_root: PathBuf,
}

impl CaseContext {
    pub fn new(prefix: impl Into<String>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            output_root: output_root.into(),
        }
    }

    /// Sets the trimmed prefix. The prefix names a folder directly under the
    /// output root, so separators, `.`/`..` and absolute paths are rejected.
    pub fn set_prefix(&mut self, prefix: &str) -> Result<(), AppError> {
        let prefix = prefix.trim();
        if !prefix.is_empty() && !is_single_folder(prefix) {
            return Err(AppError::ValidationError(
                "Case prefix cannot contain path separators or '..'.".to_string(),
            ));
        }
        self.prefix = prefix.to_string();
        Ok(())
    }

    /// Trimmed prefix, or `""` when it is unset or would leave the output
    /// root.
    fn folder_prefix(&self) -> &str {
        let prefix = self.prefix.trim();
        if is_single_folder(prefix) {
            prefix
        } else {
            ""
        }
    }

    /// Prefix prepended to every generated file name, `""` when unset.
    pub fn file_prefix(&self) -> String {
        match self.folder_prefix() {
            "" => String::new(),
            prefix => format!("{}_", prefix),
        }
    }

    pub fn investigation_dir(&self) -> PathBuf {
        match self.folder_prefix() {
            "" => self.output_root.join(DEFAULT_CASE_DIR),
            prefix => self.output_root.join(prefix),
        }
    }

    /// Path of an output file inside the investigation directory, with the
    /// case prefix applied.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        self.investigation_dir()
            .join(format!("{}{}", self.file_prefix(), file_name))
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }
}

fn is_single_folder(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !name.contains(['/', '\\'])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Screenshots,
    Research,
    AlertTemplates,
    TransactionCsv,
}

impl Tab {
    pub const ALL: [Tab; 4] = [
        Tab::Screenshots,
        Tab::Research,
        Tab::AlertTemplates,
        Tab::TransactionCsv,
    ];

    pub fn index(self) -> usize {
        match self {
            Tab::Screenshots => 0,
            Tab::Research => 1,
            Tab::AlertTemplates => 2,
            Tab::TransactionCsv => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Tab> {
        Tab::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Screenshots => "1) Screenshots to PDF",
            Tab::Research => "2) Research",
            Tab::AlertTemplates => "3) Alert Templates",
            Tab::TransactionCsv => "4) Transaction CSV",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tab::Screenshots => "screenshots",
            Tab::Research => "research",
            Tab::AlertTemplates => "alert_templates",
            Tab::TransactionCsv => "transaction_csv",
        };
        f.write_str(name)
    }
}

impl FromStr for Tab {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase().replace('-', "_");
        if let Ok(index) = normalized.parse::<usize>() {
            // Tabs are numbered from 1 in their labels.
            return index
                .checked_sub(1)
                .and_then(Tab::from_index)
                .ok_or_else(|| AppError::NotFound(format!("No tab numbered {}", index)));
        }
        match normalized.as_str() {
            "screenshots" | "screenshots_to_pdf" | "pdf" => Ok(Tab::Screenshots),
            "research" | "summary" => Ok(Tab::Research),
            "alert_templates" | "alerts" | "alert" => Ok(Tab::AlertTemplates),
            "transaction_csv" | "transactions" | "csv" => Ok(Tab::TransactionCsv),
            other => Err(AppError::NotFound(format!("Unknown tab '{}'", other))),
        }
    }
}

/// Tabs marked for "Run Case". Iteration follows tab order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabSelection {
    selected: BTreeSet<Tab>,
}

impl TabSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flips the selection state of `tab` and returns whether it is now
    /// selected.
    pub fn toggle(&mut self, tab: Tab) -> bool {
        if self.selected.remove(&tab) {
            false
        } else {
            self.selected.insert(tab);
            true
        }
    }

    pub fn is_selected(&self, tab: Tab) -> bool {
        self.selected.contains(&tab)
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Tab> + '_ {
        self.selected.iter().copied()
    }

    /// Tab label as shown in the tab strip, starred when selected.
    pub fn display_label(&self, tab: Tab) -> String {
        if self.is_selected(tab) {
            format!("★ {}", tab.label())
        } else {
            tab.label().to_string()
        }
    }
}

impl FromIterator<Tab> for TabSelection {
    fn from_iter<I: IntoIterator<Item = Tab>>(iter: I) -> Self {
        Self {
            selected: iter.into_iter().collect(),
        }
    }
}

/// Per-tab inputs, replayed by "Run Case".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseDraft {
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default)]
    pub research_customer_id: String,
    #[serde(default)]
    pub alert_template: Option<String>,
    #[serde(default)]
    pub alert_fields: AlertFields,
    #[serde(default)]
    pub transactions_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum TabRunStatus {
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabRunOutcome {
    pub tab: Tab,
    pub status: TabRunStatus,
    pub message: String,
    #[serde(default)]
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRunReport {
    pub run_id: String,
    pub investigation_dir: PathBuf,
    pub outcomes: Vec<TabRunOutcome>,
}

impl CaseRunReport {
    pub fn failures(&self) -> impl Iterator<Item = &TabRunOutcome> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == TabRunStatus::Failed)
    }
}
