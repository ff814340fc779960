use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Placeholder keys understood by narrative templates, with their labels.
pub const PLACEHOLDERS: [(&str, &str); 5] = [
    ("customer_id", "Customer ID"),
    ("customer_name", "Customer Name"),
    ("start_date", "Start Date"),
    ("end_date", "End Date"),
    ("account_purpose", "Account Purpose"),
];

pub const TEMPLATE_FILE_PREFIX: &str = "template_";
pub const TEMPLATE_EXTENSION: &str = "txt";

static PLACEHOLDER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap());

/// Analyst-entered values substituted into a narrative template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, PartialEq)]
pub struct AlertFields {
    #[serde(default)]
    #[validate(length(min = 1, message = "Customer ID is required"))]
    pub customer_id: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Customer Name is required"))]
    pub customer_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Start Date is required"))]
    pub start_date: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "End Date is required"))]
    pub end_date: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "Account Purpose is required"))]
    pub account_purpose: String,
}

impl AlertFields {
    pub fn trimmed(&self) -> Self {
        Self {
            customer_id: self.customer_id.trim().to_string(),
            customer_name: self.customer_name.trim().to_string(),
            start_date: self.start_date.trim().to_string(),
            end_date: self.end_date.trim().to_string(),
            account_purpose: self.account_purpose.trim().to_string(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        match key {
            "customer_id" => Some(&self.customer_id),
            "customer_name" => Some(&self.customer_name),
            "start_date" => Some(&self.start_date),
            "end_date" => Some(&self.end_date),
            "account_purpose" => Some(&self.account_purpose),
            _ => None,
        }
    }

    /// Replaces every `{key}` token with its value. Unknown tokens are kept.
    pub fn fill(&self, template: &str) -> String {
        let mut filled = template.to_string();
        for (key, _) in PLACEHOLDERS {
            if let Some(value) = self.get(key) {
                filled = filled.replace(&format!("{{{}}}", key), value);
            }
        }
        filled
    }
}

/// One template file as listed to the analyst.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateEntry {
    pub display_name: String,
    /// File stem on disk, e.g. `template_03_Structuring`.
    pub full_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateDocument {
    pub display_name: String,
    pub full_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TemplatePreview {
    pub content: String,
    pub placeholders: Vec<String>,
    pub unknown_placeholders: Vec<String>,
}

/// Name shown for a stored template: the stem minus `template_<n>_`.
pub fn display_name(full_name: &str) -> String {
    if full_name.starts_with(TEMPLATE_FILE_PREFIX) {
        let parts: Vec<&str> = full_name.splitn(3, '_').collect();
        if parts.len() > 2 {
            return parts[2].to_string();
        }
    }
    full_name.to_string()
}

/// Ordering number taken from the second `_`-separated field of a stem.
pub fn template_number(full_name: &str) -> Option<i64> {
    full_name
        .split('_')
        .nth(1)
        .and_then(|part| part.trim().parse::<i64>().ok())
}

/// Lowest positive number not already taken.
pub fn next_template_number(existing: &[i64]) -> i64 {
    let mut next = 1;
    while existing.contains(&next) {
        next += 1;
    }
    next
}

pub fn numbered_name(number: i64, name: &str) -> String {
    format!("{}{:02}_{}", TEMPLATE_FILE_PREFIX, number, name)
}

/// Form label for a placeholder key, e.g. `Customer ID` for `customer_id`.
pub fn placeholder_label(key: &str) -> Option<&'static str> {
    PLACEHOLDERS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, label)| *label)
}

pub fn preview(content: &str) -> TemplatePreview {
    let mut placeholders = Vec::new();
    let mut unknown = Vec::new();
    for capture in PLACEHOLDER_PATTERN.captures_iter(content) {
        let key = capture[1].to_string();
        let known = placeholder_label(&key).is_some();
        let bucket = if known { &mut placeholders } else { &mut unknown };
        if !bucket.contains(&key) {
            bucket.push(key);
        }
    }
    TemplatePreview {
        content: content.to_string(),
        placeholders,
        unknown_placeholders: unknown,
    }
}
