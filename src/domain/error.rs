use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AppError {
    Internal(String),
    NotFound(String),
    ValidationError(String),
    ParseError(String),
    LLMError(String),
    SecurityError(String),
    IoError(String),
    BrowserError(String),
    UpdateError(String),
}

impl AppError {
    /// The bare message without the category label, used for user-facing
    /// validation feedback.
    pub fn message(&self) -> &str {
        match self {
            AppError::Internal(msg)
            | AppError::NotFound(msg)
            | AppError::ValidationError(msg)
            | AppError::ParseError(msg)
            | AppError::LLMError(msg)
            | AppError::SecurityError(msg)
            | AppError::IoError(msg)
            | AppError::BrowserError(msg)
            | AppError::UpdateError(msg) => msg,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            AppError::LLMError(msg) => write!(f, "LLM error: {}", msg),
            AppError::SecurityError(msg) => write!(f, "Security error: {}", msg),
            AppError::IoError(msg) => write!(f, "IO error: {}", msg),
            AppError::BrowserError(msg) => write!(f, "Browser error: {}", msg),
            AppError::UpdateError(msg) => write!(f, "Update error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::IoError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
