//! Playwright subprocess wrapper that prints a web page to PDF.
//!
//! The Node.js script in `scripts/playwright-pdf.js` does the browser work;
//! this module hands it a JSON job, relays its progress lines to the log
//! and decodes the base64 PDF it returns.

use crate::domain::capture::{PdfPageSetup, BANNER_STYLE};
use crate::domain::error::{AppError, Result};
use crate::infrastructure::storage;
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

const BUNDLED_SCRIPT: &str = include_str!("../../../scripts/playwright-pdf.js");
const BUNDLED_SCRIPT_NAME: &str = "playwright-pdf.js";
const RESULT_MARKER: &str = "---RESULT---";

/// Configuration for Playwright printing
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub node_bin: String,
    /// Explicit script; the bundled one is written to the app data dir when unset.
    pub script_path: Option<PathBuf>,
    pub node_path: Option<PathBuf>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// Settle time after navigation, before the banner is injected.
    pub load_wait_ms: u64,
    /// Settle time after the banner, before printing.
    pub banner_wait_ms: u64,
    pub timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            node_bin: "node".to_string(),
            script_path: None,
            node_path: None,
            viewport_width: 1920,
            viewport_height: 1080,
            load_wait_ms: 2000,
            banner_wait_ms: 1500,
            timeout: Duration::from_secs(90),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrintJob<'a> {
    url: &'a str,
    banner_text: String,
    banner_style: crate::domain::capture::BannerStyle,
    page_setup: &'a PdfPageSetup,
    viewport_width: u32,
    viewport_height: u32,
    load_wait_ms: u64,
    banner_wait_ms: u64,
    timeout_ms: u64,
}

/// Progress status from the print process
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PrintProgress {
    Navigating { url: String },
    Banner { text: String },
    Printing {},
    Complete { bytes: usize },
}

#[derive(Debug, Deserialize)]
struct PrintResult {
    url: String,
    #[serde(default)]
    title: String,
    data: String,
}

/// A page rendered to PDF.
#[derive(Debug, Clone)]
pub struct PrintedPage {
    pub final_url: String,
    pub title: String,
    pub pdf: Vec<u8>,
}

#[async_trait]
pub trait PagePrinter {
    /// Checks the printer can run at all before a batch starts.
    async fn preflight(&self) -> Result<()>;

    async fn print_pdf(&self, url: &str, setup: &PdfPageSetup) -> Result<PrintedPage>;
}

pub struct PlaywrightPrinter {
    config: PlaywrightConfig,
    app_data_dir: PathBuf,
}

impl PlaywrightPrinter {
    pub fn new(config: PlaywrightConfig, app_data_dir: PathBuf) -> Self {
        Self {
            config,
            app_data_dir,
        }
    }

    /// Check if Node.js is available
    pub async fn check_nodejs(&self) -> Result<String> {
        let output = Command::new(&self.config.node_bin)
            .arg("--version")
            .output()
            .await
            .map_err(|e| {
                AppError::BrowserError(format!(
                    "Node.js not found ({}). Install Node.js and Playwright to capture pages: {}",
                    self.config.node_bin, e
                ))
            })?;

        if !output.status.success() {
            return Err(AppError::BrowserError(
                "Failed to get Node.js version".to_string(),
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Path of the print script, writing the bundled copy out if needed.
    pub fn resolve_script(&self) -> Result<PathBuf> {
        if let Some(path) = &self.config.script_path {
            if !path.exists() {
                return Err(AppError::BrowserError(format!(
                    "Playwright print script not found at: {}",
                    path.display()
                )));
            }
            return Ok(path.clone());
        }

        let scripts_dir = storage::ensure_scripts_dir(&self.app_data_dir)?;
        let path = scripts_dir.join(BUNDLED_SCRIPT_NAME);
        let current = std::fs::read_to_string(&path).unwrap_or_default();
        if current != BUNDLED_SCRIPT {
            std::fs::write(&path, BUNDLED_SCRIPT)?;
            debug!(script = %path.display(), "Wrote bundled print script");
        }
        Ok(path)
    }

    fn build_job<'a>(&self, url: &'a str, setup: &'a PdfPageSetup) -> PrintJob<'a> {
        PrintJob {
            url,
            banner_text: format!("Source URL: {}", url),
            banner_style: BANNER_STYLE,
            page_setup: setup,
            viewport_width: self.config.viewport_width,
            viewport_height: self.config.viewport_height,
            load_wait_ms: self.config.load_wait_ms,
            banner_wait_ms: self.config.banner_wait_ms,
            timeout_ms: self.config.timeout.as_millis() as u64,
        }
    }

    async fn run_script(&self, script: &Path, job_json: &str) -> Result<std::process::Output> {
        let mut command = Command::new(&self.config.node_bin);
        command
            .arg(script)
            .arg(job_json)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(node_path) = &self.config.node_path {
            command.env("NODE_PATH", node_path);
        }

        // Allow for both settle delays on top of the navigation timeout.
        let budget = self.config.timeout
            + Duration::from_millis(self.config.load_wait_ms + self.config.banner_wait_ms)
            + Duration::from_secs(15);

        tokio::time::timeout(budget, command.output())
            .await
            .map_err(|_| {
                AppError::BrowserError(format!(
                    "Playwright print timed out after {}s",
                    budget.as_secs()
                ))
            })?
            .map_err(|e| AppError::BrowserError(format!("Failed to run playwright print: {}", e)))
    }
}

/// Logs progress lines and returns the payload after the result marker.
fn parse_script_output(stdout: &str) -> Result<PrintResult> {
    let (progress, result) = stdout.split_once(RESULT_MARKER).ok_or_else(|| {
        AppError::BrowserError("No result JSON found in playwright output".to_string())
    })?;

    for line in progress.lines().filter(|line| line.starts_with('{')) {
        if let Ok(event) = serde_json::from_str::<PrintProgress>(line) {
            debug!(?event, "Playwright progress");
        }
    }

    serde_json::from_str(result.trim()).map_err(|e| {
        AppError::BrowserError(format!("Failed to parse print result: {}", e))
    })
}

#[async_trait]
impl PagePrinter for PlaywrightPrinter {
    async fn preflight(&self) -> Result<()> {
        let version = self.check_nodejs().await?;
        let script = self.resolve_script()?;
        info!(node = %version, script = %script.display(), "Playwright printer ready");
        Ok(())
    }

    async fn print_pdf(&self, url: &str, setup: &PdfPageSetup) -> Result<PrintedPage> {
        let script = self.resolve_script()?;
        let job = serde_json::to_string(&self.build_job(url, setup))
            .map_err(|e| AppError::Internal(format!("Failed to encode print job: {}", e)))?;

        let output = self.run_script(&script, &job).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            let error_msg = if !stderr.trim().is_empty() {
                stderr.trim().to_string()
            } else {
                stdout.trim().to_string()
            };
            return Err(AppError::BrowserError(format!(
                "Playwright print failed: {}",
                error_msg
            )));
        }

        let result = parse_script_output(&stdout)?;
        let pdf = base64::engine::general_purpose::STANDARD
            .decode(result.data.trim())
            .map_err(|e| AppError::BrowserError(format!("Invalid PDF payload: {}", e)))?;

        Ok(PrintedPage {
            final_url: result.url,
            title: result.title,
            pdf,
        })
    }
}
