//! Command-line front-end. Every command goes through the same `AppState`
//! as the HTTP API.

use crate::domain::alert::{placeholder_label, preview, AlertFields};
use crate::domain::capture::CaptureReport;
use crate::domain::case::{CaseDraft, Tab, TabRunStatus, TabSelection};
use crate::domain::error::{AppError, Result};
use crate::domain::release::UpdateCheck;
use crate::infrastructure::bootstrap;
use crate::infrastructure::config::Settings;
use crate::interfaces::http::start_server;
use crate::interfaces::state::AppState;
use clap::{Parser, Subcommand};
use figment::providers::{Format, Toml};
use figment::Figment;
use serde::Deserialize;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "trace")]
#[command(version, about = "Investigation toolkit: page captures, customer summaries, alert narratives and transaction breakdowns")]
pub struct Cli {
    /// Settings file (default: trace.toml, or $TRACE_CONFIG)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Case prefix, e.g. CustomerID_Name
    #[arg(short, long, global = true)]
    pub prefix: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the local HTTP API
    Serve,
    /// Print web pages to PDF with a source banner
    Screenshots {
        urls: Vec<String>,
        /// Text file with one URL per line
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Ask the chat model for a customer summary
    Summary { customer_id: String },
    /// Manage narrative templates
    Templates {
        #[command(subcommand)]
        command: TemplateCommand,
    },
    /// Fill a template into a narrative document
    Alert {
        #[arg(long)]
        template: Option<String>,
        #[arg(long, default_value = "")]
        customer_id: String,
        #[arg(long, default_value = "")]
        customer_name: String,
        #[arg(long, default_value = "")]
        start_date: String,
        #[arg(long, default_value = "")]
        end_date: String,
        #[arg(long, default_value = "")]
        account_purpose: String,
    },
    /// Summarize a transaction export into a workbook
    Transactions { file: PathBuf },
    /// Run the tabs listed in a case file
    RunCase { case_file: PathBuf },
    /// Check for or download a newer release
    Update {
        #[command(subcommand)]
        command: UpdateCommand,
    },
    /// Store or remove the chat API key in the OS keyring
    ApiKey {
        #[command(subcommand)]
        command: ApiKeyCommand,
    },
    /// Show version information
    About,
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommand {
    List,
    Show { name: String },
    Save {
        name: String,
        /// File holding the template text
        #[arg(long)]
        file: PathBuf,
        /// Display name of the template being edited
        #[arg(long)]
        editing: Option<String>,
    },
    Delete { name: String },
    Preview { file: PathBuf },
}

#[derive(Subcommand, Debug)]
pub enum UpdateCommand {
    Check,
    Download {
        /// Asset name; the first non-checksum asset when omitted
        #[arg(long)]
        asset: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum ApiKeyCommand {
    /// Reads the key from stdin when not given
    Set { key: Option<String> },
    Delete,
}

/// Case file for `run-case`: prefix, tabs to run and their inputs.
#[derive(Debug, Deserialize)]
pub struct CaseFile {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub output_root: Option<PathBuf>,
    pub tabs: Vec<String>,
    #[serde(default)]
    pub draft: CaseDraft,
}

impl CaseFile {
    /// Loads the case file; a relative transaction path is taken relative
    /// to the case file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(AppError::NotFound(format!(
                "Case file not found: {}",
                path.display()
            )));
        }
        let mut case_file: CaseFile = Figment::from(Toml::file(path))
            .extract()
            .map_err(|e| AppError::ParseError(format!("Invalid case file: {}", e)))?;

        if let (Some(file), Some(base)) = (&case_file.draft.transactions_file, path.parent()) {
            if file.is_relative() {
                case_file.draft.transactions_file = Some(base.join(file));
            }
        }
        Ok(case_file)
    }

    pub fn selection(&self) -> Result<TabSelection> {
        self.tabs.iter().map(|tab| tab.parse::<Tab>()).collect()
    }
}

fn load_settings(cli: &Cli) -> Result<Settings> {
    match &cli.config {
        Some(path) => {
            let _ = dotenvy::dotenv();
            Settings::load_from(path)
        }
        None => Settings::load(),
    }
}

pub async fn execute(cli: Cli) -> Result<()> {
    let settings = load_settings(&cli)?;
    let state = bootstrap::setup(settings)?;
    if let Some(prefix) = &cli.prefix {
        state.session()?.case.set_prefix(prefix)?;
    }

    match cli.command {
        Command::Serve => serve(state).await,
        Command::Screenshots { urls, file } => screenshots(&state, urls, file).await,
        Command::Summary { customer_id } => {
            let case = state.case()?;
            let summary = state
                .summary_use_case
                .execute(&state.chat_config(), &case, &customer_id)
                .await?;
            println!("{}", summary.summary);
            println!("Saved {}", summary.path.display());
            Ok(())
        }
        Command::Templates { command } => templates(&state, command),
        Command::Alert {
            template,
            customer_id,
            customer_name,
            start_date,
            end_date,
            account_purpose,
        } => {
            let fields = AlertFields {
                customer_id,
                customer_name,
                start_date,
                end_date,
                account_purpose,
            };
            let narrative = state
                .alert_use_case
                .execute(&state.case()?, template.as_deref(), &fields)?;
            println!("Saved {}", narrative.path.display());
            Ok(())
        }
        Command::Transactions { file } => {
            let export = state
                .transaction_use_case
                .execute(&state.case()?, Some(&file))?;
            for line in &export.report.summary_lines {
                println!("{}", line);
            }
            println!("Saved {}", export.path.display());
            Ok(())
        }
        Command::RunCase { case_file } => run_case(&state, &case_file).await,
        Command::Update { command } => update(&state, command).await,
        Command::ApiKey { command } => api_key(&state, command),
        Command::About => {
            println!(
                "Trace {}\n{}",
                state.update_use_case.current_version(),
                env!("CARGO_PKG_DESCRIPTION")
            );
            Ok(())
        }
    }
}

async fn serve(state: Arc<AppState>) -> Result<()> {
    bootstrap::spawn_startup_update_check(state.clone());
    let address = format!("{}:{}", state.settings.http.host, state.settings.http.port);
    let server = start_server(state)
        .map_err(|e| AppError::IoError(format!("Failed to bind {}: {}", address, e)))?;
    info!(address = %address, "HTTP API listening");
    server.await?;
    Ok(())
}

async fn screenshots(state: &AppState, urls: Vec<String>, file: Option<PathBuf>) -> Result<()> {
    let mut text = urls.join("\n");
    if let Some(file) = file {
        text.push('\n');
        text.push_str(&std::fs::read_to_string(&file)?);
    }
    let report = state
        .screenshot_use_case
        .execute(&state.case()?, &text)
        .await?;
    for saved in &report.saved {
        println!("Saved {} ({} page(s))", saved.path.display(), saved.page_count);
    }
    for failed in &report.failed {
        eprintln!("Failed {}: {}", failed.url, failed.error);
    }
    ensure_any_saved(&report)
}

/// A batch where every URL failed is an error for the exit status.
fn ensure_any_saved(report: &CaptureReport) -> Result<()> {
    if report.saved.is_empty() {
        return Err(AppError::BrowserError(format!(
            "No pages were saved ({} URL(s) failed)",
            report.failed.len()
        )));
    }
    Ok(())
}

fn templates(state: &AppState, command: TemplateCommand) -> Result<()> {
    let store = &state.templates;
    match command {
        TemplateCommand::List => {
            for entry in store.list()? {
                println!("{}", entry.display_name);
            }
        }
        TemplateCommand::Show { name } => {
            println!("{}", store.load(&name)?.content);
        }
        TemplateCommand::Save {
            name,
            file,
            editing,
        } => {
            let content = std::fs::read_to_string(&file)?;
            let document = store.save(&name, &content, editing.as_deref())?;
            println!("Saved template '{}'", document.display_name);
        }
        TemplateCommand::Delete { name } => {
            let entry = store.delete(&name)?;
            println!("Deleted template '{}'", entry.display_name);
        }
        TemplateCommand::Preview { file } => {
            let preview = preview(&std::fs::read_to_string(&file)?);
            for key in &preview.placeholders {
                println!("{{{}}}  {}", key, placeholder_label(key).unwrap_or_default());
            }
            if !preview.unknown_placeholders.is_empty() {
                println!("Unknown: {}", preview.unknown_placeholders.join(", "));
            }
        }
    }
    Ok(())
}

async fn run_case(state: &AppState, case_file: &Path) -> Result<()> {
    let case_file = CaseFile::load(case_file)?;
    let selection = case_file.selection()?;
    {
        let mut session = state.session()?;
        if let Some(prefix) = &case_file.prefix {
            session.case.set_prefix(prefix)?;
        }
        if let Some(root) = &case_file.output_root {
            session.case.output_root = root.clone();
        }
        session.selection = selection;
        session.draft = case_file.draft;
    }

    let session = state.session_snapshot()?;
    let report = state
        .run_case_use_case
        .execute(
            &state.chat_config(),
            &session.case,
            &session.selection,
            &session.draft,
        )
        .await?;

    for outcome in &report.outcomes {
        let status = match outcome.status {
            TabRunStatus::Completed => "ok",
            TabRunStatus::Skipped => "skipped",
            TabRunStatus::Failed => "FAILED",
        };
        println!("[{}] {}: {}", status, outcome.tab.label(), outcome.message);
        for output in &outcome.outputs {
            println!("    {}", output.display());
        }
    }

    let failures = report.failures().count();
    if failures > 0 {
        return Err(AppError::Internal(format!(
            "{} tab(s) failed in run {}",
            failures, report.run_id
        )));
    }
    Ok(())
}

async fn update(state: &AppState, command: UpdateCommand) -> Result<()> {
    match command {
        UpdateCommand::Check => match state.update_use_case.check().await? {
            UpdateCheck::Available {
                version,
                release_notes,
                assets,
            } => {
                println!("Version {} is available", version);
                if !release_notes.trim().is_empty() {
                    println!("{}", release_notes.trim());
                }
                for asset in assets {
                    println!("  {}", asset.name);
                }
            }
            UpdateCheck::UpToDate { current_version } => {
                println!("Trace {} is up to date", current_version);
            }
        },
        UpdateCommand::Download { asset } => {
            let downloaded = state.update_use_case.download(asset.as_deref()).await?;
            println!(
                "Downloaded {} ({} bytes) to {}",
                downloaded.asset,
                downloaded.bytes,
                downloaded.path.display()
            );
            if !downloaded.verified {
                println!("No checksum was published; the download is unverified.");
            }
        }
    }
    Ok(())
}

fn api_key(state: &AppState, command: ApiKeyCommand) -> Result<()> {
    match command {
        ApiKeyCommand::Set { key } => {
            let key = match key {
                Some(key) => key,
                None => {
                    let mut line = String::new();
                    std::io::stdin().lock().read_line(&mut line)?;
                    line
                }
            };
            state.config_service.save_api_key(&key)?;
            println!("API key stored in the OS keyring");
        }
        ApiKeyCommand::Delete => {
            state.config_service.delete_api_key()?;
            println!("API key removed from the OS keyring");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_alert_with_global_prefix() {
        let cli = Cli::try_parse_from([
            "trace",
            "alert",
            "--template",
            "Structuring",
            "--customer-id",
            "42",
            "--prefix",
            "42_Jane",
        ])
        .unwrap();
        assert_eq!(cli.prefix.as_deref(), Some("42_Jane"));
        match cli.command {
            Command::Alert {
                template,
                customer_id,
                customer_name,
                ..
            } => {
                assert_eq!(template.as_deref(), Some("Structuring"));
                assert_eq!(customer_id, "42");
                assert_eq!(customer_name, "");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parses_nested_subcommands() {
        let cli = Cli::try_parse_from(["trace", "update", "download", "--asset", "trace.zip"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Update {
                command: UpdateCommand::Download { asset: Some(_) }
            }
        ));
        assert!(Cli::try_parse_from(["trace", "templates", "frobnicate"]).is_err());
    }

    #[test]
    fn test_case_file_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.toml");
        std::fs::write(
            &path,
            r#"
prefix = "123_Jane"
tabs = ["transactions", "1", "research"]

[draft]
urls = ["https://example.com"]
research_customer_id = "123"
transactions_file = "export.csv"

[draft.alert_fields]
customer_id = "123"
"#,
        )
        .unwrap();

        let case_file = CaseFile::load(&path).unwrap();
        assert_eq!(case_file.prefix.as_deref(), Some("123_Jane"));
        assert_eq!(
            case_file.draft.transactions_file,
            Some(dir.path().join("export.csv"))
        );
        assert_eq!(case_file.draft.alert_fields.customer_id, "123");

        let order: Vec<Tab> = case_file.selection().unwrap().iter().collect();
        assert_eq!(order, vec![Tab::Screenshots, Tab::Research, Tab::TransactionCsv]);
    }

    #[test]
    fn test_screenshot_batch_with_no_saved_pages_fails() {
        use crate::domain::capture::{FailedCapture, SavedCapture};

        let mut report = CaptureReport {
            failed: vec![FailedCapture {
                url: "https://timeout.example".to_string(),
                error: "Navigation timed out".to_string(),
            }],
            ..Default::default()
        };
        let err = ensure_any_saved(&report).unwrap_err();
        assert!(matches!(err, AppError::BrowserError(_)));

        report.saved.push(SavedCapture {
            url: "https://example.com".to_string(),
            final_url: "https://example.com/".to_string(),
            title: String::new(),
            path: PathBuf::from("out/example.com.pdf"),
            page_count: 1,
        });
        assert!(ensure_any_saved(&report).is_ok());
    }

    #[test]
    fn test_case_file_rejects_unknown_tab() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("case.toml");
        std::fs::write(&path, "tabs = [\"theme\"]\n").unwrap();
        let case_file = CaseFile::load(&path).unwrap();
        assert!(case_file.selection().is_err());
        assert!(CaseFile::load(&dir.path().join("missing.toml")).is_err());
    }
}
