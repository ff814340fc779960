use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{error, info, warn};

use crate::domain::error::Result;
use crate::domain::release::UpdateCheck;
use crate::infrastructure::config::{BrowserSettings, Settings};
use crate::infrastructure::llm_clients::OpenAIClient;
use crate::infrastructure::playwright::{PlaywrightConfig, PlaywrightPrinter};
use crate::infrastructure::releases::GithubReleaseClient;
use crate::infrastructure::storage::{app_data_dir, ensure_dir};
use crate::interfaces::http::{add_log, LogEntry};
use crate::interfaces::state::AppState;

impl From<&BrowserSettings> for PlaywrightConfig {
    fn from(settings: &BrowserSettings) -> Self {
        Self {
            node_bin: settings.node_bin.clone(),
            script_path: settings.script_path.clone(),
            node_path: settings.node_path.clone(),
            viewport_width: settings.viewport_width,
            viewport_height: settings.viewport_height,
            load_wait_ms: settings.load_wait_ms,
            banner_wait_ms: settings.banner_wait_ms,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }
}

/// Wires the production clients into a shared `AppState`.
pub fn setup(settings: Settings) -> Result<Arc<AppState>> {
    let logs: Arc<Mutex<Vec<LogEntry>>> = Arc::new(Mutex::new(Vec::new()));

    let app_data_dir = app_data_dir();
    ensure_dir(&app_data_dir).map_err(|err| {
        error!(error = %err, app_data_dir = %app_data_dir.display(), "Failed to create app data dir");
        err
    })?;

    let printer = PlaywrightPrinter::new(
        PlaywrightConfig::from(&settings.browser),
        app_data_dir.clone(),
    );
    let releases = GithubReleaseClient::new(
        &settings.updates.api_base,
        &settings.updates.owner,
        &settings.updates.repo,
    );

    let state = AppState::new(
        settings,
        &app_data_dir,
        Arc::new(printer),
        Arc::new(OpenAIClient::new()),
        Arc::new(releases),
        logs.clone(),
    )?;

    add_log(
        &logs,
        "INFO",
        "Bootstrap",
        &format!("Templates at {}", state.templates.dir().display()),
    );
    info!(
        templates = %state.templates.dir().display(),
        output_root = %state.settings.output_root().display(),
        "Trace ready"
    );

    Ok(Arc::new(state))
}

/// Checks for a newer release in the background. Failures are logged and
/// otherwise ignored.
pub fn spawn_startup_update_check(state: Arc<AppState>) {
    if !state.settings.updates.check_on_startup {
        return;
    }
    tokio::spawn(async move {
        match state.update_use_case.check().await {
            Ok(UpdateCheck::Available { version, .. }) => {
                info!(version = %version, "Update available");
                add_log(
                    &state.logs,
                    "INFO",
                    "Updater",
                    &format!("Version {} is available", version),
                );
            }
            Ok(UpdateCheck::UpToDate { current_version }) => {
                info!(version = %current_version, "Trace is up to date");
            }
            Err(err) => {
                warn!(error = %err, "Startup update check failed");
                add_log(
                    &state.logs,
                    "WARN",
                    "Updater",
                    &format!("Update check failed: {}", err),
                );
            }
        }
    });
}
