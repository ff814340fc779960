//! Layered settings: built-in defaults, then `trace.toml`, then `TRACE_*`
//! environment variables (`__` separates nested keys, e.g.
//! `TRACE_CHAT__BASE_URL`). A `.env` file is read first when present.

use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMConfig;
use crate::infrastructure::security::keyring::KeyringManager;
use crate::infrastructure::storage;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "trace.toml";
pub const CONFIG_PATH_ENV: &str = "TRACE_CONFIG";
pub const KEYRING_SERVICE: &str = "Trace";
pub const CHAT_KEY_NAME: &str = "chat";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub case: CaseSettings,
    #[serde(default)]
    pub templates: TemplateSettings,
    #[serde(default)]
    pub chat: LLMConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
    #[serde(default)]
    pub updates: UpdateSettings,
    #[serde(default)]
    pub http: HttpSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaseSettings {
    /// Folder case directories are created under. Defaults to the Desktop.
    pub output_root: Option<PathBuf>,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateSettings {
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    pub node_bin: String,
    /// Print script to run; the bundled script is used when unset.
    pub script_path: Option<PathBuf>,
    /// Extra `NODE_PATH` so the script can resolve the `playwright` package.
    pub node_path: Option<PathBuf>,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub load_wait_ms: u64,
    pub banner_wait_ms: u64,
    pub timeout_secs: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            node_bin: "node".to_string(),
            script_path: None,
            node_path: None,
            viewport_width: 1920,
            viewport_height: 1080,
            load_wait_ms: 2000,
            banner_wait_ms: 1500,
            timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSettings {
    pub api_base: String,
    pub owner: String,
    pub repo: String,
    pub current_version: String,
    pub check_on_startup: bool,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            owner: "phamilton09".to_string(),
            repo: "Trace".to_string(),
            current_version: env!("CARGO_PKG_VERSION").to_string(),
            check_on_startup: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSettings {
    pub host: String,
    pub port: u16,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
        }
    }
}

impl Settings {
    pub fn figment(config_path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_path))
            .merge(Env::prefixed("TRACE_").split("__"))
    }

    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        debug!(config = %config_path.display(), "Loading settings");
        Self::figment(config_path)
            .extract()
            .map_err(|e| AppError::ValidationError(format!("Invalid configuration: {}", e)))
    }

    pub fn output_root(&self) -> PathBuf {
        self.case
            .output_root
            .clone()
            .unwrap_or_else(storage::default_output_root)
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.templates
            .dir
            .clone()
            .unwrap_or_else(|| storage::app_data_dir().join("alert_templates"))
    }
}

pub struct ConfigService {
    keyring: KeyringManager,
}

impl ConfigService {
    pub fn new() -> Self {
        Self {
            keyring: KeyringManager::new(KEYRING_SERVICE),
        }
    }

    pub fn save_api_key(&self, key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(AppError::ValidationError(
                "API key must not be empty".to_string(),
            ));
        }
        self.keyring.set_secret(CHAT_KEY_NAME, key.trim())
    }

    pub fn get_api_key(&self) -> Result<String> {
        self.keyring.get_secret(CHAT_KEY_NAME)
    }

    pub fn delete_api_key(&self) -> Result<()> {
        self.keyring.delete_secret(CHAT_KEY_NAME)
    }

    /// Chat settings with the bearer token filled in: configuration wins,
    /// the OS keyring is the fallback.
    pub fn resolve_chat_config(&self, settings: &Settings) -> LLMConfig {
        let mut config = settings.chat.clone();
        if config.api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
            let from_keyring = match self.get_api_key() {
                Ok(key) => Some(key),
                Err(err) => {
                    debug!(error = %err, "No chat API key in keyring");
                    None
                }
            };
            config = config.with_api_key(from_keyring);
        }
        config
    }
}

impl Default for ConfigService {
    fn default() -> Self {
        Self::new()
    }
}
