use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "wordbank.toml";
pub const DEFAULT_DATA_FILE: &str = "words_data.json";
pub const DEFAULT_BACKUP_DIR: &str = "backups";
pub const DEFAULT_PROGRESS_FILE: &str = "fetch_progress.json";
pub const DEFAULT_LOG_FILE: &str = "wordbank.log";

pub const DEFAULT_API_URL: &str = "https://api.dictionaryapi.dev/api/v2/entries/en";
pub const DEFAULT_USER_AGENT: &str = "wordbank/0.1 (word game definition tooling)";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RATE_LIMIT_MS: u64 = 1_500;

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ToolConfig {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub api: ApiSection,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct StoreSection {
    pub data_file: Option<String>,
    pub backup_dir: Option<String>,
    pub progress_file: Option<String>,
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct ApiSection {
    pub url: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_ms: Option<u64>,
    pub rate_limit_ms: Option<u64>,
}

/// Resolved file locations for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    pub data_file: PathBuf,
    pub backup_dir: PathBuf,
    pub progress_file: PathBuf,
    pub log_file: PathBuf,
}

/// Resolved dictionary API settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub url: String,
    pub user_agent: String,
    pub timeout: Duration,
    pub rate_limit: Duration,
}

impl ToolConfig {
    /// Resolve file paths: flag > env > config > default.
    pub fn store_paths(&self, data_file_override: Option<&Path>) -> StorePaths {
        let data_file = match data_file_override {
            Some(path) => path.to_path_buf(),
            None => PathBuf::from(self.resolve(
                "WORDBANK_DATA_FILE",
                self.store.data_file.as_deref(),
                DEFAULT_DATA_FILE,
            )),
        };
        StorePaths {
            data_file,
            backup_dir: PathBuf::from(self.resolve(
                "WORDBANK_BACKUP_DIR",
                self.store.backup_dir.as_deref(),
                DEFAULT_BACKUP_DIR,
            )),
            progress_file: PathBuf::from(self.resolve(
                "WORDBANK_PROGRESS_FILE",
                self.store.progress_file.as_deref(),
                DEFAULT_PROGRESS_FILE,
            )),
            log_file: PathBuf::from(self.resolve(
                "WORDBANK_LOG_FILE",
                self.store.log_file.as_deref(),
                DEFAULT_LOG_FILE,
            )),
        }
    }

    /// Resolve API settings: env > config > default.
    pub fn api_settings(&self) -> ApiSettings {
        let timeout_ms = env_u64("WORDBANK_HTTP_TIMEOUT_MS")
            .or(self.api.timeout_ms)
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        let rate_limit_ms = env_u64("WORDBANK_RATE_LIMIT_MS")
            .or(self.api.rate_limit_ms)
            .unwrap_or(DEFAULT_RATE_LIMIT_MS);
        ApiSettings {
            url: self.resolve("WORDBANK_API_URL", self.api.url.as_deref(), DEFAULT_API_URL),
            user_agent: self.resolve(
                "WORDBANK_USER_AGENT",
                self.api.user_agent.as_deref(),
                DEFAULT_USER_AGENT,
            ),
            timeout: Duration::from_millis(timeout_ms),
            rate_limit: Duration::from_millis(rate_limit_ms),
        }
    }

    fn resolve(&self, env_key: &str, configured: Option<&str>, default: &str) -> String {
        if let Some(value) = env_string(env_key) {
            return value;
        }
        configured.unwrap_or(default).to_string()
    }
}

fn env_string(key: &str) -> Option<String> {
    let value = env::var(key).ok()?;
    let trimmed = value.trim().to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

fn env_u64(key: &str) -> Option<u64> {
    env_string(key).and_then(|value| value.parse().ok())
}

/// Load and parse a ToolConfig from a TOML file. Returns default if the file
/// doesn't exist.
pub fn load_config(config_path: &Path) -> Result<ToolConfig> {
    if !config_path.exists() {
        return Ok(ToolConfig::default());
    }
    let content = fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let parsed: ToolConfig = toml::from_str(&content)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    Ok(parsed)
}
