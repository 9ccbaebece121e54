//! Application configuration
//!
//! Loaded once at startup from `config.json` and passed by reference into
//! the orchestrator and adapters; nothing mutates it afterwards. A missing
//! file is written out with defaults so the user has something to edit
//! before the next start.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/105.0.0.0 Safari/537.36";

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Seconds between polling cycles.
    pub interval_secs: u64,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// User agent sent with every scrape request.
    pub user_agent: String,

    /// Logging configuration.
    pub logging: LoggingConfig,

    pub coupang: CoupangConfig,
    pub naver: CredentialConfig,
    pub univstore: CredentialConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            request_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            logging: LoggingConfig::default(),
            coupang: CoupangConfig::default(),
            naver: CredentialConfig::default(),
            univstore: CredentialConfig::default(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (`trace`..`error`), overridable via `RUST_LOG`.
    pub level: String,
    /// Also write daily-rotated log files.
    pub file_output: bool,
    /// Directory for log files.
    pub log_dir: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_output: false,
            log_dir: "logs".to_string(),
        }
    }
}

/// Coupang-specific settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CoupangConfig {
    /// Prefer the membership (wow) price element when present.
    pub use_wow_price: bool,
    pub login: bool,
    pub email: String,
    pub password: String,
}

/// Login credentials for vendors whose useful data sits behind a login.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub login: bool,
    pub id: String,
    pub password: String,
}

impl AppConfig {
    /// Load configuration from `path`.
    ///
    /// When the file does not exist, defaults are written there and an
    /// error asks the user to review them before the next start.
    pub async fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path).await {
            Ok(contents) => {
                let config: AppConfig = serde_json::from_str(&contents)
                    .with_context(|| format!("invalid config file {}", path.display()))?;
                config.validate()?;
                Ok(config)
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let config = AppConfig::default();
                config.save(path).await?;
                bail!(
                    "config file not found; wrote defaults to {}. Review the settings and start again",
                    path.display()
                );
            }
            Err(err) => {
                Err(err).with_context(|| format!("failed to read config {}", path.display()))
            }
        }
    }

    /// Write the configuration as pretty-printed JSON.
    pub async fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)
            .await
            .with_context(|| format!("failed to write config {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            bail!("interval_secs must be at least 1");
        }
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be at least 1");
        }
        Ok(())
    }
}
