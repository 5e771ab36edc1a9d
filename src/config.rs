//! Configuration loader and validator for the listing portal.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub store: Store,
    pub media: Media,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    pub poll_interval_ms: u64,
    pub page_size: usize,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Hosted backend reached over its REST interface.
    Rest,
    /// Local SQLite database under `app.data_dir`.
    Sqlite,
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub backend: StoreBackend,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: String,
}

/// Media host settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Media {
    pub upload_url: String,
    pub upload_preset: String,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.app.poll_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.app.request_timeout_secs)
    }

    /// Local SQLite location; `DATABASE_URL` wins when set.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL").unwrap_or_else(|_| {
            format!(
                "sqlite://{}/portal.db",
                self.app.data_dir.trim_end_matches('/')
            )
        })
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.poll_interval_ms == 0 {
        return Err(ConfigError::Invalid("app.poll_interval_ms must be > 0"));
    }
    if cfg.app.page_size == 0 {
        return Err(ConfigError::Invalid("app.page_size must be > 0"));
    }
    if cfg.app.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("app.request_timeout_secs must be > 0"));
    }

    if cfg.store.backend == StoreBackend::Rest {
        if cfg.store.url.trim().is_empty() {
            return Err(ConfigError::Invalid("store.url must be non-empty for the rest backend"));
        }
        if Url::parse(cfg.store.url.trim()).is_err() {
            return Err(ConfigError::Invalid("store.url must be an absolute URL"));
        }
        if cfg.store.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid("store.api_key must be non-empty for the rest backend"));
        }
    }

    if cfg.media.upload_url.trim().is_empty() {
        return Err(ConfigError::Invalid("media.upload_url must be non-empty"));
    }
    if Url::parse(cfg.media.upload_url.trim()).is_err() {
        return Err(ConfigError::Invalid("media.upload_url must be an absolute URL"));
    }
    if cfg.media.upload_preset.trim().is_empty() {
        return Err(ConfigError::Invalid("media.upload_preset must be non-empty"));
    }

    Ok(())
}

/// Returns the example YAML written by `init-config`.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  poll_interval_ms: 3000
  page_size: 10
  request_timeout_secs: 30

store:
  backend: rest
  url: "https://YOUR_PROJECT.supabase.co/"
  api_key: "YOUR_ANON_KEY"

media:
  upload_url: "https://api.cloudinary.com/v1_1/YOUR_CLOUD/image/upload"
  upload_preset: "listaro_preset"
"#
}
