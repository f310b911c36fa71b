use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{AccountId, SYNC_PATH};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Failed to create config directory")]
    CreateDirError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host and optional port, e.g. `mail.example.com:8000`
    pub host: String,
    /// Use `wss://` instead of `ws://`
    pub secure: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost:8000".to_string(),
            secure: false,
        }
    }
}

impl ServerConfig {
    pub fn endpoint_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}{}", scheme, self.host.trim_end_matches('/'), SYNC_PATH)
    }
}

/// Shortest redraw interval accepted from the config file, in milliseconds
pub const MIN_REFRESH_INTERVAL: u64 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UIConfig {
    /// Keep at most this many rows in the emails table; unbounded when unset
    pub max_rows: Option<usize>,
    /// Redraw interval in milliseconds
    pub refresh_interval: u64,
}

impl Default for UIConfig {
    fn default() -> Self {
        Self {
            max_rows: None,
            refresh_interval: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    /// Account synchronized on startup; nothing is synchronized when unset
    #[serde(default)]
    pub account_id: Option<AccountId>,
    #[serde(default)]
    pub ui: UIConfig,
}

/// Command line values that replace config values for a single run
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub secure: Option<bool>,
    pub account_id: Option<AccountId>,
    pub max_rows: Option<usize>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let path = Path::new(path);

        // If the file doesn't exist, return default config
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)?;
        let mut config: Config = serde_json::from_str(&content)?;

        // a zero interval would make the event poll spin
        config.ui.refresh_interval = config.ui.refresh_interval.max(MIN_REFRESH_INTERVAL);

        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: Overrides) {
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(secure) = overrides.secure {
            self.server.secure = secure;
        }
        if let Some(account_id) = overrides.account_id {
            self.account_id = Some(account_id);
        }
        if overrides.max_rows.is_some() {
            self.ui.max_rows = overrides.max_rows;
        }
    }

    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let path = Path::new(path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|_| ConfigError::CreateDirError)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }
}
