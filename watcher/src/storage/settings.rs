//! Settings file management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;
use crate::models::deployment::LogType;
use crate::watch::session::WatchOptions;

/// Watcher settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Bearer token lookup
    #[serde(default)]
    pub auth: AuthSettings,

    /// Log polling defaults
    #[serde(default)]
    pub watch: WatchSettings,
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the backend API
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_backend_url() -> String {
    "https://api.whaleray.oriduckduck.site".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSettings {
    /// Environment variable holding the bearer token
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    "WHALERAY_TOKEN".to_string()
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
        }
    }
}

/// Log polling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    /// Which log streams to follow
    #[serde(default)]
    pub log_type: LogType,

    /// Polling interval in milliseconds
    #[serde(default = "default_polling_interval_ms")]
    pub polling_interval_ms: u64,

    /// Maximum log lines per request
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_polling_interval_ms() -> u64 {
    2000
}

fn default_limit() -> u32 {
    100
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            log_type: LogType::All,
            polling_interval_ms: default_polling_interval_ms(),
            limit: default_limit(),
        }
    }
}

impl WatchSettings {
    pub fn to_options(&self) -> WatchOptions {
        WatchOptions {
            log_type: self.log_type,
            polling_interval: Duration::from_millis(self.polling_interval_ms),
            enabled: true,
            limit: self.limit,
        }
    }
}
