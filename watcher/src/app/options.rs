//! Application configuration options

use std::time::Duration;

use secrecy::SecretString;

use crate::app::cli::Cli;
use crate::authn::token_mngr::TokenSources;
use crate::errors::WatchError;
use crate::logs::LogOptions;
use crate::storage::layout::StorageLayout;
use crate::storage::settings::Settings;
use crate::watch::session::WatchOptions;

/// Main application options
#[derive(Debug)]
pub struct AppOptions {
    /// Deployment to follow
    pub deployment_id: String,

    /// Backend API base URL
    pub backend_base_url: String,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Where to look for the bearer token
    pub token_sources: TokenSources,

    /// Polling options
    pub watch: WatchOptions,

    /// Print one window and exit
    pub once: bool,
}

impl AppOptions {
    /// Merge settings with command line overrides
    pub fn resolve(cli: &Cli, settings: &Settings, layout: &StorageLayout) -> Result<Self, WatchError> {
        let deployment_id = cli
            .deployment_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| WatchError::ConfigError("Missing deployment id".to_string()))?;

        let mut watch = settings.watch.to_options();
        if let Some(log_type) = cli.log_type {
            watch.log_type = log_type;
        }
        if let Some(interval_ms) = cli.interval_ms {
            watch.polling_interval = Duration::from_millis(interval_ms);
        }
        if let Some(limit) = cli.limit {
            watch.limit = limit;
        }
        if watch.polling_interval.is_zero() || watch.limit == 0 {
            return Err(WatchError::ConfigError(
                "polling interval and limit must be positive".to_string(),
            ));
        }
        if settings.backend.timeout_secs == 0 {
            return Err(WatchError::ConfigError(
                "backend timeout must be positive".to_string(),
            ));
        }

        Ok(Self {
            deployment_id,
            backend_base_url: cli
                .base_url
                .clone()
                .unwrap_or_else(|| settings.backend.base_url.clone()),
            request_timeout: Duration::from_secs(settings.backend.timeout_secs),
            token_sources: TokenSources {
                explicit: cli.token.clone().map(SecretString::from),
                env_var: Some(settings.auth.token_env.clone()),
                file: Some(layout.token_file()),
            },
            watch,
            once: cli.once,
        })
    }
}

/// Logging options from settings and command line
pub fn log_options(cli: &Cli, settings: &Settings) -> LogOptions {
    LogOptions {
        log_level: cli.log_level.clone().unwrap_or_else(|| settings.log_level.clone()),
        log_dir: cli.log_dir.clone(),
        json_format: cli.json_logs,
        ..Default::default()
    }
}
