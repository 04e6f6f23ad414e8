//! Token manager for bearer authentication

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::errors::WatchError;
use crate::filesys::file::File;

/// Token manager trait for testability
#[async_trait]
pub trait TokenManagerExt: Send + Sync {
    /// Get the current bearer token, `AuthRequired` when none is available
    async fn get_token(&self) -> Result<SecretString, WatchError>;

    /// Whether a token can be resolved
    async fn is_authenticated(&self) -> bool {
        self.get_token().await.is_ok()
    }

    /// Forget the cached token
    async fn logout(&self);
}

/// Where the token manager looks for a token, in priority order
#[derive(Debug)]
pub struct TokenSources {
    /// Token given explicitly (e.g. `--token`)
    pub explicit: Option<SecretString>,

    /// Environment variable name
    pub env_var: Option<String>,

    /// Token file
    pub file: Option<File>,
}

/// Token manager implementation
pub struct TokenManager {
    sources: TokenSources,
    cached_token: RwLock<Option<SecretString>>,
}

impl TokenManager {
    /// Create a new token manager
    pub fn new(sources: TokenSources) -> Self {
        Self {
            sources,
            cached_token: RwLock::new(None),
        }
    }

    /// Token manager with a fixed token
    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(TokenSources {
            explicit: Some(SecretString::from(token.into())),
            env_var: None,
            file: None,
        })
    }

    /// Resolve a token from the configured sources
    async fn load_token(&self) -> Result<SecretString, WatchError> {
        if let Some(token) = &self.sources.explicit {
            debug!("Using explicitly provided token");
            return non_empty(token.expose_secret());
        }

        if let Some(var) = &self.sources.env_var {
            if let Ok(value) = std::env::var(var) {
                if !value.trim().is_empty() {
                    debug!("Using token from ${}", var);
                    return non_empty(&value);
                }
            }
        }

        if let Some(file) = &self.sources.file {
            if file.exists().await {
                debug!("Using token from {}", file.path().display());
                let contents = file.read_string().await?;
                return non_empty(&contents);
            }
        }

        Err(WatchError::AuthRequired)
    }
}

fn non_empty(raw: &str) -> Result<SecretString, WatchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WatchError::AuthRequired);
    }
    Ok(SecretString::from(trimmed.to_string()))
}

#[async_trait]
impl TokenManagerExt for TokenManager {
    async fn get_token(&self) -> Result<SecretString, WatchError> {
        // Try to get from cache first
        {
            let cached = self.cached_token.read().await;
            if let Some(token) = cached.as_ref() {
                return Ok(SecretString::from(token.expose_secret().to_string()));
            }
        }

        let token = self.load_token().await?;

        let mut cached = self.cached_token.write().await;
        *cached = Some(SecretString::from(token.expose_secret().to_string()));

        Ok(token)
    }

    async fn logout(&self) {
        info!("Clearing cached token");
        let mut cached = self.cached_token.write().await;
        *cached = None;
    }
}
