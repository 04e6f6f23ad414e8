//! Error types for the WhaleRay log watcher

use thiserror::Error;

/// Main error type for the log watcher
#[derive(Error, Debug)]
pub enum WatchError {
    #[error("Authentication required: no bearer token available")]
    AuthRequired,

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl WatchError {
    /// Human-readable reason shown next to the accumulated logs.
    ///
    /// Backend reasons are passed through verbatim.
    pub fn reason(&self) -> String {
        match self {
            WatchError::FetchFailed(reason) => reason.clone(),
            other => other.to_string(),
        }
    }

    /// Collapse transport-level failures into `FetchFailed`
    pub fn into_fetch_failure(self) -> Self {
        match self {
            WatchError::HttpError(e) => WatchError::FetchFailed(e.to_string()),
            WatchError::JsonError(e) => {
                WatchError::FetchFailed(format!("Invalid response body: {}", e))
            }
            other => other,
        }
    }
}
