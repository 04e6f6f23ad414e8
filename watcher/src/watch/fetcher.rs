//! Single-window log requests

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::authn::token_mngr::TokenManagerExt;
use crate::errors::WatchError;
use crate::http::client::HttpClient;
use crate::http::deployments::LogQuery;
use crate::models::deployment::{Cursor, LogBatch, LogType};

/// Default number of log lines per request
pub const DEFAULT_LIMIT: u32 = 100;

/// Parameters of one log request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub log_type: LogType,
    pub limit: u32,
    /// `None` requests the latest window, `Some` only entries after the cursor
    pub cursor: Option<Cursor>,
}

impl FetchRequest {
    /// Request the latest window
    pub fn full(log_type: LogType, limit: u32) -> Self {
        Self {
            log_type,
            limit,
            cursor: None,
        }
    }

    /// Request entries after `cursor`
    pub fn incremental(log_type: LogType, limit: u32, cursor: Option<Cursor>) -> Self {
        Self {
            log_type,
            limit,
            cursor,
        }
    }

    pub fn is_incremental(&self) -> bool {
        self.cursor.is_some()
    }
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self::full(LogType::All, DEFAULT_LIMIT)
    }
}

/// Source of log windows. Implementations do not retry.
#[async_trait]
pub trait LogFetcher: Send + Sync {
    async fn fetch(&self, deployment_id: &str, request: &FetchRequest)
        -> Result<LogBatch, WatchError>;
}

#[async_trait]
impl<T: LogFetcher + ?Sized> LogFetcher for Arc<T> {
    async fn fetch(
        &self,
        deployment_id: &str,
        request: &FetchRequest,
    ) -> Result<LogBatch, WatchError> {
        (**self).fetch(deployment_id, request).await
    }
}

/// Fetches logs from the backend REST API
pub struct HttpLogFetcher {
    http_client: Arc<HttpClient>,
    token_mngr: Arc<dyn TokenManagerExt>,
}

impl HttpLogFetcher {
    pub fn new(http_client: Arc<HttpClient>, token_mngr: Arc<dyn TokenManagerExt>) -> Self {
        Self {
            http_client,
            token_mngr,
        }
    }
}

pub(crate) fn validate(deployment_id: &str, request: &FetchRequest) -> Result<(), WatchError> {
    if deployment_id.trim().is_empty() {
        return Err(WatchError::ValidationError(
            "deployment id must not be empty".to_string(),
        ));
    }
    if request.limit == 0 {
        return Err(WatchError::ValidationError(
            "limit must be a positive integer".to_string(),
        ));
    }
    Ok(())
}

#[async_trait]
impl LogFetcher for HttpLogFetcher {
    async fn fetch(
        &self,
        deployment_id: &str,
        request: &FetchRequest,
    ) -> Result<LogBatch, WatchError> {
        validate(deployment_id, request)?;

        // Never send an unauthenticated request
        let token = self.token_mngr.get_token().await?;

        let query = LogQuery {
            log_type: request.log_type,
            limit: request.limit,
            last_event_time: request.cursor.clone(),
        };

        let response = self
            .http_client
            .get_deployment_logs(deployment_id, &token, &query)
            .await
            .map_err(WatchError::into_fetch_failure)?;

        let batch = LogBatch::from(response);
        debug!(
            "Fetched {} log lines for {} (status {}, cursor {:?})",
            batch.logs.len(),
            deployment_id,
            batch.status,
            batch.next_cursor
        );
        Ok(batch)
    }
}
