//! Deployment logs API client

use secrecy::SecretString;

use crate::errors::WatchError;
use crate::http::client::HttpClient;
use crate::models::deployment::{Cursor, LogType, LogsResponse};

/// Query for `GET /deployments/{id}/logs`
#[derive(Debug, Clone)]
pub struct LogQuery {
    pub log_type: LogType,
    pub limit: u32,
    pub last_event_time: Option<Cursor>,
}

impl LogQuery {
    /// Query parameters in wire form; `lastEventTime` only in incremental mode
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("type", self.log_type.as_str().to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(cursor) = &self.last_event_time {
            params.push(("lastEventTime", cursor.to_string()));
        }
        params
    }
}

impl HttpClient {
    /// Fetch a window of log lines for a deployment
    pub async fn get_deployment_logs(
        &self,
        deployment_id: &str,
        token: &SecretString,
        query: &LogQuery,
    ) -> Result<LogsResponse, WatchError> {
        self.get_with_query(
            &["deployments", deployment_id, "logs"],
            token,
            &query.to_params(),
        )
        .await
    }
}
