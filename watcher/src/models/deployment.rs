//! Deployment models

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Lifecycle status of a deployment as reported by the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeploymentStatus {
    Queued,
    Inspecting,
    Building,
    Deploying,
    Running,
    BuildingFail,
    DeployingFail,
    Failed,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DeploymentStatus {
    /// No further state change is expected once a deployment reaches one of these
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Running
                | DeploymentStatus::Failed
                | DeploymentStatus::BuildingFail
                | DeploymentStatus::DeployingFail
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Failed
                | DeploymentStatus::BuildingFail
                | DeploymentStatus::DeployingFail
        )
    }

    /// Wire name, e.g. `BUILDING_FAIL`
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Queued => "QUEUED",
            DeploymentStatus::Inspecting => "INSPECTING",
            DeploymentStatus::Building => "BUILDING",
            DeploymentStatus::Deploying => "DEPLOYING",
            DeploymentStatus::Running => "RUNNING",
            DeploymentStatus::BuildingFail => "BUILDING_FAIL",
            DeploymentStatus::DeployingFail => "DEPLOYING_FAIL",
            DeploymentStatus::Failed => "FAILED",
            DeploymentStatus::Unknown => "UNKNOWN",
        }
    }

    /// Label shown in the status header
    pub fn label(&self) -> &'static str {
        match self {
            DeploymentStatus::Queued => "Queued",
            DeploymentStatus::Inspecting => "Inspecting",
            DeploymentStatus::Building => "Building",
            DeploymentStatus::Deploying => "Deploying",
            DeploymentStatus::Running => "Running",
            DeploymentStatus::BuildingFail => "Build failed",
            DeploymentStatus::DeployingFail => "Deploy failed",
            DeploymentStatus::Failed => "Failed",
            DeploymentStatus::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a log line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    Build,
    Runtime,
}

impl LogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogSource::Build => "build",
            LogSource::Runtime => "runtime",
        }
    }
}

/// A single log line. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Epoch milliseconds
    pub timestamp: i64,
    pub source: LogSource,
    pub message: String,
}

impl LogEntry {
    pub fn new(timestamp: i64, source: LogSource, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            source,
            message: message.into(),
        }
    }
}

/// Which log streams to request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogType {
    Build,
    Runtime,
    #[default]
    All,
}

impl LogType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogType::Build => "build",
            LogType::Runtime => "runtime",
            LogType::All => "all",
        }
    }
}

impl FromStr for LogType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "build" => Ok(LogType::Build),
            "runtime" => Ok(LogType::Runtime),
            "all" => Ok(LogType::All),
            _ => Err(format!("Invalid log type: {}", s)),
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque marker of the last log event already retrieved
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Cursor {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // The backend sends epoch-ms numbers; strings are accepted as-is
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawCursor {
            Int(i64),
            Float(f64),
            Text(String),
        }

        match RawCursor::deserialize(deserializer)? {
            RawCursor::Int(n) => Ok(Cursor(n.to_string())),
            RawCursor::Float(n) => Ok(Cursor(n.to_string())),
            RawCursor::Text(s) => Ok(Cursor(s)),
        }
    }
}

/// Body of `GET /deployments/{id}/logs`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogsResponse {
    #[serde(default)]
    pub status: Option<DeploymentStatus>,

    #[serde(default)]
    pub logs: Vec<LogEntry>,

    #[serde(default)]
    pub latest_event_time: Option<Cursor>,

    /// Older lines exist beyond this window
    #[serde(default)]
    pub has_more: bool,
}

/// One window of log lines plus the deployment status observed with it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBatch {
    pub logs: Vec<LogEntry>,
    pub status: DeploymentStatus,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

impl From<LogsResponse> for LogBatch {
    fn from(response: LogsResponse) -> Self {
        Self {
            logs: response.logs,
            status: response.status.unwrap_or_default(),
            next_cursor: response.latest_event_time,
            has_more: response.has_more,
        }
    }
}
