//! Per-deployment polling session state

use std::collections::HashSet;
use std::time::Duration;

use crate::models::deployment::{Cursor, DeploymentStatus, LogBatch, LogEntry, LogSource, LogType};
use crate::watch::fetcher::{FetchRequest, DEFAULT_LIMIT};

/// Options a session is started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Which log streams to request
    pub log_type: LogType,

    /// Delay between the end of one tick and the start of the next
    pub polling_interval: Duration,

    /// A disabled session never fetches
    pub enabled: bool,

    /// Maximum log lines per request
    pub limit: u32,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            log_type: LogType::All,
            polling_interval: Duration::from_millis(2000),
            enabled: true,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Observable state published to subscribers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchSnapshot {
    /// Deployment the snapshot belongs to, `None` when unbound
    pub deployment_id: Option<String>,

    /// Accumulated log lines in arrival order
    pub logs: Vec<LogEntry>,

    pub status: DeploymentStatus,

    /// A full fetch is in flight
    pub is_loading: bool,

    /// Reason of the latest failed fetch
    pub error: Option<String>,

    /// A ticker is armed for this session
    pub is_polling: bool,

    /// Incremented each time `logs` is replaced wholesale
    pub reloads: u64,

    /// The last full window was cut at the request limit
    pub has_older: bool,
}

type EntryKey = (i64, LogSource, String);

fn entry_key(entry: &LogEntry) -> EntryKey {
    (entry.timestamp, entry.source, entry.message.clone())
}

/// Cursor and de-duplication state for one deployment
#[derive(Debug)]
pub struct PollingSession {
    deployment_id: String,
    options: WatchOptions,
    cursor: Option<Cursor>,
    seen: HashSet<EntryKey>,
}

impl PollingSession {
    pub fn new(deployment_id: impl Into<String>, options: WatchOptions) -> Self {
        Self {
            deployment_id: deployment_id.into(),
            options,
            cursor: None,
            seen: HashSet::new(),
        }
    }

    pub fn deployment_id(&self) -> &str {
        &self.deployment_id
    }

    pub fn options(&self) -> &WatchOptions {
        &self.options
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    /// Forget the cursor so the next request is a full window
    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn full_request(&self) -> FetchRequest {
        FetchRequest::full(self.options.log_type, self.options.limit)
    }

    pub fn next_request(&self) -> FetchRequest {
        FetchRequest::incremental(self.options.log_type, self.options.limit, self.cursor.clone())
    }

    /// Replace the accumulated logs with a full window
    pub fn apply_full(&mut self, batch: LogBatch, snapshot: &mut WatchSnapshot) {
        self.seen = batch.logs.iter().map(entry_key).collect();
        self.cursor = batch.next_cursor;

        snapshot.logs = batch.logs;
        snapshot.status = batch.status;
        snapshot.has_older = batch.has_more;
        snapshot.reloads += 1;
    }

    /// Append entries not seen before; returns how many were appended
    pub fn apply_incremental(&mut self, batch: LogBatch, snapshot: &mut WatchSnapshot) -> usize {
        let before = snapshot.logs.len();
        for entry in batch.logs {
            if self.seen.insert(entry_key(&entry)) {
                snapshot.logs.push(entry);
            }
        }

        // A response without a cursor keeps the previous one
        if let Some(cursor) = batch.next_cursor {
            self.cursor = Some(cursor);
        }
        snapshot.status = batch.status;

        snapshot.logs.len() - before
    }
}
