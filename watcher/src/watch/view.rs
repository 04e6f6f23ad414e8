//! Terminal log pane bound to a polling controller

use std::future::Future;
use std::io::Write;
use std::str::FromStr;

use chrono::{DateTime, Local, TimeZone};
use colored::{ColoredString, Colorize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::errors::WatchError;
use crate::models::deployment::{DeploymentStatus, LogEntry, LogSource};
use crate::watch::controller::PollingController;
use crate::watch::fetcher::LogFetcher;
use crate::watch::session::{WatchOptions, WatchSnapshot};

/// `[HH:MM:SS] [source] message` in the given timezone
pub fn format_log_line<Tz: TimeZone>(entry: &LogEntry, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let time = DateTime::<chrono::Utc>::from_timestamp_millis(entry.timestamp)
        .map(|t| t.with_timezone(tz).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| entry.timestamp.to_string());
    format!("[{}] [{}] {}", time, entry.source.as_str(), entry.message)
}

fn colorize_status(status: DeploymentStatus) -> ColoredString {
    let label = status.label();
    match status {
        DeploymentStatus::Inspecting => label.blue(),
        DeploymentStatus::Building => label.yellow(),
        DeploymentStatus::Deploying => label.magenta(),
        DeploymentStatus::Running => label.green(),
        s if s.is_failure() => label.red(),
        _ => label.dimmed(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Notice {
    Loading,
    Empty,
}

impl Notice {
    fn for_snapshot(snapshot: &WatchSnapshot) -> Option<Self> {
        if !snapshot.logs.is_empty() {
            return None;
        }
        if snapshot.is_loading {
            Some(Notice::Loading)
        } else if snapshot.reloads > 0 && snapshot.error.is_none() {
            Some(Notice::Empty)
        } else {
            None
        }
    }

    fn text(&self) -> &'static str {
        match self {
            Notice::Loading => "Loading logs...",
            Notice::Empty => "No logs yet",
        }
    }
}

/// Writes only what changed between two snapshots
#[derive(Debug, Default)]
pub struct PaneRenderer {
    deployment_id: Option<String>,
    reloads: u64,
    printed: usize,
    status: Option<DeploymentStatus>,
    is_polling: bool,
    error: Option<String>,
    notice: Option<Notice>,
    older_marked: bool,
}

impl PaneRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of log lines currently on screen
    pub fn printed(&self) -> usize {
        self.printed
    }

    pub fn render<W: Write>(&mut self, snapshot: &WatchSnapshot, out: &mut W) -> std::io::Result<()> {
        if snapshot.deployment_id != self.deployment_id {
            *self = Self {
                deployment_id: snapshot.deployment_id.clone(),
                ..Self::default()
            };
            if let Some(id) = &snapshot.deployment_id {
                writeln!(out, "{} {}", "Deployment".bold(), id)?;
            }
        }

        if snapshot.reloads != self.reloads || snapshot.logs.len() < self.printed {
            if self.printed > 0 {
                writeln!(out, "{}", "--- reloaded ---".dimmed())?;
            }
            self.reloads = snapshot.reloads;
            self.printed = 0;
            self.older_marked = false;
        }

        // Nothing fetched yet
        if snapshot.reloads > 0 && self.status != Some(snapshot.status) {
            writeln!(out, "{} {}", "Status:".bold(), colorize_status(snapshot.status))?;
            self.status = Some(snapshot.status);
        }

        if snapshot.is_polling != self.is_polling {
            if snapshot.is_polling {
                writeln!(out, "{}", "* live updates on".blue())?;
            } else {
                writeln!(out, "{}", "* live updates stopped".dimmed())?;
            }
            self.is_polling = snapshot.is_polling;
        }

        if snapshot.error != self.error {
            if let Some(error) = &snapshot.error {
                writeln!(out, "{} {}", "Error:".red().bold(), error)?;
            }
            self.error = snapshot.error.clone();
        }

        let notice = Notice::for_snapshot(snapshot);
        if notice != self.notice {
            if let Some(notice) = notice {
                writeln!(out, "{}", notice.text().dimmed())?;
            }
            self.notice = notice;
        }

        if snapshot.has_older && !self.older_marked && self.printed == 0 && !snapshot.logs.is_empty() {
            writeln!(out, "{}", "... older lines omitted".dimmed())?;
            self.older_marked = true;
        }

        for entry in &snapshot.logs[self.printed..] {
            let line = format_log_line(entry, &Local);
            match entry.source {
                LogSource::Build => writeln!(out, "{}", line.as_str().blue())?,
                LogSource::Runtime => writeln!(out, "{}", line.as_str().green())?,
            }
        }
        self.printed = snapshot.logs.len();

        Ok(())
    }

    pub fn summary<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        writeln!(out, "{} log lines", self.printed)
    }
}

/// Manual actions on a live pane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaneCommand {
    /// Reload the whole window
    Refresh,
    /// Stop live updates
    Stop,
}

impl FromStr for PaneCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "r" | "refresh" => Ok(PaneCommand::Refresh),
            "s" | "stop" => Ok(PaneCommand::Stop),
            other => Err(format!("Unknown command: {}", other)),
        }
    }
}

/// Whether the session has nothing more coming without a manual action
fn is_idle(snapshot: &WatchSnapshot) -> bool {
    !snapshot.is_polling && !snapshot.is_loading
}

/// A log pane following one deployment at a time.
///
/// Dropping the view tears the controller's session down.
pub struct LogView<F: LogFetcher + 'static> {
    controller: PollingController<F>,
}

impl<F: LogFetcher + 'static> LogView<F> {
    pub fn new(controller: PollingController<F>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &PollingController<F> {
        &self.controller
    }

    /// Bind to a deployment, replacing the previous session
    pub async fn bind(&self, deployment_id: &str, options: WatchOptions) -> Result<(), WatchError> {
        if self.controller.deployment_id().as_deref() != Some(deployment_id) {
            debug!("Binding log view to {:?}", deployment_id);
        }
        self.controller.start(deployment_id, options).await
    }

    /// Stream the pane to `out` until the session goes idle or `shutdown` resolves.
    ///
    /// Returns the number of log lines on screen.
    pub async fn render<W, S>(&self, out: &mut W, shutdown: S) -> Result<usize, WatchError>
    where
        W: Write,
        S: Future<Output = ()>,
    {
        let (_, mut commands) = mpsc::channel(1);
        self.render_with_commands(out, shutdown, &mut commands).await
    }

    /// Like [`LogView::render`], also acting on `commands` while the pane is live
    pub async fn render_with_commands<W, S>(
        &self,
        out: &mut W,
        shutdown: S,
        commands: &mut mpsc::Receiver<PaneCommand>,
    ) -> Result<usize, WatchError>
    where
        W: Write,
        S: Future<Output = ()>,
    {
        let mut rx = self.controller.subscribe();
        let mut renderer = PaneRenderer::new();
        tokio::pin!(shutdown);

        loop {
            let idle = {
                let snapshot = rx.borrow_and_update();
                renderer.render(&snapshot, out)?;
                is_idle(&snapshot)
            };
            out.flush()?;
            if idle {
                break;
            }

            tokio::select! {
                _ = &mut shutdown => {
                    debug!("Log view shutting down...");
                    break;
                }
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                Some(command) = commands.recv() => {
                    debug!("Pane command: {:?}", command);
                    match command {
                        PaneCommand::Refresh => {
                            tokio::select! {
                                _ = &mut shutdown => {
                                    debug!("Log view shutting down during refresh...");
                                    break;
                                }
                                refreshed = self.controller.refresh() => {
                                    if let Err(e) = refreshed {
                                        warn!("Refresh failed: {}", e);
                                    }
                                }
                            }
                        }
                        PaneCommand::Stop => self.controller.stop(),
                    }
                }
            }
        }

        renderer.summary(out)?;
        out.flush()?;
        Ok(renderer.printed())
    }
}

impl<F: LogFetcher + 'static> Drop for LogView<F> {
    fn drop(&mut self) {
        self.controller.teardown();
    }
}
