//! Main application run loop

use std::future::Future;
use std::io::{BufRead, IsTerminal};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::app::options::AppOptions;
use crate::authn::token_mngr::{TokenManager, TokenManagerExt};
use crate::errors::WatchError;
use crate::http::client::HttpClient;
use crate::models::deployment::DeploymentStatus;
use crate::watch::controller::PollingController;
use crate::watch::fetcher::{HttpLogFetcher, LogFetcher};
use crate::watch::session::WatchOptions;
use crate::watch::view::{LogView, PaneCommand};

/// What the pane ended on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub status: DeploymentStatus,
    pub lines: usize,
}

/// Follow a deployment's logs on stdout until it settles or `shutdown_signal` fires
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()>,
) -> Result<RunSummary, WatchError> {
    info!("Initializing log watcher...");

    let http_client = Arc::new(HttpClient::with_timeout(
        &options.backend_base_url,
        options.request_timeout,
    )?);
    let token_mngr: Arc<dyn TokenManagerExt> = Arc::new(TokenManager::new(options.token_sources));
    let fetcher = HttpLogFetcher::new(http_client, token_mngr);

    let view = LogView::new(PollingController::new(fetcher));
    let mut commands = stdin_commands();
    let mut stdout = std::io::stdout();
    follow(
        &view,
        &options.deployment_id,
        options.watch,
        options.once,
        &mut stdout,
        &mut commands,
        shutdown_signal,
    )
    .await
}

/// Pane commands typed on an interactive stdin, one per line (`r` refresh, `s` stop)
fn stdin_commands() -> mpsc::Receiver<PaneCommand> {
    let (tx, rx) = mpsc::channel(8);
    if !std::io::stdin().is_terminal() {
        return rx;
    }

    eprintln!("Type 'r' + Enter to reload the logs, 's' + Enter to stop live updates");
    // A plain thread so a pending read never holds up runtime shutdown
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            match line.parse::<PaneCommand>() {
                Ok(command) => {
                    if tx.blocking_send(command).is_err() {
                        break;
                    }
                }
                Err(e) => debug!("{}", e),
            }
        }
    });
    rx
}

/// Bind `view` to a deployment and stream its pane to `out`, acting on `commands` while live
pub async fn follow<F, W>(
    view: &LogView<F>,
    deployment_id: &str,
    watch: WatchOptions,
    once: bool,
    out: &mut W,
    commands: &mut mpsc::Receiver<PaneCommand>,
    shutdown_signal: impl Future<Output = ()>,
) -> Result<RunSummary, WatchError>
where
    F: LogFetcher + 'static,
    W: std::io::Write,
{
    tokio::pin!(shutdown_signal);

    let bound = tokio::select! {
        _ = &mut shutdown_signal => {
            info!("Shutdown signal received before the first response");
            view.controller().teardown();
            return Ok(RunSummary {
                status: DeploymentStatus::Unknown,
                lines: 0,
            });
        }
        bound = view.bind(deployment_id, watch) => bound,
    };

    if once {
        view.controller().stop();
    }

    // Render even on failure so the error is shown next to whatever was loaded
    let lines = view
        .render_with_commands(out, &mut shutdown_signal, commands)
        .await?;
    let status = view.controller().snapshot().status;

    if let Err(e) = bound {
        error!("Failed to load logs for {}: {}", deployment_id, e);
        return Err(e);
    }

    Ok(RunSummary { status, lines })
}
