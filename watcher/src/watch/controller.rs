//! Polling lifecycle for one deployment at a time

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::{oneshot, watch, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::errors::WatchError;
use crate::models::deployment::DeploymentStatus;
use crate::watch::fetcher::LogFetcher;
use crate::watch::session::{PollingSession, WatchOptions, WatchSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    /// Cursor reset, logs replaced
    Full,
    /// After the stored cursor, logs appended
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchOutcome {
    Applied(DeploymentStatus),
    /// The session was torn down or replaced while the request was in flight
    Discarded,
}

struct Ticker {
    stop_tx: oneshot::Sender<()>,
}

struct Inner {
    /// Bumped on every start and teardown; results from older generations are dropped
    generation: u64,
    session: Option<PollingSession>,
    ticker: Option<Ticker>,
    /// Serializes ticks and manual refreshes of the current session
    fetch_gate: Arc<AsyncMutex<()>>,
}

/// Clears `is_loading` when a full fetch is dropped before its response arrives
struct LoadingGuard<'a, F: LogFetcher + 'static> {
    shared: &'a Shared<F>,
    generation: u64,
}

impl<'a, F: LogFetcher + 'static> LoadingGuard<'a, F> {
    fn arm(shared: &'a Shared<F>, generation: u64) -> Self {
        shared.state.send_modify(|s| s.is_loading = true);
        Self { shared, generation }
    }

    /// The response arrived; the caller settles `is_loading` itself
    fn disarm(self) {
        std::mem::forget(self);
    }
}

impl<F: LogFetcher + 'static> Drop for LoadingGuard<'_, F> {
    fn drop(&mut self) {
        let inner = self.shared.lock();
        if inner.generation == self.generation {
            debug!("Full fetch cancelled before completion");
            self.shared.state.send_modify(|s| s.is_loading = false);
        }
    }
}

struct Shared<F> {
    fetcher: F,
    inner: Mutex<Inner>,
    state: watch::Sender<WatchSnapshot>,
}

impl<F: LogFetcher + 'static> Shared<F> {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn fetch_and_apply(
        &self,
        generation: u64,
        mode: FetchMode,
    ) -> Result<FetchOutcome, WatchError> {
        let gate = {
            let inner = self.lock();
            if inner.generation != generation {
                return Ok(FetchOutcome::Discarded);
            }
            Arc::clone(&inner.fetch_gate)
        };
        let _gate = gate.lock().await;

        let (deployment_id, request, loading) = {
            let mut inner = self.lock();
            if inner.generation != generation {
                return Ok(FetchOutcome::Discarded);
            }
            let Some(session) = inner.session.as_mut() else {
                return Ok(FetchOutcome::Discarded);
            };

            let request = match mode {
                FetchMode::Full => {
                    session.reset_cursor();
                    session.full_request()
                }
                FetchMode::Incremental => session.next_request(),
            };
            let deployment_id = session.deployment_id().to_string();
            let loading = (mode == FetchMode::Full).then(|| LoadingGuard::arm(self, generation));
            (deployment_id, request, loading)
        };

        let result = self.fetcher.fetch(&deployment_id, &request).await;
        if let Some(loading) = loading {
            loading.disarm();
        }

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!("Discarding stale log response for {}", deployment_id);
            return Ok(FetchOutcome::Discarded);
        }
        let Some(session) = inner.session.as_mut() else {
            return Ok(FetchOutcome::Discarded);
        };

        match result {
            Ok(batch) => {
                let status = batch.status;
                self.state.send_modify(|s| {
                    match mode {
                        FetchMode::Full => {
                            session.apply_full(batch, s);
                            s.is_loading = false;
                        }
                        FetchMode::Incremental => {
                            let appended = session.apply_incremental(batch, s);
                            debug!("Appended {} log lines for {}", appended, deployment_id);
                        }
                    }
                    s.error = None;
                });
                Ok(FetchOutcome::Applied(status))
            }
            Err(e) => {
                warn!("Failed to fetch logs for {}: {}", deployment_id, e);
                let reason = e.reason();
                self.state.send_modify(|s| {
                    s.error = Some(reason);
                    if mode == FetchMode::Full {
                        s.is_loading = false;
                    }
                });
                Err(e)
            }
        }
    }

    fn arm_ticker(self: &Arc<Self>, generation: u64, interval: Duration) {
        let mut inner = self.lock();
        if inner.generation != generation || inner.ticker.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            run_ticker(
                shared,
                generation,
                interval,
                Box::pin(async move {
                    let _ = stop_rx.await;
                }),
            )
            .await;
        });

        inner.ticker = Some(Ticker { stop_tx });
        self.state.send_modify(|s| s.is_polling = true);
    }

    /// Called by the ticker itself when it ends on its own
    fn finish_ticker(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation != generation {
            return;
        }
        inner.ticker = None;
        self.state.send_modify(|s| s.is_polling = false);
    }

    fn cancel_ticker(inner: &mut Inner) -> bool {
        match inner.ticker.take() {
            Some(ticker) => {
                // A dropped sender also wakes the ticker
                let _ = ticker.stop_tx.send(());
                true
            }
            None => false,
        }
    }
}

/// Run the ticker for one session generation.
///
/// The next sleep only starts once the previous fetch has completed, so ticks
/// never overlap.
async fn run_ticker<F: LogFetcher + 'static>(
    shared: Arc<Shared<F>>,
    generation: u64,
    interval: Duration,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    debug!("Log ticker starting (every {:?})...", interval);

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                debug!("Log ticker shutting down...");
                return;
            }
            _ = tokio::time::sleep(interval) => {
                // Continue with tick
            }
        }

        let outcome = tokio::select! {
            _ = &mut shutdown_signal => {
                debug!("Log ticker shutting down during fetch...");
                return;
            }
            outcome = shared.fetch_and_apply(generation, FetchMode::Incremental) => outcome,
        };

        match outcome {
            Ok(FetchOutcome::Applied(status)) if status.is_terminal() => {
                info!("Deployment reached {}, polling stopped", status);
                shared.finish_ticker(generation);
                return;
            }
            Ok(FetchOutcome::Applied(_)) => {}
            Ok(FetchOutcome::Discarded) => return,
            Err(WatchError::AuthRequired) => {
                error!("No bearer token available, polling stopped");
                shared.finish_ticker(generation);
                return;
            }
            Err(e) => {
                // Will retry on next tick
                debug!("Tick failed: {}", e);
            }
        }
    }
}

/// Drives repeated log fetches for one deployment and publishes snapshots.
///
/// Dropping the controller tears the session down.
pub struct PollingController<F: LogFetcher + 'static> {
    shared: Arc<Shared<F>>,
}

impl<F: LogFetcher + 'static> PollingController<F> {
    pub fn new(fetcher: F) -> Self {
        let (state, _) = watch::channel(WatchSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                fetcher,
                inner: Mutex::new(Inner {
                    generation: 0,
                    session: None,
                    ticker: None,
                    fetch_gate: Arc::new(AsyncMutex::new(())),
                }),
                state,
            }),
        }
    }

    /// Receive a notification for every published snapshot
    pub fn subscribe(&self) -> watch::Receiver<WatchSnapshot> {
        self.shared.state.subscribe()
    }

    /// Current snapshot
    pub fn snapshot(&self) -> WatchSnapshot {
        self.shared.state.borrow().clone()
    }

    pub fn is_polling(&self) -> bool {
        self.shared.state.borrow().is_polling
    }

    /// Deployment of the active session, if any
    pub fn deployment_id(&self) -> Option<String> {
        self.shared
            .lock()
            .session
            .as_ref()
            .map(|s| s.deployment_id().to_string())
    }

    /// Begin a session, replacing any previous one.
    ///
    /// Performs one full fetch; the ticker is armed only when that fetch succeeds
    /// with a non-terminal status. An empty id or a disabled session leaves the
    /// controller idle.
    pub async fn start(&self, deployment_id: &str, options: WatchOptions) -> Result<(), WatchError> {
        let bound = !deployment_id.trim().is_empty() && options.enabled;

        let generation = {
            let mut inner = self.shared.lock();
            Shared::<F>::cancel_ticker(&mut inner);
            inner.generation += 1;
            inner.fetch_gate = Arc::new(AsyncMutex::new(()));
            inner.session = bound.then(|| PollingSession::new(deployment_id, options.clone()));
            self.shared.state.send_replace(WatchSnapshot {
                deployment_id: bound.then(|| deployment_id.to_string()),
                ..Default::default()
            });
            inner.generation
        };

        if !bound {
            debug!("No deployment to watch (id {:?}, enabled {})", deployment_id, options.enabled);
            return Ok(());
        }

        info!(
            "Watching {} logs for deployment {}",
            options.log_type, deployment_id
        );

        let status = match self.shared.fetch_and_apply(generation, FetchMode::Full).await? {
            FetchOutcome::Applied(status) => status,
            FetchOutcome::Discarded => return Ok(()),
        };

        if status.is_terminal() {
            info!("Deployment {} is already {}, not polling", deployment_id, status);
            return Ok(());
        }

        self.shared.arm_ticker(generation, options.polling_interval);
        Ok(())
    }

    /// Reload the whole window, replacing accumulated logs. The ticker is left as is.
    pub async fn refresh(&self) -> Result<(), WatchError> {
        let generation = {
            let inner = self.shared.lock();
            if inner.session.is_none() {
                debug!("Refresh requested without a bound deployment");
                return Ok(());
            }
            inner.generation
        };

        self.shared
            .fetch_and_apply(generation, FetchMode::Full)
            .await
            .map(|_| ())
    }

    /// Stop polling. Safe to call when already stopped.
    pub fn stop(&self) {
        let mut inner = self.shared.lock();
        if Shared::<F>::cancel_ticker(&mut inner) {
            info!("Polling stopped");
        }
        self.shared.state.send_modify(|s| s.is_polling = false);
    }

    /// End the session: stop polling and drop any response still in flight
    pub fn teardown(&self) {
        let mut inner = self.shared.lock();
        Shared::<F>::cancel_ticker(&mut inner);
        inner.generation += 1;
        inner.fetch_gate = Arc::new(AsyncMutex::new(()));
        if let Some(session) = inner.session.take() {
            debug!("Tearing down session for {}", session.deployment_id());
        }
        self.shared.state.send_modify(|s| {
            s.is_polling = false;
            s.is_loading = false;
        });
    }
}

impl<F: LogFetcher + 'static> Drop for PollingController<F> {
    fn drop(&mut self) {
        self.teardown();
    }
}
