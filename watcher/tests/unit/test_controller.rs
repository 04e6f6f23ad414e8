//! Polling controller tests

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;

use wrwatch::errors::WatchError;
use wrwatch::models::deployment::{Cursor, DeploymentStatus, LogType};
use wrwatch::watch::controller::PollingController;
use wrwatch::watch::session::WatchOptions;

use crate::common::{batch, ScriptedFetcher};

fn options(interval_ms: u64) -> WatchOptions {
    WatchOptions {
        log_type: LogType::All,
        polling_interval: Duration::from_millis(interval_ms),
        ..Default::default()
    }
}

fn controller(fetcher: &Arc<ScriptedFetcher>) -> PollingController<Arc<ScriptedFetcher>> {
    PollingController::new(Arc::clone(fetcher))
}

#[tokio::test(start_paused = true)]
async fn test_end_to_end_until_running() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1, 2, 3], DeploymentStatus::Building, Some("3")));
    fetcher.reply(batch(&[4, 5], DeploymentStatus::Running, Some("5")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(2000)).await.unwrap();

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.deployment_id.as_deref(), Some("dep-1"));
    assert_eq!(snapshot.logs.len(), 3);
    assert_eq!(snapshot.status, DeploymentStatus::Building);
    assert!(snapshot.is_polling);
    assert!(!snapshot.is_loading);

    sleep(Duration::from_millis(2100)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.logs.len(), 5);
    assert_eq!(snapshot.status, DeploymentStatus::Running);
    assert!(!snapshot.is_polling);

    sleep(Duration::from_secs(20)).await;
    assert_eq!(fetcher.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cursor_chains_through_ticks() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1, 2], DeploymentStatus::Building, Some("c2")));
    fetcher.reply(batch(&[3], DeploymentStatus::Building, Some("c3")));
    fetcher.reply(batch(&[4, 5], DeploymentStatus::Deploying, Some("c5")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(1000)).await.unwrap();
    sleep(Duration::from_millis(2100)).await;

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[0].1.cursor, None);
    assert_eq!(requests[1].1.cursor, Some(Cursor::new("c2")));
    assert_eq!(requests[2].1.cursor, Some(Cursor::new("c3")));
    assert!(requests.iter().all(|(id, req)| id == "dep-1" && req.limit == 100));

    let timestamps: Vec<i64> = controller.snapshot().logs.iter().map(|l| l.timestamp).collect();
    assert_eq!(timestamps, vec![1, 2, 3, 4, 5]);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_window_is_not_duplicated() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1, 2], DeploymentStatus::Building, None));
    // No cursor from the backend: the next window overlaps
    fetcher.reply(batch(&[1, 2, 3], DeploymentStatus::Building, None));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(1000)).await.unwrap();
    sleep(Duration::from_millis(1100)).await;

    let timestamps: Vec<i64> = controller.snapshot().logs.iter().map(|l| l.timestamp).collect();
    assert_eq!(timestamps, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_terminal_on_first_fetch_never_polls() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1], DeploymentStatus::BuildingFail, Some("1")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(2000)).await.unwrap();

    let snapshot = controller.snapshot();
    assert!(!snapshot.is_polling);
    assert_eq!(snapshot.status, DeploymentStatus::BuildingFail);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(fetcher.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_initial_failure_is_returned_and_recorded() {
    let fetcher = ScriptedFetcher::new();
    fetcher.fail(WatchError::FetchFailed("Deployment not found".to_string()));

    let controller = controller(&fetcher);
    let result = controller.start("dep-404", options(2000)).await;
    assert!(matches!(result, Err(WatchError::FetchFailed(ref reason)) if reason == "Deployment not found"));

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.error.as_deref(), Some("Deployment not found"));
    assert!(!snapshot.is_loading);
    assert!(!snapshot.is_polling);
    assert!(snapshot.logs.is_empty());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(fetcher.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tick_failure_keeps_polling() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1, 2], DeploymentStatus::Building, Some("2")));
    fetcher.fail(WatchError::FetchFailed("Internal server error".to_string()));
    fetcher.reply(batch(&[3], DeploymentStatus::Building, Some("3")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(2000)).await.unwrap();

    sleep(Duration::from_millis(2100)).await;
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.error.as_deref(), Some("Internal server error"));
    assert_eq!(snapshot.logs.len(), 2);
    assert!(snapshot.is_polling);

    sleep(Duration::from_millis(2000)).await;
    let snapshot = controller.snapshot();
    assert_eq!(fetcher.requests().len(), 3);
    assert_eq!(snapshot.logs.len(), 3);
    assert!(snapshot.error.is_none());
    assert!(snapshot.is_polling);
    // The failed tick did not advance the cursor
    assert_eq!(fetcher.requests()[2].1.cursor, Some(Cursor::new("2")));
}

#[tokio::test(start_paused = true)]
async fn test_missing_token_ends_polling() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1], DeploymentStatus::Building, Some("1")));
    fetcher.fail(WatchError::AuthRequired);

    let controller = controller(&fetcher);
    controller.start("dep-1", options(2000)).await.unwrap();
    sleep(Duration::from_millis(2100)).await;

    let snapshot = controller.snapshot();
    assert!(!snapshot.is_polling);
    assert!(snapshot.error.is_some());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(fetcher.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_replaces_logs() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1, 2, 3], DeploymentStatus::Building, Some("3")));
    fetcher.reply(batch(&[4, 5], DeploymentStatus::Building, Some("5")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(2000)).await.unwrap();
    sleep(Duration::from_millis(2100)).await;
    assert_eq!(controller.snapshot().logs.len(), 5);

    fetcher.reply(batch(&[10], DeploymentStatus::Deploying, Some("10")));
    controller.refresh().await.unwrap();

    let snapshot = controller.snapshot();
    let timestamps: Vec<i64> = snapshot.logs.iter().map(|l| l.timestamp).collect();
    assert_eq!(timestamps, vec![10]);
    assert_eq!(snapshot.status, DeploymentStatus::Deploying);
    assert_eq!(snapshot.reloads, 2);
    assert!(snapshot.is_polling);
    assert_eq!(fetcher.requests().last().unwrap().1.cursor, None);

    // The next tick continues from the refreshed baseline
    fetcher.reply(batch(&[11], DeploymentStatus::Running, Some("11")));
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(fetcher.requests().last().unwrap().1.cursor, Some(Cursor::new("10")));
    assert_eq!(controller.snapshot().logs.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_failure_keeps_logs() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1, 2, 3], DeploymentStatus::Running, Some("3")));
    fetcher.fail(WatchError::FetchFailed("Forbidden".to_string()));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(2000)).await.unwrap();

    assert!(controller.refresh().await.is_err());
    let snapshot = controller.snapshot();
    assert_eq!(snapshot.logs.len(), 3);
    assert_eq!(snapshot.error.as_deref(), Some("Forbidden"));
    assert!(!snapshot.is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_refresh_clears_loading() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1, 2], DeploymentStatus::Running, Some("2")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(2000)).await.unwrap();
    assert!(!controller.is_polling());

    let _reply = fetcher.hold();
    let timed_out = tokio::time::timeout(Duration::from_millis(100), controller.refresh()).await;
    assert!(timed_out.is_err());

    sleep(Duration::from_secs(10)).await;
    let snapshot = controller.snapshot();
    assert!(!snapshot.is_loading);
    assert!(!snapshot.is_polling);
    assert_eq!(snapshot.logs.len(), 2);

    // The view settles instead of waiting on a load that will never finish
    let view = wrwatch::watch::view::LogView::new(controller);
    let mut out = Vec::new();
    let lines = view.render(&mut out, std::future::pending()).await.unwrap();
    assert_eq!(lines, 2);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_waits_for_in_flight_tick() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1], DeploymentStatus::Building, Some("1")));
    let tick_reply = fetcher.hold();
    fetcher.reply(batch(&[10], DeploymentStatus::Building, Some("10")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(1000)).await.unwrap();
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(fetcher.requests().len(), 2);

    let refresh = controller.refresh();
    tokio::pin!(refresh);
    tokio::select! {
        biased;
        _ = &mut refresh => panic!("refresh should wait for the tick in flight"),
        _ = tokio::task::yield_now() => {}
    }
    assert_eq!(fetcher.requests().len(), 2);

    let _ = tick_reply.send(Ok(batch(&[2], DeploymentStatus::Building, Some("2"))));
    refresh.await.unwrap();

    let requests = fetcher.requests();
    assert_eq!(requests.len(), 3);
    assert_eq!(requests[2].1.cursor, None);

    let snapshot = controller.snapshot();
    let timestamps: Vec<i64> = snapshot.logs.iter().map(|l| l.timestamp).collect();
    assert_eq!(timestamps, vec![10]);
    assert_eq!(snapshot.reloads, 2);

    fetcher.reply(batch(&[11], DeploymentStatus::Running, Some("11")));
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(fetcher.requests()[3].1.cursor, Some(Cursor::new("10")));
    assert_eq!(controller.snapshot().logs.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_discards_in_flight_refresh() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1, 2, 3], DeploymentStatus::Building, Some("3")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(60_000)).await.unwrap();

    let reply = fetcher.hold();
    let refresh = controller.refresh();
    tokio::pin!(refresh);

    // Drive the refresh until it waits on the held reply
    tokio::select! {
        biased;
        _ = &mut refresh => panic!("refresh should be waiting on the held reply"),
        _ = tokio::task::yield_now() => {}
    }
    assert!(controller.snapshot().is_loading);

    controller.teardown();
    let _ = reply.send(Ok(batch(&[99], DeploymentStatus::Failed, Some("99"))));
    refresh.await.unwrap();

    let snapshot = controller.snapshot();
    let timestamps: Vec<i64> = snapshot.logs.iter().map(|l| l.timestamp).collect();
    assert_eq!(timestamps, vec![1, 2, 3]);
    assert_eq!(snapshot.status, DeploymentStatus::Building);
    assert!(snapshot.error.is_none());
    assert!(!snapshot.is_polling);
}

#[tokio::test(start_paused = true)]
async fn test_teardown_discards_in_flight_tick() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1], DeploymentStatus::Building, Some("1")));
    let reply = fetcher.hold();

    let controller = controller(&fetcher);
    controller.start("dep-1", options(1000)).await.unwrap();
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(fetcher.requests().len(), 2);

    controller.teardown();
    let _ = reply.send(Ok(batch(&[2], DeploymentStatus::Running, Some("2"))));
    sleep(Duration::from_secs(10)).await;

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.logs.len(), 1);
    assert_eq!(snapshot.status, DeploymentStatus::Building);
    assert!(!snapshot.is_polling);
    assert_eq!(fetcher.requests().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_is_idempotent() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1], DeploymentStatus::Queued, Some("1")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(2000)).await.unwrap();
    assert!(controller.is_polling());

    controller.stop();
    controller.stop();
    assert!(!controller.is_polling());

    sleep(Duration::from_secs(30)).await;
    assert_eq!(fetcher.requests().len(), 1);
    // Stopping does not discard what was loaded
    assert_eq!(controller.snapshot().logs.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_restart_rebinds_to_new_deployment() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1], DeploymentStatus::Building, Some("1")));
    fetcher.reply(batch(&[7], DeploymentStatus::Inspecting, Some("7")));
    fetcher.reply(batch(&[8], DeploymentStatus::Building, Some("8")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(2000)).await.unwrap();
    controller.start("dep-2", options(2000)).await.unwrap();
    assert_eq!(controller.deployment_id().as_deref(), Some("dep-2"));

    sleep(Duration::from_millis(2100)).await;

    let requests = fetcher.requests();
    let ids: Vec<&str> = requests.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["dep-1", "dep-2", "dep-2"]);

    let snapshot = controller.snapshot();
    let timestamps: Vec<i64> = snapshot.logs.iter().map(|l| l.timestamp).collect();
    assert_eq!(timestamps, vec![7, 8]);
    assert_eq!(snapshot.deployment_id.as_deref(), Some("dep-2"));
}

#[tokio::test(start_paused = true)]
async fn test_disabled_or_missing_deployment_stays_idle() {
    let fetcher = ScriptedFetcher::new();
    let controller = controller(&fetcher);

    let disabled = WatchOptions {
        enabled: false,
        ..options(2000)
    };
    controller.start("dep-1", disabled).await.unwrap();
    controller.start("", options(2000)).await.unwrap();
    controller.refresh().await.unwrap();

    sleep(Duration::from_secs(10)).await;
    assert!(fetcher.requests().is_empty());

    let snapshot = controller.snapshot();
    assert!(snapshot.deployment_id.is_none());
    assert!(!snapshot.is_polling);
}

#[tokio::test(start_paused = true)]
async fn test_subscribers_see_updates() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1], DeploymentStatus::Building, Some("1")));
    fetcher.reply(batch(&[2], DeploymentStatus::Running, Some("2")));

    let controller = controller(&fetcher);
    let mut rx = controller.subscribe();
    controller.start("dep-1", options(500)).await.unwrap();
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().logs.len(), 1);

    while rx.borrow().status != DeploymentStatus::Running {
        rx.changed().await.unwrap();
    }
    assert_eq!(rx.borrow().logs.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_polling() {
    let fetcher = ScriptedFetcher::new();
    fetcher.reply(batch(&[1], DeploymentStatus::Building, Some("1")));

    let controller = controller(&fetcher);
    controller.start("dep-1", options(1000)).await.unwrap();
    drop(controller);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(fetcher.requests().len(), 1);
}
