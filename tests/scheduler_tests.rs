//! # Scheduler Tests
//!
//! Timer-driven passes under paused tokio time.

mod common;

use common::{FakeStore, RecordingTarget};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use vault_sync_controller::runtime::{run_pass, PassState, Scheduler};
use vault_sync_controller::source::TreeWalker;
use vault_sync_controller::{ReconcileDriver, ReconcilerError};

const ROOT: &str = "secret/data/apps";

fn driver(store: &Arc<FakeStore>, target: &Arc<RecordingTarget>) -> ReconcileDriver {
    ReconcileDriver::new(TreeWalker::new(Arc::<FakeStore>::clone(store)), Arc::<RecordingTarget>::clone(target), ROOT, true)
}

fn healthy_store() -> Arc<FakeStore> {
    Arc::new(FakeStore::with_kv_mount().leaf(ROOT, "team-a", "secrets", "db", json!({"k": "v"})))
}

fn passes(store: &FakeStore) -> usize {
    store
        .calls()
        .iter()
        .filter(|call| call.starts_with("mounts:"))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_runs_one_pass_per_period_until_shutdown() {
    let store = healthy_store();
    let target = Arc::new(RecordingTarget::new());
    let state = Arc::new(PassState::default());

    Scheduler::new(driver(&store, &target), Duration::from_secs(100))
        .with_pass_state(Arc::clone(&state))
        .run_until(tokio::time::sleep(Duration::from_secs(250)))
        .await
        .unwrap();

    // Immediate first pass, then at 100s and 200s
    assert_eq!(passes(&store), 3);
    let snapshot = state.snapshot();
    assert!(snapshot.ready);
    assert!(snapshot.last_pass_ok);
    assert_eq!(snapshot.passes, 3);
    assert_eq!(snapshot.failed_passes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_failed_pass_is_retried_on_next_tick() {
    let store = Arc::new(FakeStore::with_kv_mount().failing_list(ROOT));
    let target = Arc::new(RecordingTarget::new());
    let state = Arc::new(PassState::default());

    Scheduler::new(driver(&store, &target), Duration::from_secs(60))
        .with_pass_state(Arc::clone(&state))
        .run_until(tokio::time::sleep(Duration::from_secs(150)))
        .await
        .unwrap();

    assert_eq!(passes(&store), 3);
    assert!(!state.is_ready());
    assert_eq!(state.snapshot().failed_passes, 3);
    assert!(target.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_exit_on_pass_error_stops_the_loop() {
    let store = Arc::new(FakeStore::with_kv_mount().failing_list(ROOT));
    let target = Arc::new(RecordingTarget::new());

    let result = Scheduler::new(driver(&store, &target), Duration::from_secs(60))
        .with_exit_on_pass_error(true)
        .run_until(std::future::pending::<()>())
        .await;

    assert!(matches!(result, Err(ReconcilerError::Discovery(_))));
    assert_eq!(passes(&store), 1);
}

#[tokio::test]
async fn test_run_pass_returns_summary() {
    let store = healthy_store();
    let target = Arc::new(RecordingTarget::new());

    let summary = run_pass(&driver(&store, &target), 1).await.unwrap();

    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.upserted, 1);
}
