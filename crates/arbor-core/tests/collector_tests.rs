//! Background collector integration tests.
//!
//! The worker must drain queued orphan candidates within a poll interval,
//! re-check reachability at drain time, skip stale entries, and observe a
//! stop request within one poll interval.

use std::time::Duration;

use arbor_core::{CollectorConfig, DrainOutcome};
use arbor_store::RelationalStore;
use arbor_test_fixtures::{
    memory_repository, memory_repository_with_collector, memory_repository_with_store,
    new_collection, new_resource,
};
use arbor_types::GcMode;

fn fast_collector() -> CollectorConfig {
    CollectorConfig {
        poll_interval: Duration::from_millis(50),
        shutdown_wait: Duration::from_secs(2),
    }
}

#[tokio::test]
async fn worker_drains_queued_orphans() {
    let repo = memory_repository_with_collector(GcMode::Background, fast_collector()).await;
    let root = repo.root_id();

    // root -> a -> b: unbinding a orphans the whole chain.
    let a = new_collection(&repo, root, "a").await.unwrap();
    let b = new_resource(&repo, a, "b").await.unwrap();
    repo.unbind(root, a, "a").await.unwrap();

    let handle = repo.start_collector();

    // a is drained on the first pass, b on the cascaded one.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(repo.resource(a).await.unwrap().is_none());
    assert!(repo.resource(b).await.unwrap().is_none());
    assert_eq!(repo.cleanup_queue_len().await.unwrap(), 0);

    assert!(handle.stop().await);
}

#[tokio::test]
async fn worker_keeps_entries_that_regained_reachability() {
    let repo = memory_repository(GcMode::Background).await;
    let root = repo.root_id();

    let a = new_resource(&repo, root, "a").await.unwrap();
    repo.unbind(root, a, "a").await.unwrap();

    // The graph changed between enqueue and drain: a is reachable again.
    repo.bind(root, a, "a-again").await.unwrap();

    let outcome = repo.drain_cleanup_once().await.unwrap();
    assert_eq!(outcome, DrainOutcome::StillReachable(a));
    assert!(repo.resource(a).await.unwrap().is_some());
}

#[tokio::test]
async fn worker_skips_entries_for_vanished_resources() {
    let (repo, store) = memory_repository_with_store(GcMode::Background).await;
    let root = repo.root_id();

    let a = new_resource(&repo, root, "a").await.unwrap();
    repo.unbind(root, a, "a").await.unwrap();
    assert_eq!(repo.cleanup_queue_len().await.unwrap(), 1);

    // The resource vanishes out from under the queue entry.
    let mut txn = store.begin().await.unwrap();
    assert!(txn.delete_resource(a).await.unwrap());
    txn.commit().await.unwrap();

    let outcome = repo.drain_cleanup_once().await.unwrap();
    assert_eq!(outcome, DrainOutcome::Vanished(a));
    assert_eq!(
        repo.drain_cleanup_once().await.unwrap(),
        DrainOutcome::Empty
    );
}

#[tokio::test]
async fn cascaded_children_are_requeued_not_deleted_blindly() {
    let repo = memory_repository(GcMode::Background).await;
    let root = repo.root_id();

    // root -> a -> shared, root -> keep -> shared.
    let a = new_collection(&repo, root, "a").await.unwrap();
    let keep = new_collection(&repo, root, "keep").await.unwrap();
    let shared = new_resource(&repo, a, "shared").await.unwrap();
    repo.bind(keep, shared, "shared").await.unwrap();

    repo.unbind(root, a, "a").await.unwrap();

    // First drain deletes a and enqueues shared for its own check.
    let outcome = repo.drain_cleanup_once().await.unwrap();
    assert!(
        matches!(outcome, DrainOutcome::Deleted { id, children_enqueued: 1 } if id == a)
    );

    // Second drain finds shared still reachable through keep.
    let outcome = repo.drain_cleanup_once().await.unwrap();
    assert_eq!(outcome, DrainOutcome::StillReachable(shared));
    assert!(repo.resource(shared).await.unwrap().is_some());
}

#[tokio::test]
async fn stop_is_observed_within_a_poll_interval() {
    let repo = memory_repository_with_collector(GcMode::Background, fast_collector()).await;

    let handle = repo.start_collector();
    tokio::time::sleep(Duration::from_millis(120)).await;

    let started = std::time::Instant::now();
    assert!(handle.stop().await);
    // One poll interval (50ms) plus scheduling slack.
    assert!(started.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn queue_survives_while_no_worker_runs() {
    let repo = memory_repository(GcMode::Background).await;
    let root = repo.root_id();

    let a = new_resource(&repo, root, "a").await.unwrap();
    repo.unbind(root, a, "a").await.unwrap();

    // No worker started: the entry stays durable in the store.
    assert_eq!(repo.cleanup_queue_len().await.unwrap(), 1);
    assert!(repo.resource(a).await.unwrap().is_some());
}
