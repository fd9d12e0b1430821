//! Orphan reachability collection.
//!
//! A resource with no bind path from the root is invisible to every
//! reachable query and is collected. Two modes share the same per-resource
//! check: the inline mode runs it inside the unbinding transaction, the
//! background mode drains a durable queue from a dedicated worker task.
//!
//! Deleting a collection never implies deleting its children: each child is
//! re-checked and survives when it retains an independent bind path.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use arbor_store::{RelationalStore, StoreTransaction};
use arbor_types::{RepoResult, ResourceId};

use crate::context::TxnContext;
use crate::graph;
use crate::groups;

/// Collector timing knobs.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Sleep between polls when the queue is empty.
    pub poll_interval: Duration,
    /// How long `CollectorHandle::stop` waits for the worker to exit before
    /// aborting it.
    pub shutdown_wait: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            shutdown_wait: Duration::from_secs(5),
        }
    }
}

/// Result of draining one queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue was empty.
    Empty,
    /// The entry regained a path from the root since it was enqueued.
    StillReachable(ResourceId),
    /// The entry was deleted; its children were enqueued for their own
    /// check.
    Deleted {
        id: ResourceId,
        children_enqueued: usize,
    },
    /// The entry referenced a resource that no longer exists.
    Vanished(ResourceId),
}

/// Delete one resource row and every satellite row hanging off it.
/// Returns the ids of its own children for re-checking.
async fn delete_single(
    txn: &mut dyn StoreTransaction,
    ctx: &mut TxnContext,
    id: ResourceId,
) -> RepoResult<Vec<ResourceId>> {
    let mut children = Vec::new();
    for bind in txn.binds_of_parent(id).await? {
        txn.delete_bind(id, &bind.name).await?;
        children.push(bind.child_id);
    }
    // Incoming binds can only come from other unreachable resources at this
    // point, but the rows must not dangle.
    for bind in txn.binds_to_child(id).await? {
        txn.delete_bind(bind.parent_id, &bind.name).await?;
    }

    // A collected principal leaves the membership closure consistent.
    if let Some(kind) = ctx.resource_kind(txn, id).await? {
        if kind.is_principal() {
            for group_id in txn.direct_memberships(id).await? {
                groups::remove_edge(txn, group_id, id).await?;
            }
            for member_id in txn.direct_members(id).await? {
                groups::remove_edge(txn, id, member_id).await?;
            }
        }
    }

    txn.delete_aces_for_resource(id).await?;
    txn.delete_acl_path(id).await?;
    txn.delete_resource(id).await?;
    ctx.forget_resource(id);

    info!(resource_id = id, "orphan resource deleted");
    Ok(children)
}

/// Inline collection: check a candidate and, when unreachable, delete it
/// and re-check its children recursively within the same transaction.
/// Returns the number of resources deleted.
pub async fn collect_candidate(
    txn: &mut dyn StoreTransaction,
    ctx: &mut TxnContext,
    root_id: ResourceId,
    candidate: ResourceId,
) -> RepoResult<u64> {
    let mut deleted = 0;
    let mut visited: HashSet<ResourceId> = HashSet::new();
    let mut pending = vec![candidate];

    while let Some(id) = pending.pop() {
        if id == root_id || !visited.insert(id) {
            continue;
        }
        if txn.get_resource(id).await?.is_none() {
            continue;
        }
        if graph::find_shortest_path(txn, root_id, id).await?.is_some() {
            debug!(resource_id = id, "candidate still reachable, kept");
            continue;
        }
        let children = delete_single(txn, ctx, id).await?;
        deleted += 1;
        pending.extend(children);
    }

    Ok(deleted)
}

/// Drain one entry from the durable queue in its own transaction.
///
/// The reachability check is repeated here: the graph may have changed
/// between enqueue and drain.
pub async fn drain_one(
    store: &dyn RelationalStore,
    root_id: ResourceId,
) -> RepoResult<DrainOutcome> {
    let mut txn = store.begin().await?;
    let mut ctx = TxnContext::new();

    let Some(id) = txn.dequeue_cleanup().await? else {
        txn.commit().await?;
        return Ok(DrainOutcome::Empty);
    };

    if txn.get_resource(id).await?.is_none() {
        txn.commit().await?;
        return Ok(DrainOutcome::Vanished(id));
    }

    if graph::find_shortest_path(txn.as_mut(), root_id, id).await?.is_some() {
        txn.commit().await?;
        return Ok(DrainOutcome::StillReachable(id));
    }

    let children = delete_single(txn.as_mut(), &mut ctx, id).await?;
    let children_enqueued = children.len();
    for child in children {
        txn.enqueue_cleanup(child).await?;
    }
    txn.commit().await?;
    Ok(DrainOutcome::Deleted { id, children_enqueued })
}

/// Background orphan collector: one worker per store instance.
pub struct OrphanCollector {
    store: Arc<dyn RelationalStore>,
    root_id: ResourceId,
    config: CollectorConfig,
}

impl OrphanCollector {
    pub fn new(store: Arc<dyn RelationalStore>, root_id: ResourceId, config: CollectorConfig) -> Self {
        Self { store, root_id, config }
    }

    /// Spawn the worker loop. The returned handle stops it.
    pub fn start(self) -> CollectorHandle {
        info!(
            root_id = self.root_id,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "starting orphan collector"
        );

        let (shutdown_tx, shutdown_rx) = watch::channel(());
        let shutdown_wait = self.config.shutdown_wait;
        let handle = tokio::spawn(self.run(shutdown_rx));

        CollectorHandle { shutdown: shutdown_tx, handle, shutdown_wait }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<()>) {
        loop {
            // Observed once per cycle, which is once per dequeued item.
            if shutdown_rx.has_changed().unwrap_or(true) {
                break;
            }

            match drain_one(self.store.as_ref(), self.root_id).await {
                Ok(DrainOutcome::Deleted { id, children_enqueued }) => {
                    debug!(resource_id = id, children_enqueued, "queue entry collected");
                }
                Ok(DrainOutcome::StillReachable(id)) => {
                    debug!(resource_id = id, "queue entry regained reachability");
                }
                Ok(DrainOutcome::Vanished(id)) => {
                    warn!(resource_id = id, "skipping stale cleanup entry");
                }
                Ok(DrainOutcome::Empty) => {
                    if sleep_or_shutdown(self.config.poll_interval, &mut shutdown_rx).await {
                        break;
                    }
                }
                Err(e) => {
                    // Transient store failures retry on the next cycle.
                    error!(error = %e, "orphan collection cycle failed");
                    if sleep_or_shutdown(self.config.poll_interval, &mut shutdown_rx).await {
                        break;
                    }
                }
            }
        }
        info!("orphan collector stopped");
    }
}

/// Sleep for `duration`, waking early on shutdown. Returns `true` when the
/// shutdown signal fired.
async fn sleep_or_shutdown(duration: Duration, shutdown_rx: &mut watch::Receiver<()>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        _ = shutdown_rx.changed() => true,
    }
}

/// Controller side of a running collector.
pub struct CollectorHandle {
    shutdown: watch::Sender<()>,
    handle: JoinHandle<()>,
    shutdown_wait: Duration,
}

impl CollectorHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal shutdown and block until the worker has observably exited.
    ///
    /// The wait is bounded: after `shutdown_wait` the task is aborted and
    /// `false` returned. In-flight transactions are never killed before the
    /// bound expires.
    pub async fn stop(mut self) -> bool {
        let _ = self.shutdown.send(());

        let deadline = tokio::time::Instant::now() + self.shutdown_wait;
        loop {
            if self.handle.is_finished() {
                let _ = (&mut self.handle).await;
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                error!("orphan collector did not exit within the shutdown wait, aborting");
                self.handle.abort();
                return false;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }
}
