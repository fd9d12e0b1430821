//! Bind-graph operations.
//!
//! Binds are named directed edges from a collection to a child resource,
//! the graph analogue of hard links: `(parent, name)` is unique, while a
//! resource may be the target of any number of binds. Traversal guards
//! against revisiting nodes reached through multiple parents; true
//! ancestor/descendant cycles are prevented at the ACL layer.

use std::collections::{HashMap, HashSet, VecDeque};

use arbor_store::StoreTransaction;
use arbor_types::{Bind, RepoError, RepoResult, ResourceId, StoreError};

use crate::context::TxnContext;

/// Result of a [`rebind`]: the moved child, and the resource displaced from
/// the destination name, if any. The displaced resource is an orphan
/// candidate and goes through the configured collection path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebindOutcome {
    pub moved_child: ResourceId,
    pub displaced: Option<ResourceId>,
}

/// Require that `id` exists and is a collection.
async fn require_collection(
    txn: &mut dyn StoreTransaction,
    ctx: &mut TxnContext,
    id: ResourceId,
) -> RepoResult<()> {
    match ctx.resource_kind(txn, id).await? {
        None => Err(RepoError::NotFound(format!("resource {} does not exist", id))),
        Some(kind) if !kind.is_collection() => Err(RepoError::PreconditionFailed(format!(
            "resource {} is not a collection",
            id
        ))),
        Some(_) => Ok(()),
    }
}

/// Insert a bind edge. The child becomes reachable via this new path.
///
/// Fails with `Conflict` when `(parent, name)` is already taken, and with
/// `PreconditionFailed` when the parent is not a collection.
pub async fn insert_bind(
    txn: &mut dyn StoreTransaction,
    ctx: &mut TxnContext,
    parent_id: ResourceId,
    child_id: ResourceId,
    name: &str,
) -> RepoResult<()> {
    require_collection(txn, ctx, parent_id).await?;
    if ctx.resource_kind(txn, child_id).await?.is_none() {
        return Err(RepoError::NotFound(format!(
            "resource {} does not exist",
            child_id
        )));
    }

    let bind = Bind { parent_id, child_id, name: name.to_string() };
    match txn.insert_bind(&bind).await {
        Ok(()) => {}
        Err(StoreError::Conflict) => {
            return Err(RepoError::Conflict(format!(
                "bind '{}' already exists under resource {}",
                name, parent_id
            )));
        }
        Err(e) => return Err(e.into()),
    }
    txn.touch_resource(parent_id).await?;

    tracing::debug!(parent_id, child_id, name, "bind inserted");
    Ok(())
}

/// Remove a bind edge. The resource itself is untouched; reachability is
/// the collector's concern.
pub async fn delete_bind(
    txn: &mut dyn StoreTransaction,
    parent_id: ResourceId,
    child_id: ResourceId,
    name: &str,
) -> RepoResult<Bind> {
    match txn.bind_by_name(parent_id, name).await? {
        Some(bind) if bind.child_id == child_id => {}
        _ => {
            return Err(RepoError::NotFound(format!(
                "no bind '{}' from resource {} to resource {}",
                name, parent_id, child_id
            )));
        }
    }
    let removed = txn
        .delete_bind(parent_id, name)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("bind '{}' vanished", name)))?;
    txn.touch_resource(parent_id).await?;

    tracing::debug!(parent_id, child_id, name, "bind deleted");
    Ok(removed)
}

/// Atomically move a bind, the MOVE primitive.
///
/// When the destination name already refers to a resource, that binding is
/// removed first and its old target reported as displaced so the caller can
/// run the orphan check on it.
pub async fn rebind(
    txn: &mut dyn StoreTransaction,
    ctx: &mut TxnContext,
    src_parent_id: ResourceId,
    src_name: &str,
    dst_parent_id: ResourceId,
    dst_name: &str,
) -> RepoResult<RebindOutcome> {
    match require_collection(txn, ctx, dst_parent_id).await {
        Ok(()) => {}
        // A missing destination parent is caller-correctable, not a lookup
        // failure on the thing being moved.
        Err(RepoError::NotFound(msg)) => return Err(RepoError::PreconditionFailed(msg)),
        Err(e) => return Err(e),
    }

    let source = txn.bind_by_name(src_parent_id, src_name).await?.ok_or_else(|| {
        RepoError::NotFound(format!(
            "no bind '{}' under resource {}",
            src_name, src_parent_id
        ))
    })?;

    // Moving a bind onto itself is a no-op.
    if src_parent_id == dst_parent_id && src_name == dst_name {
        return Ok(RebindOutcome { moved_child: source.child_id, displaced: None });
    }

    let displaced = match txn.delete_bind(dst_parent_id, dst_name).await? {
        Some(old) => Some(old.child_id),
        None => None,
    };

    txn.delete_bind(src_parent_id, src_name).await?;
    txn.insert_bind(&Bind {
        parent_id: dst_parent_id,
        child_id: source.child_id,
        name: dst_name.to_string(),
    })
    .await?;

    txn.touch_resource(src_parent_id).await?;
    txn.touch_resource(dst_parent_id).await?;

    tracing::debug!(
        src_parent_id,
        src_name,
        dst_parent_id,
        dst_name,
        moved_child = source.child_id,
        displaced = ?displaced,
        "bind moved"
    );
    Ok(RebindOutcome { moved_child: source.child_id, displaced })
}

/// Breadth-first shortest path from `from` to `to` along bind edges.
///
/// Returns the ancestor chain `from, .., to`, or `None` when unreachable.
/// Reachability is boolean; when several shortest paths exist any one of
/// them is returned.
pub async fn find_shortest_path(
    txn: &mut dyn StoreTransaction,
    from: ResourceId,
    to: ResourceId,
) -> RepoResult<Option<Vec<ResourceId>>> {
    if from == to {
        return Ok(Some(vec![from]));
    }

    let mut predecessor: HashMap<ResourceId, ResourceId> = HashMap::new();
    let mut visited: HashSet<ResourceId> = HashSet::new();
    let mut queue: VecDeque<ResourceId> = VecDeque::new();

    visited.insert(from);
    queue.push_back(from);

    while let Some(current) = queue.pop_front() {
        for bind in txn.binds_of_parent(current).await? {
            if !visited.insert(bind.child_id) {
                continue;
            }
            predecessor.insert(bind.child_id, current);
            if bind.child_id == to {
                let mut chain = vec![to];
                let mut at = to;
                while let Some(&prev) = predecessor.get(&at) {
                    chain.push(prev);
                    at = prev;
                }
                chain.reverse();
                return Ok(Some(chain));
            }
            queue.push_back(bind.child_id);
        }
    }

    Ok(None)
}
