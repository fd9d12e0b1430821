//! Transitive group-membership closure with path-multiplicity counts.
//!
//! The closure table holds one row per `(group, member)` pair reachable
//! through nested membership, counting the distinct paths between them.
//! Membership tests are a single row lookup; removal subtracts exactly the
//! multiplicity the removed edge contributed, so a member still reachable
//! through another path keeps its remaining count.

use std::collections::HashSet;

use arbor_store::StoreTransaction;
use arbor_types::{PrincipalId, RepoError, RepoResult};

use crate::context::TxnContext;

/// Transitive membership test. Self-membership is always true without a row.
pub async fn is_member(
    txn: &mut dyn StoreTransaction,
    member_id: PrincipalId,
    group_id: PrincipalId,
) -> RepoResult<bool> {
    if member_id == group_id {
        return Ok(true);
    }
    Ok(txn.closure_count(group_id, member_id).await? > 0)
}

/// Whether adding `candidate_member` to `group` would create a cycle:
/// the intersection of {group and its ancestors} with {candidate and its
/// descendants} is non-empty.
pub async fn would_create_cycle(
    txn: &mut dyn StoreTransaction,
    group_id: PrincipalId,
    candidate_member_id: PrincipalId,
) -> RepoResult<bool> {
    if group_id == candidate_member_id {
        return Ok(true);
    }

    let mut up: HashSet<PrincipalId> = HashSet::new();
    up.insert(group_id);
    for row in txn.closure_ancestors(group_id).await? {
        up.insert(row.ancestor_group_id);
    }

    if up.contains(&candidate_member_id) {
        return Ok(true);
    }
    for row in txn.closure_descendants(candidate_member_id).await? {
        if up.contains(&row.descendant_member_id) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The `(node, path_count)` pairs of one side of the closure product:
/// the node itself with count 1, plus its closure rows in the given
/// direction.
async fn gather_up(
    txn: &mut dyn StoreTransaction,
    group_id: PrincipalId,
) -> RepoResult<Vec<(PrincipalId, i64)>> {
    let mut side = vec![(group_id, 1)];
    for row in txn.closure_ancestors(group_id).await? {
        side.push((row.ancestor_group_id, row.count));
    }
    Ok(side)
}

async fn gather_down(
    txn: &mut dyn StoreTransaction,
    member_id: PrincipalId,
) -> RepoResult<Vec<(PrincipalId, i64)>> {
    let mut side = vec![(member_id, 1)];
    for row in txn.closure_descendants(member_id).await? {
        side.push((row.descendant_member_id, row.count));
    }
    Ok(side)
}

/// Require a principal-kind resource (user or group); groups additionally
/// when `must_be_group`.
async fn require_principal(
    txn: &mut dyn StoreTransaction,
    ctx: &mut TxnContext,
    id: PrincipalId,
    must_be_group: bool,
) -> RepoResult<()> {
    match ctx.resource_kind(txn, id).await? {
        None => Err(RepoError::NotFound(format!("resource {} does not exist", id))),
        Some(kind) if must_be_group && kind != arbor_types::ResourceKind::Group => Err(
            RepoError::PreconditionFailed(format!("resource {} is not a group", id)),
        ),
        Some(kind) if !kind.is_principal() => Err(RepoError::PreconditionFailed(format!(
            "resource {} is not a principal",
            id
        ))),
        Some(_) => Ok(()),
    }
}

/// Add a direct membership edge and fold it into the closure.
///
/// For every pair `(g, m)` in ({group} ∪ ancestors) × ({member} ∪
/// descendants), the pair's count grows by `count(g, group) *
/// count(member, m)`. Cycle detection and the duplicate-edge check run
/// before any mutation, so a failed add leaves the tables untouched.
pub async fn add_edge(
    txn: &mut dyn StoreTransaction,
    ctx: &mut TxnContext,
    group_id: PrincipalId,
    member_id: PrincipalId,
) -> RepoResult<()> {
    require_principal(txn, ctx, group_id, true).await?;
    require_principal(txn, ctx, member_id, false).await?;

    if txn.group_member_exists(group_id, member_id).await? {
        return Err(RepoError::PreconditionFailed(format!(
            "principal {} is already a direct member of group {}",
            member_id, group_id
        )));
    }
    if would_create_cycle(txn, group_id, member_id).await? {
        return Err(RepoError::PreconditionFailed(format!(
            "adding {} to group {} would create a membership cycle",
            member_id, group_id
        )));
    }

    let up = gather_up(txn, group_id).await?;
    let down = gather_down(txn, member_id).await?;
    for &(g, count_g) in &up {
        for &(m, count_m) in &down {
            txn.adjust_closure(g, m, count_g * count_m).await?;
        }
    }
    txn.insert_group_member(group_id, member_id).await?;

    tracing::debug!(group_id, member_id, "group membership added");
    Ok(())
}

/// Remove a direct membership edge, subtracting exactly the multiplicity it
/// contributed. Rows reaching zero disappear; rows still backed by another
/// path keep their remaining count.
pub async fn remove_edge(
    txn: &mut dyn StoreTransaction,
    group_id: PrincipalId,
    member_id: PrincipalId,
) -> RepoResult<()> {
    if !txn.delete_group_member(group_id, member_id).await? {
        return Err(RepoError::NotFound(format!(
            "principal {} is not a direct member of group {}",
            member_id, group_id
        )));
    }

    // Ancestor paths of the group and descendant paths of the member never
    // traverse the removed edge, so both sides read the same as before the
    // add that mirrors this removal.
    let up = gather_up(txn, group_id).await?;
    let down = gather_down(txn, member_id).await?;
    for &(g, count_g) in &up {
        for &(m, count_m) in &down {
            txn.adjust_closure(g, m, -(count_g * count_m)).await?;
        }
    }

    tracing::debug!(group_id, member_id, "group membership removed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_store::{MemoryBackend, RelationalStore};
    use arbor_types::ResourceKind;

    async fn group(txn: &mut dyn StoreTransaction) -> PrincipalId {
        txn.insert_resource(ResourceKind::Group, 0).await.unwrap()
    }

    async fn user(txn: &mut dyn StoreTransaction) -> PrincipalId {
        txn.insert_resource(ResourceKind::Principal, 0).await.unwrap()
    }

    #[tokio::test]
    async fn nested_membership_is_transitive() {
        let store = MemoryBackend::new();
        let mut txn = store.begin().await.unwrap();
        let mut ctx = TxnContext::new();

        let staff = group(txn.as_mut()).await;
        let eng = group(txn.as_mut()).await;
        let alice = user(txn.as_mut()).await;

        add_edge(txn.as_mut(), &mut ctx, staff, eng).await.unwrap();
        add_edge(txn.as_mut(), &mut ctx, eng, alice).await.unwrap();

        assert!(is_member(txn.as_mut(), alice, eng).await.unwrap());
        assert!(is_member(txn.as_mut(), alice, staff).await.unwrap());
        assert!(is_member(txn.as_mut(), eng, staff).await.unwrap());
        assert!(!is_member(txn.as_mut(), staff, eng).await.unwrap());
        assert!(is_member(txn.as_mut(), alice, alice).await.unwrap());
        txn.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn counts_track_distinct_paths() {
        let store = MemoryBackend::new();
        let mut txn = store.begin().await.unwrap();
        let mut ctx = TxnContext::new();

        // top -> {left, right} -> bottom -> alice: two paths top..bottom.
        let top = group(txn.as_mut()).await;
        let left = group(txn.as_mut()).await;
        let right = group(txn.as_mut()).await;
        let bottom = group(txn.as_mut()).await;
        let alice = user(txn.as_mut()).await;

        add_edge(txn.as_mut(), &mut ctx, top, left).await.unwrap();
        add_edge(txn.as_mut(), &mut ctx, top, right).await.unwrap();
        add_edge(txn.as_mut(), &mut ctx, left, bottom).await.unwrap();
        add_edge(txn.as_mut(), &mut ctx, right, bottom).await.unwrap();
        add_edge(txn.as_mut(), &mut ctx, bottom, alice).await.unwrap();

        assert_eq!(txn.closure_count(top, bottom).await.unwrap(), 2);
        assert_eq!(txn.closure_count(top, alice).await.unwrap(), 2);

        // Dropping one diamond arm halves the multiplicity, not the row.
        remove_edge(txn.as_mut(), left, bottom).await.unwrap();
        assert_eq!(txn.closure_count(top, bottom).await.unwrap(), 1);
        assert_eq!(txn.closure_count(top, alice).await.unwrap(), 1);
        assert!(is_member(txn.as_mut(), alice, top).await.unwrap());

        remove_edge(txn.as_mut(), right, bottom).await.unwrap();
        assert_eq!(txn.closure_count(top, alice).await.unwrap(), 0);
        assert!(!is_member(txn.as_mut(), alice, top).await.unwrap());
        txn.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn cycle_adds_are_rejected_without_mutation() {
        let store = MemoryBackend::new();
        let mut txn = store.begin().await.unwrap();
        let mut ctx = TxnContext::new();

        let a = group(txn.as_mut()).await;
        let b = group(txn.as_mut()).await;
        let c = group(txn.as_mut()).await;

        add_edge(txn.as_mut(), &mut ctx, a, b).await.unwrap();
        add_edge(txn.as_mut(), &mut ctx, b, c).await.unwrap();

        let before_rows = txn.closure_descendants(a).await.unwrap();

        // Direct, transitive, and self cycles.
        for (g, m) in [(c, a), (b, a), (a, a)] {
            let err = add_edge(txn.as_mut(), &mut ctx, g, m).await.unwrap_err();
            assert!(matches!(err, RepoError::PreconditionFailed(_)));
        }

        assert_eq!(txn.closure_descendants(a).await.unwrap(), before_rows);
        txn.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_direct_edge_is_a_precondition_failure() {
        let store = MemoryBackend::new();
        let mut txn = store.begin().await.unwrap();
        let mut ctx = TxnContext::new();

        let g = group(txn.as_mut()).await;
        let alice = user(txn.as_mut()).await;

        add_edge(txn.as_mut(), &mut ctx, g, alice).await.unwrap();
        let err = add_edge(txn.as_mut(), &mut ctx, g, alice).await.unwrap_err();
        assert!(matches!(err, RepoError::PreconditionFailed(_)));
        txn.rollback().await.unwrap();
    }

    #[tokio::test]
    async fn membership_in_a_plain_resource_is_rejected() {
        let store = MemoryBackend::new();
        let mut txn = store.begin().await.unwrap();
        let mut ctx = TxnContext::new();

        let not_a_group = txn.insert_resource(ResourceKind::Collection, 0).await.unwrap();
        let alice = user(txn.as_mut()).await;

        let err = add_edge(txn.as_mut(), &mut ctx, not_a_group, alice).await.unwrap_err();
        assert!(matches!(err, RepoError::PreconditionFailed(_)));
        txn.rollback().await.unwrap();
    }
}
