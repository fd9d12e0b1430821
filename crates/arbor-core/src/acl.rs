//! ACL-inheritance index.
//!
//! Each resource carries one materialized path row: the ordered ancestor-id
//! chain from the root down to the resource, recorded for the parent through
//! which its ACL was established (which need not equal the current bind
//! parent). ACE resolution joins the ACE table against this chain;
//! re-parenting moves an entire subtree's inheritance with one bulk prefix
//! rewrite instead of a per-node walk.

use std::collections::HashSet;

use arbor_store::StoreTransaction;
use arbor_types::{
    Ace, AclPath, PrincipalId, PrivilegeId, RepoError, RepoResult, ResourceId,
};

use crate::context::TxnContext;
use crate::groups;

/// Record the root resource's path: just its own id.
pub async fn establish_root(
    txn: &mut dyn StoreTransaction,
    resource_id: ResourceId,
) -> RepoResult<()> {
    if txn.acl_path(resource_id).await?.is_some() {
        return Ok(());
    }
    txn.put_acl_path(resource_id, &AclPath::root(resource_id)).await?;
    Ok(())
}

/// Establish the ACL-inheritance parent of a resource.
///
/// Idempotent: once a resource has a path row it is never silently
/// re-derived; callers that want to move inheritance use [`reparent`].
pub async fn establish(
    txn: &mut dyn StoreTransaction,
    resource_id: ResourceId,
    acl_parent_id: ResourceId,
) -> RepoResult<()> {
    if txn.acl_path(resource_id).await?.is_some() {
        return Ok(());
    }
    let parent_path = txn.acl_path(acl_parent_id).await?.ok_or_else(|| {
        RepoError::NotFound(format!(
            "resource {} has no acl inheritance path",
            acl_parent_id
        ))
    })?;
    if parent_path.passes_through(resource_id) {
        return Err(RepoError::PreconditionFailed(format!(
            "acl inheritance from {} would loop through {}",
            acl_parent_id, resource_id
        )));
    }
    txn.put_acl_path(resource_id, &parent_path.child(resource_id)).await?;
    tracing::debug!(resource_id, acl_parent_id, "acl inheritance established");
    Ok(())
}

/// The ACEs applicable to a resource, one winner per (principal, privilege).
///
/// Ordering for conflicting entries: non-inherited before inherited,
/// protected before non-protected, nearer ancestor before farther, lower
/// ACE id last. The first entry per (principal, privilege) under this
/// ordering wins.
pub async fn resolve_applicable_aces(
    txn: &mut dyn StoreTransaction,
    resource_id: ResourceId,
) -> RepoResult<Vec<Ace>> {
    let path = txn.acl_path(resource_id).await?.ok_or_else(|| {
        RepoError::NotFound(format!(
            "resource {} has no acl inheritance path",
            resource_id
        ))
    })?;
    let ancestors = path.segments();
    let mut aces = txn.aces_for_resources(&ancestors).await?;

    // Nearness of an ancestor is its position along the chain; the resource
    // itself sits at the end.
    let rank_of = |id: ResourceId| -> usize {
        ancestors.iter().position(|&a| a == id).unwrap_or(0)
    };
    aces.sort_by_key(|ace| {
        (
            ace.inherited || ace.resource_id != resource_id,
            !ace.protected,
            std::cmp::Reverse(rank_of(ace.resource_id)),
            ace.id,
        )
    });

    let mut seen: HashSet<(PrincipalId, PrivilegeId)> = HashSet::new();
    let winners = aces
        .into_iter()
        .filter(|ace| seen.insert((ace.principal_id, ace.privilege_id)))
        .collect();
    Ok(winners)
}

/// Move a resource's ACL inheritance under a new parent, rewriting the
/// whole subtree's paths in one bulk prefix substitution.
///
/// Returns the number of path rows rewritten; 0 when the new parent yields
/// the path the resource already has.
pub async fn reparent(
    txn: &mut dyn StoreTransaction,
    resource_id: ResourceId,
    new_acl_parent_id: ResourceId,
) -> RepoResult<u64> {
    let old_path = txn.acl_path(resource_id).await?.ok_or_else(|| {
        RepoError::NotFound(format!(
            "resource {} has no acl inheritance path",
            resource_id
        ))
    })?;
    let parent_path = txn.acl_path(new_acl_parent_id).await?.ok_or_else(|| {
        RepoError::NotFound(format!(
            "resource {} has no acl inheritance path",
            new_acl_parent_id
        ))
    })?;

    // The new parent inheriting through the resource itself would make the
    // chain circular.
    if parent_path.passes_through(resource_id) {
        return Err(RepoError::PreconditionFailed(format!(
            "acl inheritance from {} would loop through {}",
            new_acl_parent_id, resource_id
        )));
    }

    let new_path = parent_path.child(resource_id);
    if new_path == old_path {
        return Ok(0);
    }

    let touched = txn.rewrite_acl_paths(&old_path, &new_path).await?;
    tracing::debug!(
        resource_id,
        new_acl_parent_id,
        touched,
        "acl inheritance subtree re-parented"
    );
    Ok(touched)
}

/// Whether `principal` holds `privilege_name` on `resource`.
///
/// Walks the resolved ACEs in winner order; the first entry whose principal
/// matches (directly or through group membership) and whose granted
/// privilege aggregates the requested one decides. No match means deny.
pub async fn principal_has_privilege(
    txn: &mut dyn StoreTransaction,
    ctx: &mut TxnContext,
    principal_id: PrincipalId,
    resource_id: ResourceId,
    privilege_name: &str,
) -> RepoResult<bool> {
    let Some(requested) = ctx.privilege_by_name(txn, privilege_name).await? else {
        return Ok(false);
    };

    let winners = resolve_applicable_aces(txn, resource_id).await?;
    for ace in winners {
        let applies = ace.principal_id == principal_id
            || groups::is_member(txn, principal_id, ace.principal_id).await?;
        if !applies {
            continue;
        }
        if ctx.privilege_satisfies(txn, ace.privilege_id, requested.id).await? {
            return Ok(ace.grant);
        }
    }
    Ok(false)
}
