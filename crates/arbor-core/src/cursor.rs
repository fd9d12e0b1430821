//! Lazy descendant traversal.
//!
//! [`ChildrenCursor`] walks a resource's subtree breadth-first inside one
//! read transaction, yielding resources as they are visited. The cursor is
//! finite and non-restartable; a visited set keeps diamond-shaped
//! multi-parent reuse from looping.

use std::collections::{HashSet, VecDeque};

use arbor_store::StoreTransaction;
use arbor_types::{Depth, PrincipalId, RepoResult, Resource, ResourceId};

use crate::acl;
use crate::context::TxnContext;

/// Visibility filter applied to every yielded resource: the principal must
/// hold the privilege on it. Filtered-out resources are simply absent from
/// the output.
#[derive(Debug, Clone)]
pub struct AclFilter {
    pub principal_id: PrincipalId,
    pub privilege: String,
}

impl AclFilter {
    pub fn read(principal_id: PrincipalId) -> Self {
        Self { principal_id, privilege: "read".to_string() }
    }
}

/// A lazy, finite, non-restartable cursor over a subtree.
pub struct ChildrenCursor {
    txn: Box<dyn StoreTransaction>,
    ctx: TxnContext,
    queue: VecDeque<(ResourceId, u32)>,
    visited: HashSet<ResourceId>,
    depth: Depth,
    filter: Option<AclFilter>,
}

impl ChildrenCursor {
    pub(crate) fn new(
        txn: Box<dyn StoreTransaction>,
        start: ResourceId,
        depth: Depth,
        filter: Option<AclFilter>,
    ) -> Self {
        let mut queue = VecDeque::new();
        queue.push_back((start, 0));
        Self {
            txn,
            ctx: TxnContext::new(),
            queue,
            visited: HashSet::new(),
            depth,
            filter,
        }
    }

    /// The next visible resource, or `None` when the walk is exhausted.
    pub async fn next(&mut self) -> RepoResult<Option<Resource>> {
        while let Some((id, level)) = self.queue.pop_front() {
            if !self.visited.insert(id) {
                continue;
            }
            let Some(resource) = self.txn.get_resource(id).await? else {
                continue;
            };

            if resource.kind.is_collection() && self.depth.admits(level + 1) {
                for bind in self.txn.binds_of_parent(id).await? {
                    self.queue.push_back((bind.child_id, level + 1));
                }
            }

            if let Some(filter) = &self.filter {
                let visible = acl::principal_has_privilege(
                    self.txn.as_mut(),
                    &mut self.ctx,
                    filter.principal_id,
                    id,
                    &filter.privilege,
                )
                .await?;
                if !visible {
                    continue;
                }
            }

            return Ok(Some(resource));
        }
        Ok(None)
    }

    /// Drain the remaining items and release the transaction.
    pub async fn collect(mut self) -> RepoResult<Vec<Resource>> {
        let mut out = Vec::new();
        while let Some(resource) = self.next().await? {
            out.push(resource);
        }
        self.close().await?;
        Ok(out)
    }

    /// Release the read transaction without consuming the rest.
    pub async fn close(self) -> RepoResult<()> {
        self.txn.rollback().await?;
        Ok(())
    }
}
