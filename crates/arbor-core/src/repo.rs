//! The repository facade.
//!
//! [`Repository`] is the surface the protocol, versioning and locking
//! layers consume. Every public operation runs inside exactly one
//! serializable store transaction; when a derived-index update fails the
//! whole transaction rolls back, so partial index state is never committed.

use std::sync::Arc;

use arbor_store::{RelationalStore, StoreTransaction};
use arbor_types::{
    Ace, AceId, Depth, GcMode, PrincipalId, RepoError, RepoResult, Resource, ResourceId,
    ResourceKind, ROOT_RESOURCE_ID,
};

use crate::acl;
use crate::collector::{self, CollectorConfig, CollectorHandle, DrainOutcome, OrphanCollector};
use crate::context::TxnContext;
use crate::cursor::{AclFilter, ChildrenCursor};
use crate::graph;
use crate::groups;

/// The default privilege tree seeded at initialization, in nested-interval
/// encoding: `all` aggregates the four concrete privileges.
const DEFAULT_PRIVILEGES: &[(&str, i64, i64)] = &[
    ("all", 1, 10),
    ("read", 2, 3),
    ("write", 4, 5),
    ("read-acl", 6, 7),
    ("write-acl", 8, 9),
];

/// Commit on success, roll back on failure.
async fn finish<T>(txn: Box<dyn StoreTransaction>, result: RepoResult<T>) -> RepoResult<T> {
    match result {
        Ok(value) => {
            txn.commit().await?;
            Ok(value)
        }
        Err(e) => {
            txn.rollback().await?;
            Err(e)
        }
    }
}

/// Hierarchical resource repository over a relational store.
pub struct Repository {
    store: Arc<dyn RelationalStore>,
    root_id: ResourceId,
    gc_mode: GcMode,
    collector_config: CollectorConfig,
}

impl Repository {
    pub fn new(store: Arc<dyn RelationalStore>, gc_mode: GcMode) -> Self {
        Self {
            store,
            root_id: ROOT_RESOURCE_ID,
            gc_mode,
            collector_config: CollectorConfig::default(),
        }
    }

    pub fn with_collector_config(mut self, config: CollectorConfig) -> Self {
        self.collector_config = config;
        self
    }

    pub fn root_id(&self) -> ResourceId {
        self.root_id
    }

    pub fn gc_mode(&self) -> GcMode {
        self.gc_mode
    }

    /// Idempotent system initialization: the root collection, its path row,
    /// and the default privilege tree. Safe to call on every startup.
    pub async fn ensure_initialized(&self) -> RepoResult<()> {
        let mut txn = self.store.begin().await?;
        let result: RepoResult<()> = async {
            if txn.get_resource(self.root_id).await?.is_none() {
                let id = txn.insert_resource(ResourceKind::Collection, 0).await?;
                if id != self.root_id {
                    return Err(RepoError::Storage(arbor_types::StoreError::Internal(
                        format!("root resource allocated id {}, expected {}", id, self.root_id),
                    )));
                }
                tracing::info!(root_id = self.root_id, "root collection created");
            }
            acl::establish_root(txn.as_mut(), self.root_id).await?;

            if txn.privilege_by_name("all").await?.is_none() {
                for &(name, lft, rgt) in DEFAULT_PRIVILEGES {
                    txn.insert_privilege(name, lft, rgt).await?;
                }
                tracing::info!("default privilege hierarchy seeded");
            }
            Ok(())
        }
        .await;
        finish(txn, result).await
    }

    // ------------------------------------------------------------------
    // bind graph
    // ------------------------------------------------------------------

    /// Bind `child` under `parent` as `name`. Establishes the child's ACL
    /// inheritance from the parent when the child has none yet.
    pub async fn bind(
        &self,
        parent_id: ResourceId,
        child_id: ResourceId,
        name: &str,
    ) -> RepoResult<()> {
        let mut txn = self.store.begin().await?;
        let mut ctx = TxnContext::new();
        let result: RepoResult<()> = async {
            graph::insert_bind(txn.as_mut(), &mut ctx, parent_id, child_id, name).await?;
            acl::establish(txn.as_mut(), child_id, parent_id).await?;
            Ok(())
        }
        .await;
        finish(txn, result).await
    }

    /// Remove the bind; the child goes through the configured orphan check.
    pub async fn unbind(
        &self,
        parent_id: ResourceId,
        child_id: ResourceId,
        name: &str,
    ) -> RepoResult<()> {
        let mut txn = self.store.begin().await?;
        let mut ctx = TxnContext::new();
        let result: RepoResult<()> = async {
            graph::delete_bind(txn.as_mut(), parent_id, child_id, name).await?;
            self.queue_or_collect(txn.as_mut(), &mut ctx, child_id).await?;
            Ok(())
        }
        .await;
        finish(txn, result).await
    }

    /// Atomically move a bind; a displaced destination target goes through
    /// the configured orphan check.
    pub async fn rebind(
        &self,
        src_parent_id: ResourceId,
        src_name: &str,
        dst_parent_id: ResourceId,
        dst_name: &str,
    ) -> RepoResult<()> {
        let mut txn = self.store.begin().await?;
        let mut ctx = TxnContext::new();
        let result: RepoResult<()> = async {
            let outcome = graph::rebind(
                txn.as_mut(),
                &mut ctx,
                src_parent_id,
                src_name,
                dst_parent_id,
                dst_name,
            )
            .await?;
            if let Some(displaced) = outcome.displaced {
                self.queue_or_collect(txn.as_mut(), &mut ctx, displaced).await?;
            }
            Ok(())
        }
        .await;
        finish(txn, result).await
    }

    /// Lazy cursor over the subtree of `resource_id` to the given depth,
    /// optionally filtered to what `filter`'s principal may see.
    pub async fn children(
        &self,
        resource_id: ResourceId,
        depth: Depth,
        filter: Option<AclFilter>,
    ) -> RepoResult<ChildrenCursor> {
        let mut txn = self.store.begin().await?;
        if txn.get_resource(resource_id).await?.is_none() {
            txn.rollback().await?;
            return Err(RepoError::NotFound(format!(
                "resource {} does not exist",
                resource_id
            )));
        }
        Ok(ChildrenCursor::new(txn, resource_id, depth, filter))
    }

    // ------------------------------------------------------------------
    // resources
    // ------------------------------------------------------------------

    /// Explicitly insert an unbound resource.
    pub async fn create_resource(
        &self,
        kind: ResourceKind,
        owner_id: PrincipalId,
    ) -> RepoResult<ResourceId> {
        let mut txn = self.store.begin().await?;
        let result = txn.insert_resource(kind, owner_id).await.map_err(RepoError::from);
        finish(txn, result).await
    }

    /// Create a resource and bind it in one transaction: the usual
    /// created-when-first-bound flow.
    pub async fn create_and_bind(
        &self,
        parent_id: ResourceId,
        name: &str,
        kind: ResourceKind,
        owner_id: PrincipalId,
    ) -> RepoResult<ResourceId> {
        let mut txn = self.store.begin().await?;
        let mut ctx = TxnContext::new();
        let result: RepoResult<ResourceId> = async {
            let child_id = txn.insert_resource(kind, owner_id).await?;
            graph::insert_bind(txn.as_mut(), &mut ctx, parent_id, child_id, name).await?;
            acl::establish(txn.as_mut(), child_id, parent_id).await?;
            Ok(child_id)
        }
        .await;
        finish(txn, result).await
    }

    pub async fn resource(&self, id: ResourceId) -> RepoResult<Option<Resource>> {
        let mut txn = self.store.begin().await?;
        let result = txn.get_resource(id).await.map_err(RepoError::from);
        finish(txn, result).await
    }

    // ------------------------------------------------------------------
    // acl inheritance
    // ------------------------------------------------------------------

    /// Establish ACL inheritance for a resource. Idempotent once set.
    pub async fn establish_acl(
        &self,
        resource_id: ResourceId,
        parent_id: ResourceId,
    ) -> RepoResult<()> {
        let mut txn = self.store.begin().await?;
        let result = acl::establish(txn.as_mut(), resource_id, parent_id).await;
        finish(txn, result).await
    }

    /// The applicable ACEs of a resource, one winner per
    /// (principal, privilege).
    pub async fn resolve_aces(&self, resource_id: ResourceId) -> RepoResult<Vec<Ace>> {
        let mut txn = self.store.begin().await?;
        let result = acl::resolve_applicable_aces(txn.as_mut(), resource_id).await;
        finish(txn, result).await
    }

    /// Move a resource's ACL inheritance (and its whole subtree's paths)
    /// under a new parent. Returns the number of path rows rewritten.
    pub async fn reparent_acl(
        &self,
        resource_id: ResourceId,
        new_parent_id: ResourceId,
    ) -> RepoResult<u64> {
        let mut txn = self.store.begin().await?;
        let result = acl::reparent(txn.as_mut(), resource_id, new_parent_id).await;
        finish(txn, result).await
    }

    /// Attach an ACE to a resource. The privilege is named, resolved
    /// through the privilege tree.
    pub async fn add_ace(
        &self,
        resource_id: ResourceId,
        principal_id: PrincipalId,
        privilege: &str,
        grant: bool,
        protected: bool,
    ) -> RepoResult<AceId> {
        let mut txn = self.store.begin().await?;
        let mut ctx = TxnContext::new();
        let result: RepoResult<AceId> = async {
            if txn.get_resource(resource_id).await?.is_none() {
                return Err(RepoError::NotFound(format!(
                    "resource {} does not exist",
                    resource_id
                )));
            }
            let privilege = ctx
                .privilege_by_name(txn.as_mut(), privilege)
                .await?
                .ok_or_else(|| {
                    RepoError::NotFound(format!("unknown privilege '{}'", privilege))
                })?;
            let id = txn
                .insert_ace(resource_id, principal_id, privilege.id, grant, protected, false)
                .await?;
            Ok(id)
        }
        .await;
        finish(txn, result).await
    }

    /// Whether `principal` holds the named privilege on `resource`.
    pub async fn check_privilege(
        &self,
        principal_id: PrincipalId,
        resource_id: ResourceId,
        privilege: &str,
    ) -> RepoResult<bool> {
        let mut txn = self.store.begin().await?;
        let mut ctx = TxnContext::new();
        let result =
            acl::principal_has_privilege(txn.as_mut(), &mut ctx, principal_id, resource_id, privilege)
                .await;
        finish(txn, result).await
    }

    // ------------------------------------------------------------------
    // group membership
    // ------------------------------------------------------------------

    pub async fn add_group_member(
        &self,
        group_id: PrincipalId,
        member_id: PrincipalId,
    ) -> RepoResult<()> {
        let mut txn = self.store.begin().await?;
        let mut ctx = TxnContext::new();
        let result = groups::add_edge(txn.as_mut(), &mut ctx, group_id, member_id).await;
        finish(txn, result).await
    }

    pub async fn remove_group_member(
        &self,
        group_id: PrincipalId,
        member_id: PrincipalId,
    ) -> RepoResult<()> {
        let mut txn = self.store.begin().await?;
        let result = groups::remove_edge(txn.as_mut(), group_id, member_id).await;
        finish(txn, result).await
    }

    pub async fn is_member(
        &self,
        member_id: PrincipalId,
        group_id: PrincipalId,
    ) -> RepoResult<bool> {
        let mut txn = self.store.begin().await?;
        let result = groups::is_member(txn.as_mut(), member_id, group_id).await;
        finish(txn, result).await
    }

    // ------------------------------------------------------------------
    // orphan collection
    // ------------------------------------------------------------------

    /// Run the inline orphan check on a candidate now, regardless of the
    /// configured mode. Returns the number of resources deleted.
    pub async fn collect_orphan(&self, candidate: ResourceId) -> RepoResult<u64> {
        let mut txn = self.store.begin().await?;
        let mut ctx = TxnContext::new();
        let result =
            collector::collect_candidate(txn.as_mut(), &mut ctx, self.root_id, candidate).await;
        finish(txn, result).await
    }

    /// Drain one entry from the cleanup queue, as the background worker
    /// does each cycle.
    pub async fn drain_cleanup_once(&self) -> RepoResult<DrainOutcome> {
        collector::drain_one(self.store.as_ref(), self.root_id).await
    }

    /// Number of pending cleanup-queue entries.
    pub async fn cleanup_queue_len(&self) -> RepoResult<usize> {
        let mut txn = self.store.begin().await?;
        let result = txn.cleanup_queue_len().await.map_err(RepoError::from);
        finish(txn, result).await
    }

    /// Start the background collector for this store.
    pub fn start_collector(&self) -> CollectorHandle {
        OrphanCollector::new(self.store.clone(), self.root_id, self.collector_config.clone())
            .start()
    }

    /// Dispatch an orphan candidate per the configured GC mode.
    async fn queue_or_collect(
        &self,
        txn: &mut dyn StoreTransaction,
        ctx: &mut TxnContext,
        candidate: ResourceId,
    ) -> RepoResult<()> {
        match self.gc_mode {
            GcMode::Inline => {
                collector::collect_candidate(txn, ctx, self.root_id, candidate).await?;
            }
            GcMode::Background => {
                txn.enqueue_cleanup(candidate).await?;
            }
        }
        Ok(())
    }
}
