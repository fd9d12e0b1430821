//! # Arbor Store - Storage Abstraction Layer
//!
//! Provides the transactional interface the repository core consumes from
//! its relational collaborator, plus the in-memory backend used for
//! development and tests.
//!
//! The relational engine itself is external: this crate defines the seam
//! (typed row operations over the repository tables, inside explicit
//! serializable transactions) and does not implement SQL.

use async_trait::async_trait;
use arbor_types::{
    Ace, AceId, AclPath, Bind, ClosureRow, PrincipalId, Privilege, PrivilegeId, Resource,
    ResourceId, ResourceKind, StoreResult,
};

pub mod factory;
pub mod memory;

pub use factory::{BackendType, StorageConfig, StorageFactory};
pub use memory::MemoryBackend;

type Result<T> = StoreResult<T>;

/// The abstract relational store interface.
///
/// `begin` opens a transaction at serializable isolation; every repository
/// mutation runs inside exactly one transaction and commits or rolls back
/// as a unit. Concurrent transactions are serialized by the engine, not by
/// application locking.
#[async_trait]
pub trait RelationalStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;
}

/// Typed row operations over the repository tables, scoped to one open
/// transaction.
///
/// Uniqueness violations surface as [`StoreError::Conflict`]; engine
/// failures as [`StoreError::Database`]. A transaction dropped without
/// `commit` rolls back.
///
/// [`StoreError::Conflict`]: arbor_types::StoreError::Conflict
/// [`StoreError::Database`]: arbor_types::StoreError::Database
#[async_trait]
pub trait StoreTransaction: Send {
    // ------------------------------------------------------------------
    // resources
    // ------------------------------------------------------------------

    /// Insert a resource row and return its serial id.
    async fn insert_resource(
        &mut self,
        kind: ResourceKind,
        owner_id: PrincipalId,
    ) -> Result<ResourceId>;

    async fn get_resource(&mut self, id: ResourceId) -> Result<Option<Resource>>;

    /// Remove a resource row. Returns `false` when the row was absent.
    async fn delete_resource(&mut self, id: ResourceId) -> Result<bool>;

    /// Bump `updated_at` on a resource row.
    async fn touch_resource(&mut self, id: ResourceId) -> Result<()>;

    // ------------------------------------------------------------------
    // binds
    // ------------------------------------------------------------------

    /// Insert a bind edge. `Conflict` when `(parent_id, name)` exists.
    async fn insert_bind(&mut self, bind: &Bind) -> Result<()>;

    /// Remove the bind named `name` under `parent_id`, returning the removed
    /// edge, or `None` when absent.
    async fn delete_bind(&mut self, parent_id: ResourceId, name: &str) -> Result<Option<Bind>>;

    /// Look up a bind by its unique `(parent_id, name)` key.
    async fn bind_by_name(&mut self, parent_id: ResourceId, name: &str) -> Result<Option<Bind>>;

    /// All outgoing binds of a collection, ordered by name.
    async fn binds_of_parent(&mut self, parent_id: ResourceId) -> Result<Vec<Bind>>;

    /// All incoming binds of a resource.
    async fn binds_to_child(&mut self, child_id: ResourceId) -> Result<Vec<Bind>>;

    // ------------------------------------------------------------------
    // acl inheritance paths
    // ------------------------------------------------------------------

    async fn acl_path(&mut self, resource_id: ResourceId) -> Result<Option<AclPath>>;

    /// Insert or overwrite the path row of a resource.
    async fn put_acl_path(&mut self, resource_id: ResourceId, path: &AclPath) -> Result<()>;

    /// Rewrite every path that equals `old` or descends from it, substituting
    /// `new` for the `old` prefix. One bulk update; returns rows touched.
    async fn rewrite_acl_paths(&mut self, old: &AclPath, new: &AclPath) -> Result<u64>;

    async fn delete_acl_path(&mut self, resource_id: ResourceId) -> Result<bool>;

    // ------------------------------------------------------------------
    // access control entries
    // ------------------------------------------------------------------

    /// Insert an ACE and return its serial id.
    async fn insert_ace(
        &mut self,
        resource_id: ResourceId,
        principal_id: PrincipalId,
        privilege_id: PrivilegeId,
        grant: bool,
        protected: bool,
        inherited: bool,
    ) -> Result<AceId>;

    /// All ACEs attached to any of `resource_ids`, ordered by id.
    async fn aces_for_resources(&mut self, resource_ids: &[ResourceId]) -> Result<Vec<Ace>>;

    /// Drop every ACE attached to a resource. Returns rows removed.
    async fn delete_aces_for_resource(&mut self, resource_id: ResourceId) -> Result<u64>;

    // ------------------------------------------------------------------
    // privileges (nested-interval tree)
    // ------------------------------------------------------------------

    async fn insert_privilege(&mut self, name: &str, lft: i64, rgt: i64) -> Result<PrivilegeId>;

    async fn privilege(&mut self, id: PrivilegeId) -> Result<Option<Privilege>>;

    async fn privilege_by_name(&mut self, name: &str) -> Result<Option<Privilege>>;

    // ------------------------------------------------------------------
    // group membership and closure
    // ------------------------------------------------------------------

    /// Record a direct membership edge. `Conflict` when it already exists.
    async fn insert_group_member(
        &mut self,
        group_id: PrincipalId,
        member_id: PrincipalId,
    ) -> Result<()>;

    /// Remove a direct membership edge. Returns `false` when absent.
    async fn delete_group_member(
        &mut self,
        group_id: PrincipalId,
        member_id: PrincipalId,
    ) -> Result<bool>;

    async fn group_member_exists(
        &mut self,
        group_id: PrincipalId,
        member_id: PrincipalId,
    ) -> Result<bool>;

    /// Direct members of a group (one hop, not the closure).
    async fn direct_members(&mut self, group_id: PrincipalId) -> Result<Vec<PrincipalId>>;

    /// Groups holding a direct edge to this member (one hop, not the
    /// closure).
    async fn direct_memberships(&mut self, member_id: PrincipalId) -> Result<Vec<PrincipalId>>;

    /// Closure path count for `(ancestor, descendant)`; 0 when no row exists.
    async fn closure_count(
        &mut self,
        ancestor_id: PrincipalId,
        descendant_id: PrincipalId,
    ) -> Result<i64>;

    /// All closure rows with `descendant_member_id == id`: the groups `id`
    /// transitively belongs to, with path counts.
    async fn closure_ancestors(&mut self, id: PrincipalId) -> Result<Vec<ClosureRow>>;

    /// All closure rows with `ancestor_group_id == id`: the members
    /// transitively inside `id`, with path counts.
    async fn closure_descendants(&mut self, id: PrincipalId) -> Result<Vec<ClosureRow>>;

    /// Add `delta` to the closure count for a pair, inserting the row when
    /// absent and deleting it when the result reaches zero. Returns the new
    /// count. A result below zero is a consistency fault and surfaces as
    /// `Internal`.
    async fn adjust_closure(
        &mut self,
        ancestor_id: PrincipalId,
        descendant_id: PrincipalId,
        delta: i64,
    ) -> Result<i64>;

    // ------------------------------------------------------------------
    // cleanup queue
    // ------------------------------------------------------------------

    /// Append an orphan candidate. Re-adding a queued id is a no-op.
    async fn enqueue_cleanup(&mut self, resource_id: ResourceId) -> Result<()>;

    /// Pop the oldest queued candidate, if any.
    async fn dequeue_cleanup(&mut self) -> Result<Option<ResourceId>>;

    /// Number of queued candidates.
    async fn cleanup_queue_len(&mut self) -> Result<usize>;

    // ------------------------------------------------------------------
    // transaction control
    // ------------------------------------------------------------------

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
