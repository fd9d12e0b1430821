//! # Arbor Types
//!
//! Shared type definitions for the ArborDB resource repository.
//!
//! This crate provides all core types used across the ArborDB workspace,
//! ensuring a single source of truth and preventing circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod path;

pub use path::AclPath;

// ============================================================================
// Identifiers
// ============================================================================

/// Serial id of a resource row. Allocated by the relational store on insert.
pub type ResourceId = i64;

/// Serial id of a principal (user or group) resource.
pub type PrincipalId = i64;

/// Serial id of an access control entry.
pub type AceId = i64;

/// Serial id of a privilege in the privilege tree.
pub type PrivilegeId = i64;

/// The repository root. Created by system initialization; never collected.
pub const ROOT_RESOURCE_ID: ResourceId = 1;

// ============================================================================
// Core Domain Types
// ============================================================================

/// Type tag of a stored resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A plain leaf resource.
    Resource,
    /// A collection that may carry outgoing binds.
    Collection,
    /// A principal (user) resource.
    Principal,
    /// A group principal; may have members.
    Group,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Resource => "resource",
            ResourceKind::Collection => "collection",
            ResourceKind::Principal => "principal",
            ResourceKind::Group => "group",
        }
    }

    /// Whether resources of this kind may carry outgoing binds.
    pub fn is_collection(&self) -> bool {
        matches!(self, ResourceKind::Collection)
    }

    /// Whether resources of this kind may appear in group membership.
    pub fn is_principal(&self) -> bool {
        matches!(self, ResourceKind::Principal | ResourceKind::Group)
    }
}

/// A stored resource row.
///
/// Resources are created when first bound or explicitly inserted and are
/// destroyed only by the orphan collector or an explicit delete. The bind
/// graph never mutates a resource beyond parent/type bookkeeping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub owner_id: PrincipalId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A named directed edge from a collection to a child resource.
///
/// `(parent_id, name)` is unique; a resource may have any number of incoming
/// binds (hard-link semantics). A non-root resource with zero incoming binds
/// is an orphan candidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Bind {
    pub parent_id: ResourceId,
    pub child_id: ResourceId,
    pub name: String,
}

/// An Access Control Entry attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ace {
    pub id: AceId,
    /// The resource the entry is attached to (self or an ancestor of the
    /// resource being resolved).
    pub resource_id: ResourceId,
    pub principal_id: PrincipalId,
    pub privilege_id: PrivilegeId,
    /// `true` grants the privilege, `false` denies it.
    pub grant: bool,
    /// Protected entries cannot be overridden by inherited ones.
    pub protected: bool,
    /// Entries copied down from an ancestor rather than set directly.
    pub inherited: bool,
}

/// A node of the privilege tree in nested-interval encoding.
///
/// `lft`/`rgt` bound the subtree: X is an ancestor-or-self of Y iff
/// `X.lft <= Y.lft && Y.rgt <= X.rgt`, so containment is a single range
/// comparison rather than a recursive lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Privilege {
    pub id: PrivilegeId,
    pub name: String,
    pub lft: i64,
    pub rgt: i64,
}

impl Privilege {
    /// Whether this privilege aggregates (or is) `other`.
    pub fn contains(&self, other: &Privilege) -> bool {
        self.lft <= other.lft && other.rgt <= self.rgt
    }
}

/// A row of the transitive group-membership closure.
///
/// `count` is the number of distinct membership paths from the member up to
/// the group; a pair exists iff `count > 0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureRow {
    pub ancestor_group_id: PrincipalId,
    pub descendant_member_id: PrincipalId,
    pub count: i64,
}

/// Traversal depth for descendant listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Depth {
    /// The resource itself only.
    Zero,
    /// Immediate children.
    One,
    /// The whole subtree.
    Unbounded,
}

impl Depth {
    /// Whether a node at `level` (0 = the resource itself, 1 = immediate
    /// child) is within this depth.
    pub fn admits(&self, level: u32) -> bool {
        match self {
            Depth::Zero => level == 0,
            Depth::One => level <= 1,
            Depth::Unbounded => true,
        }
    }
}

/// How orphan candidates are collected after an unbind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GcMode {
    /// Check and delete inside the unbinding transaction.
    Inline,
    /// Enqueue for the background collector.
    Background,
}

// ============================================================================
// Error Types
// ============================================================================

/// Failures surfaced by the relational store collaborator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found")]
    NotFound,

    #[error("Conflict")]
    Conflict,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures surfaced by the repository to its callers.
///
/// The protocol layer maps these onto status codes: `Conflict` to 409,
/// `PreconditionFailed` to 412/403, `Storage` to 500.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The underlying transactional store failed. Never retried here.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    /// Uniqueness violation, e.g. a bind name collision.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller-correctable: cycle would be created, edge already exists,
    /// destination invalid.
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// Referenced resource or edge is absent.
    #[error("not found: {0}")]
    NotFound(String),
}

pub type RepoResult<T> = std::result::Result<T, RepoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privilege_containment_is_a_range_check() {
        let all = Privilege { id: 1, name: "all".into(), lft: 1, rgt: 10 };
        let read = Privilege { id: 2, name: "read".into(), lft: 2, rgt: 3 };
        let write = Privilege { id: 3, name: "write".into(), lft: 4, rgt: 9 };

        assert!(all.contains(&read));
        assert!(all.contains(&write));
        assert!(all.contains(&all));
        assert!(!read.contains(&all));
        assert!(!read.contains(&write));
    }

    #[test]
    fn depth_admits_levels() {
        assert!(Depth::Zero.admits(0));
        assert!(!Depth::Zero.admits(1));
        assert!(Depth::One.admits(1));
        assert!(!Depth::One.admits(2));
        assert!(Depth::Unbounded.admits(17));
    }

    #[test]
    fn resource_kind_flags() {
        assert!(ResourceKind::Collection.is_collection());
        assert!(!ResourceKind::Resource.is_collection());
        assert!(ResourceKind::Group.is_principal());
        assert!(ResourceKind::Principal.is_principal());
        assert!(!ResourceKind::Collection.is_principal());
    }
}
