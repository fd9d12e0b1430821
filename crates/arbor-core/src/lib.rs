//! # Arbor Core - Bind Graph and Derived Indexes
//!
//! The repository core: named multi-parent binds over a relational store,
//! kept consistent with three derived structures as the graph mutates —
//! root reachability (orphan collection), materialized ACL-inheritance
//! paths, and the counted transitive group-membership closure.
//!
//! All mutation runs inside serializable store transactions; the derived
//! indexes are updated as satellite steps of the same transaction as the
//! edge mutation that affects them.

pub mod acl;
pub mod collector;
pub mod context;
pub mod cursor;
pub mod graph;
pub mod groups;
pub mod repo;

pub use collector::{CollectorConfig, CollectorHandle, DrainOutcome, OrphanCollector};
pub use context::TxnContext;
pub use cursor::{AclFilter, ChildrenCursor};
pub use graph::RebindOutcome;
pub use repo::Repository;

pub use arbor_types::{RepoError, RepoResult};
