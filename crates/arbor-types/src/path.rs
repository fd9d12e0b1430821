//! Materialized ACL-inheritance paths.
//!
//! A path is the ordered, comma-separated ancestor-id chain from the root
//! down to and including the resource, recorded for the parent through which
//! the resource's ACL was established. The invariant maintained by the index
//! is `path(r) == path(acl_parent(r)) + "," + r`.

use serde::{Deserialize, Serialize};

use crate::ResourceId;

/// An ordered ancestor-id chain, stored as its comma-separated string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AclPath(String);

impl AclPath {
    /// The path of a root resource: just its own id.
    pub fn root(id: ResourceId) -> Self {
        AclPath(id.to_string())
    }

    /// Parse from the stored string form. Returns `None` for malformed rows.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() {
            return None;
        }
        for seg in s.split(',') {
            seg.parse::<ResourceId>().ok()?;
        }
        Some(AclPath(s.to_string()))
    }

    /// Extend this path by one child id.
    pub fn child(&self, id: ResourceId) -> Self {
        AclPath(format!("{},{}", self.0, id))
    }

    /// The ancestor ids in root-to-leaf order, including the resource itself.
    pub fn segments(&self) -> Vec<ResourceId> {
        self.0
            .split(',')
            .filter_map(|s| s.parse::<ResourceId>().ok())
            .collect()
    }

    /// The last segment: the resource this path belongs to.
    pub fn leaf(&self) -> Option<ResourceId> {
        self.segments().last().copied()
    }

    /// Whether `id` occurs anywhere on this chain.
    pub fn passes_through(&self, id: ResourceId) -> bool {
        self.segments().contains(&id)
    }

    /// Whether this path equals `prefix` or descends from it.
    ///
    /// Matches the SQL pattern `prefix || ",%"` union the exact row, so
    /// `1,2` is a prefix of `1,2,7` but not of `1,27`.
    pub fn descends_from(&self, prefix: &AclPath) -> bool {
        self.0 == prefix.0 || self.0.starts_with(&format!("{},", prefix.0))
    }

    /// Textually substitute `old` for `new` at the front of this path.
    ///
    /// Returns `None` when this path does not descend from `old`. This is the
    /// per-row form of the bulk subtree rewrite used by ACL re-parenting.
    pub fn rewrite_prefix(&self, old: &AclPath, new: &AclPath) -> Option<Self> {
        if self.0 == old.0 {
            return Some(new.clone());
        }
        let tail = self.0.strip_prefix(&format!("{},", old.0))?;
        Some(AclPath(format!("{},{}", new.0, tail)))
    }

    /// Longer path string means a nearer ancestor chain; used for ACE
    /// resolution ordering.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AclPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
