//! Per-transaction lookup caches.
//!
//! The repository's resolution paths repeatedly consult slow-changing rows
//! (resource kinds, privilege bounds). A [`TxnContext`] caches them for the
//! duration of one transaction: it is created when the transaction begins
//! and dropped at commit or rollback, never shared across requests.

use std::collections::HashMap;

use arbor_store::StoreTransaction;
use arbor_types::{Privilege, PrivilegeId, RepoResult, ResourceId, ResourceKind};

/// Caches scoped to a single open transaction.
#[derive(Debug, Default)]
pub struct TxnContext {
    kinds: HashMap<ResourceId, ResourceKind>,
    privileges: HashMap<PrivilegeId, Privilege>,
    privilege_ids_by_name: HashMap<String, Option<PrivilegeId>>,
}

impl TxnContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kind of a resource, or `None` when the row is absent.
    pub async fn resource_kind(
        &mut self,
        txn: &mut dyn StoreTransaction,
        id: ResourceId,
    ) -> RepoResult<Option<ResourceKind>> {
        if let Some(kind) = self.kinds.get(&id) {
            return Ok(Some(*kind));
        }
        match txn.get_resource(id).await? {
            Some(resource) => {
                self.kinds.insert(id, resource.kind);
                Ok(Some(resource.kind))
            }
            None => Ok(None),
        }
    }

    /// Forget a cached resource after it is deleted in this transaction.
    pub fn forget_resource(&mut self, id: ResourceId) {
        self.kinds.remove(&id);
    }

    pub async fn privilege(
        &mut self,
        txn: &mut dyn StoreTransaction,
        id: PrivilegeId,
    ) -> RepoResult<Option<Privilege>> {
        if let Some(privilege) = self.privileges.get(&id) {
            return Ok(Some(privilege.clone()));
        }
        match txn.privilege(id).await? {
            Some(privilege) => {
                self.privileges.insert(id, privilege.clone());
                Ok(Some(privilege))
            }
            None => Ok(None),
        }
    }

    pub async fn privilege_by_name(
        &mut self,
        txn: &mut dyn StoreTransaction,
        name: &str,
    ) -> RepoResult<Option<Privilege>> {
        if let Some(cached) = self.privilege_ids_by_name.get(name) {
            return match cached {
                Some(id) => self.privilege(txn, *id).await,
                None => Ok(None),
            };
        }
        let found = txn.privilege_by_name(name).await?;
        self.privilege_ids_by_name
            .insert(name.to_string(), found.as_ref().map(|p| p.id));
        if let Some(privilege) = &found {
            self.privileges.insert(privilege.id, privilege.clone());
        }
        Ok(found)
    }

    /// Whether the `granted` privilege aggregates (or is) `requested`, via
    /// the nested-interval bounds. A single range comparison once both rows
    /// are cached.
    pub async fn privilege_satisfies(
        &mut self,
        txn: &mut dyn StoreTransaction,
        granted: PrivilegeId,
        requested: PrivilegeId,
    ) -> RepoResult<bool> {
        let Some(granted) = self.privilege(txn, granted).await? else {
            return Ok(false);
        };
        let Some(requested) = self.privilege(txn, requested).await? else {
            return Ok(false);
        };
        Ok(granted.contains(&requested))
    }
}
