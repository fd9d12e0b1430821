//! In-memory storage backend for testing and development.
//!
//! A single mutex over the whole table set is held for the life of each
//! transaction, which gives true serializable isolation: at most one
//! transaction is open at a time and later `begin` calls queue behind it.
//! A begin-time snapshot is restored on rollback (or on drop without
//! commit), so partial derived-index updates never become visible.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use arbor_types::{
    Ace, AceId, AclPath, Bind, ClosureRow, PrincipalId, Privilege, PrivilegeId, Resource,
    ResourceId, ResourceKind, StoreError,
};

use crate::{RelationalStore, Result, StoreTransaction};

/// The relational tables of §3, as plain ordered maps.
#[derive(Debug, Clone)]
struct Tables {
    resources: BTreeMap<ResourceId, Resource>,
    next_resource_id: ResourceId,

    /// `(parent_id, name) -> child_id`; key order doubles as the by-name
    /// ordering of a collection's children.
    binds: BTreeMap<(ResourceId, String), ResourceId>,

    acl_paths: BTreeMap<ResourceId, String>,

    aces: BTreeMap<AceId, Ace>,
    next_ace_id: AceId,

    privileges: BTreeMap<PrivilegeId, Privilege>,
    next_privilege_id: PrivilegeId,

    group_members: BTreeSet<(PrincipalId, PrincipalId)>,

    /// `(ancestor_group_id, descendant_member_id) -> count`, count > 0.
    closure: BTreeMap<(PrincipalId, PrincipalId), i64>,

    cleanup_queue: VecDeque<ResourceId>,
}

impl Tables {
    fn new() -> Self {
        Self {
            resources: BTreeMap::new(),
            next_resource_id: 1,
            binds: BTreeMap::new(),
            acl_paths: BTreeMap::new(),
            aces: BTreeMap::new(),
            next_ace_id: 1,
            privileges: BTreeMap::new(),
            next_privilege_id: 1,
            group_members: BTreeSet::new(),
            closure: BTreeMap::new(),
            cleanup_queue: VecDeque::new(),
        }
    }
}

/// In-memory store with serializable transactions.
pub struct MemoryBackend {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self { tables: Arc::new(Mutex::new(Tables::new())) }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelationalStore for MemoryBackend {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let snapshot = guard.clone();
        Ok(Box::new(MemoryTransaction { guard, snapshot: Some(snapshot) }))
    }
}

/// One open transaction: exclusive table guard plus the rollback snapshot.
struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    /// `Some` until commit; restored into the guard on drop.
    snapshot: Option<Tables>,
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            *self.guard = snapshot;
        }
    }
}

fn malformed_path(resource_id: ResourceId, raw: &str) -> StoreError {
    StoreError::Internal(format!(
        "malformed acl path for resource {}: {:?}",
        resource_id, raw
    ))
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn insert_resource(
        &mut self,
        kind: ResourceKind,
        owner_id: PrincipalId,
    ) -> Result<ResourceId> {
        let id = self.guard.next_resource_id;
        self.guard.next_resource_id += 1;
        let now = Utc::now();
        self.guard.resources.insert(
            id,
            Resource { id, kind, owner_id, created_at: now, updated_at: now },
        );
        Ok(id)
    }

    async fn get_resource(&mut self, id: ResourceId) -> Result<Option<Resource>> {
        Ok(self.guard.resources.get(&id).cloned())
    }

    async fn delete_resource(&mut self, id: ResourceId) -> Result<bool> {
        Ok(self.guard.resources.remove(&id).is_some())
    }

    async fn touch_resource(&mut self, id: ResourceId) -> Result<()> {
        match self.guard.resources.get_mut(&id) {
            Some(resource) => {
                resource.updated_at = Utc::now();
                Ok(())
            }
            None => Err(StoreError::NotFound),
        }
    }

    async fn insert_bind(&mut self, bind: &Bind) -> Result<()> {
        let key = (bind.parent_id, bind.name.clone());
        if self.guard.binds.contains_key(&key) {
            return Err(StoreError::Conflict);
        }
        self.guard.binds.insert(key, bind.child_id);
        Ok(())
    }

    async fn delete_bind(&mut self, parent_id: ResourceId, name: &str) -> Result<Option<Bind>> {
        Ok(self
            .guard
            .binds
            .remove(&(parent_id, name.to_string()))
            .map(|child_id| Bind { parent_id, child_id, name: name.to_string() }))
    }

    async fn bind_by_name(&mut self, parent_id: ResourceId, name: &str) -> Result<Option<Bind>> {
        Ok(self
            .guard
            .binds
            .get(&(parent_id, name.to_string()))
            .map(|&child_id| Bind { parent_id, child_id, name: name.to_string() }))
    }

    async fn binds_of_parent(&mut self, parent_id: ResourceId) -> Result<Vec<Bind>> {
        Ok(self
            .guard
            .binds
            .range((parent_id, String::new())..)
            .take_while(|((p, _), _)| *p == parent_id)
            .map(|((p, name), &child_id)| Bind {
                parent_id: *p,
                child_id,
                name: name.clone(),
            })
            .collect())
    }

    async fn binds_to_child(&mut self, child_id: ResourceId) -> Result<Vec<Bind>> {
        Ok(self
            .guard
            .binds
            .iter()
            .filter(|(_, &c)| c == child_id)
            .map(|((parent_id, name), &c)| Bind {
                parent_id: *parent_id,
                child_id: c,
                name: name.clone(),
            })
            .collect())
    }

    async fn acl_path(&mut self, resource_id: ResourceId) -> Result<Option<AclPath>> {
        match self.guard.acl_paths.get(&resource_id) {
            Some(raw) => AclPath::parse(raw)
                .map(Some)
                .ok_or_else(|| malformed_path(resource_id, raw)),
            None => Ok(None),
        }
    }

    async fn put_acl_path(&mut self, resource_id: ResourceId, path: &AclPath) -> Result<()> {
        self.guard.acl_paths.insert(resource_id, path.as_str().to_string());
        Ok(())
    }

    async fn rewrite_acl_paths(&mut self, old: &AclPath, new: &AclPath) -> Result<u64> {
        let mut touched = 0;
        for raw in self.guard.acl_paths.values_mut() {
            let Some(path) = AclPath::parse(raw) else { continue };
            if let Some(rewritten) = path.rewrite_prefix(old, new) {
                *raw = rewritten.as_str().to_string();
                touched += 1;
            }
        }
        Ok(touched)
    }

    async fn delete_acl_path(&mut self, resource_id: ResourceId) -> Result<bool> {
        Ok(self.guard.acl_paths.remove(&resource_id).is_some())
    }

    async fn insert_ace(
        &mut self,
        resource_id: ResourceId,
        principal_id: PrincipalId,
        privilege_id: PrivilegeId,
        grant: bool,
        protected: bool,
        inherited: bool,
    ) -> Result<AceId> {
        let id = self.guard.next_ace_id;
        self.guard.next_ace_id += 1;
        self.guard.aces.insert(
            id,
            Ace { id, resource_id, principal_id, privilege_id, grant, protected, inherited },
        );
        Ok(id)
    }

    async fn aces_for_resources(&mut self, resource_ids: &[ResourceId]) -> Result<Vec<Ace>> {
        Ok(self
            .guard
            .aces
            .values()
            .filter(|ace| resource_ids.contains(&ace.resource_id))
            .cloned()
            .collect())
    }

    async fn delete_aces_for_resource(&mut self, resource_id: ResourceId) -> Result<u64> {
        let before = self.guard.aces.len();
        self.guard.aces.retain(|_, ace| ace.resource_id != resource_id);
        Ok((before - self.guard.aces.len()) as u64)
    }

    async fn insert_privilege(&mut self, name: &str, lft: i64, rgt: i64) -> Result<PrivilegeId> {
        if self.guard.privileges.values().any(|p| p.name == name) {
            return Err(StoreError::Conflict);
        }
        let id = self.guard.next_privilege_id;
        self.guard.next_privilege_id += 1;
        self.guard
            .privileges
            .insert(id, Privilege { id, name: name.to_string(), lft, rgt });
        Ok(id)
    }

    async fn privilege(&mut self, id: PrivilegeId) -> Result<Option<Privilege>> {
        Ok(self.guard.privileges.get(&id).cloned())
    }

    async fn privilege_by_name(&mut self, name: &str) -> Result<Option<Privilege>> {
        Ok(self.guard.privileges.values().find(|p| p.name == name).cloned())
    }

    async fn insert_group_member(
        &mut self,
        group_id: PrincipalId,
        member_id: PrincipalId,
    ) -> Result<()> {
        if !self.guard.group_members.insert((group_id, member_id)) {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn delete_group_member(
        &mut self,
        group_id: PrincipalId,
        member_id: PrincipalId,
    ) -> Result<bool> {
        Ok(self.guard.group_members.remove(&(group_id, member_id)))
    }

    async fn group_member_exists(
        &mut self,
        group_id: PrincipalId,
        member_id: PrincipalId,
    ) -> Result<bool> {
        Ok(self.guard.group_members.contains(&(group_id, member_id)))
    }

    async fn direct_members(&mut self, group_id: PrincipalId) -> Result<Vec<PrincipalId>> {
        Ok(self
            .guard
            .group_members
            .range((group_id, PrincipalId::MIN)..)
            .take_while(|(g, _)| *g == group_id)
            .map(|&(_, member)| member)
            .collect())
    }

    async fn direct_memberships(&mut self, member_id: PrincipalId) -> Result<Vec<PrincipalId>> {
        Ok(self
            .guard
            .group_members
            .iter()
            .filter(|(_, m)| *m == member_id)
            .map(|&(group, _)| group)
            .collect())
    }

    async fn closure_count(
        &mut self,
        ancestor_id: PrincipalId,
        descendant_id: PrincipalId,
    ) -> Result<i64> {
        Ok(self
            .guard
            .closure
            .get(&(ancestor_id, descendant_id))
            .copied()
            .unwrap_or(0))
    }

    async fn closure_ancestors(&mut self, id: PrincipalId) -> Result<Vec<ClosureRow>> {
        Ok(self
            .guard
            .closure
            .iter()
            .filter(|((_, descendant), _)| *descendant == id)
            .map(|(&(ancestor, descendant), &count)| ClosureRow {
                ancestor_group_id: ancestor,
                descendant_member_id: descendant,
                count,
            })
            .collect())
    }

    async fn closure_descendants(&mut self, id: PrincipalId) -> Result<Vec<ClosureRow>> {
        Ok(self
            .guard
            .closure
            .range((id, PrincipalId::MIN)..)
            .take_while(|((ancestor, _), _)| *ancestor == id)
            .map(|(&(ancestor, descendant), &count)| ClosureRow {
                ancestor_group_id: ancestor,
                descendant_member_id: descendant,
                count,
            })
            .collect())
    }

    async fn adjust_closure(
        &mut self,
        ancestor_id: PrincipalId,
        descendant_id: PrincipalId,
        delta: i64,
    ) -> Result<i64> {
        let key = (ancestor_id, descendant_id);
        let current = self.guard.closure.get(&key).copied().unwrap_or(0);
        let next = current + delta;
        if next < 0 {
            return Err(StoreError::Internal(format!(
                "closure count for ({}, {}) would go negative: {} {:+}",
                ancestor_id, descendant_id, current, delta
            )));
        }
        if next == 0 {
            self.guard.closure.remove(&key);
        } else {
            self.guard.closure.insert(key, next);
        }
        Ok(next)
    }

    async fn enqueue_cleanup(&mut self, resource_id: ResourceId) -> Result<()> {
        if !self.guard.cleanup_queue.contains(&resource_id) {
            self.guard.cleanup_queue.push_back(resource_id);
        }
        Ok(())
    }

    async fn dequeue_cleanup(&mut self) -> Result<Option<ResourceId>> {
        Ok(self.guard.cleanup_queue.pop_front())
    }

    async fn cleanup_queue_len(&mut self) -> Result<usize> {
        Ok(self.guard.cleanup_queue.len())
    }

    async fn commit(mut self: Box<Self>) -> Result<()> {
        // Forget the snapshot so Drop leaves the mutated tables in place.
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        // Drop restores the snapshot.
        Ok(())
    }
}
