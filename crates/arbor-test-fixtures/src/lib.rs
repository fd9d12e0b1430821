//! Test fixtures for ArborDB integration tests.
//!
//! This crate provides shared helpers for building initialized in-memory
//! repositories and seeding resource trees, ACLs, and groups across the
//! integration test suites.

use std::sync::Arc;

use arbor_core::{CollectorConfig, Repository};
use arbor_store::MemoryBackend;
use arbor_types::{GcMode, PrincipalId, RepoResult, ResourceId, ResourceKind};

/// An initialized repository over a fresh memory backend.
pub async fn memory_repository(gc_mode: GcMode) -> Repository {
    let (repo, _store) = memory_repository_with_store(gc_mode).await;
    repo
}

/// As [`memory_repository`], also handing back the backend so tests can
/// inspect raw table state.
pub async fn memory_repository_with_store(gc_mode: GcMode) -> (Repository, Arc<MemoryBackend>) {
    let store = Arc::new(MemoryBackend::new());
    let repo = Repository::new(store.clone(), gc_mode);
    repo.ensure_initialized().await.expect("initialization failed");
    (repo, store)
}

/// As [`memory_repository`], with collector timing suited to tests.
pub async fn memory_repository_with_collector(
    gc_mode: GcMode,
    config: CollectorConfig,
) -> Repository {
    let repo =
        Repository::new(Arc::new(MemoryBackend::new()), gc_mode).with_collector_config(config);
    repo.ensure_initialized().await.expect("initialization failed");
    repo
}

/// Create a collection and bind it under `parent`.
pub async fn new_collection(
    repo: &Repository,
    parent: ResourceId,
    name: &str,
) -> RepoResult<ResourceId> {
    repo.create_and_bind(parent, name, ResourceKind::Collection, 0).await
}

/// Create a plain resource and bind it under `parent`.
pub async fn new_resource(
    repo: &Repository,
    parent: ResourceId,
    name: &str,
) -> RepoResult<ResourceId> {
    repo.create_and_bind(parent, name, ResourceKind::Resource, 0).await
}

/// Create an unbound principal (user).
pub async fn new_user(repo: &Repository) -> RepoResult<PrincipalId> {
    repo.create_resource(ResourceKind::Principal, 0).await
}

/// Create an unbound group.
pub async fn new_group(repo: &Repository) -> RepoResult<PrincipalId> {
    repo.create_resource(ResourceKind::Group, 0).await
}
