//! Storage factory for creating backend instances.
//!
//! Provides a flexible way to instantiate storage backends without exposing
//! implementation details to consumers. The relational engine proper is an
//! external collaborator; the memory backend stands in for it in tests and
//! development deployments.

use std::str::FromStr;
use std::sync::Arc;

use arbor_types::{StoreError, StoreResult};

use crate::memory::MemoryBackend;
use crate::RelationalStore;

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendType {
    /// In-memory storage (for testing and development).
    Memory,
}

impl FromStr for BackendType {
    type Err = StoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(BackendType::Memory),
            _ => Err(StoreError::Internal(format!("Unknown backend type: {}", s))),
        }
    }
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendType::Memory => "memory",
        }
    }
}

/// Configuration for a storage backend.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: BackendType,
    /// Connection string for engine-backed deployments; unused by memory.
    pub connection_string: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { backend: BackendType::Memory, connection_string: None }
    }
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self::default()
    }
}

/// Storage factory for creating backend instances.
pub struct StorageFactory;

impl StorageFactory {
    /// Create a storage backend from configuration.
    pub async fn create(config: StorageConfig) -> StoreResult<Arc<dyn RelationalStore>> {
        match config.backend {
            BackendType::Memory => Ok(Arc::new(MemoryBackend::new()) as Arc<dyn RelationalStore>),
        }
    }

    /// Create a storage backend from string configuration.
    pub async fn from_str(
        backend_str: &str,
        connection_string: Option<String>,
    ) -> StoreResult<Arc<dyn RelationalStore>> {
        let backend = BackendType::from_str(backend_str)?;
        Self::create(StorageConfig { backend, connection_string }).await
    }

    /// Create the default memory backend.
    pub fn memory() -> Arc<dyn RelationalStore> {
        Arc::new(MemoryBackend::new()) as Arc<dyn RelationalStore>
    }
}
