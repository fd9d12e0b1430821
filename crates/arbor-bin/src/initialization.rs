//! System initialization.
//!
//! Builds the repository from configuration and runs first-startup
//! initialization: the root collection, its ACL path row, and the default
//! privilege hierarchy. Idempotent and safe to call on every startup.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use arbor_config::Config;
use arbor_core::{CollectorConfig, Repository};
use arbor_store::RelationalStore;
use arbor_types::GcMode;

/// Create the repository over `store` and ensure system rows exist.
pub async fn initialize_system(
    store: Arc<dyn RelationalStore>,
    config: &Config,
) -> Result<Repository> {
    let gc_mode = if config.gc.background {
        GcMode::Background
    } else {
        GcMode::Inline
    };

    let collector_config = CollectorConfig {
        poll_interval: Duration::from_millis(config.gc.poll_interval_ms),
        shutdown_wait: Duration::from_millis(config.gc.shutdown_wait_ms),
    };

    let repo = Repository::new(store, gc_mode).with_collector_config(collector_config);
    repo.ensure_initialized()
        .await
        .context("Failed to initialize repository system rows")?;

    tracing::info!(
        root_id = repo.root_id(),
        gc_mode = ?repo.gc_mode(),
        "repository initialized"
    );
    Ok(repo)
}
