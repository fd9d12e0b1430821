//! # ArborDB Server Binary
//!
//! Main entrypoint for the ArborDB repository daemon: loads configuration,
//! initializes the store and repository, runs the background orphan
//! collector when configured, and shuts down gracefully on ctrl-c.

use anyhow::Result;
use clap::Parser;

use arbor_bin::initialization;
use arbor_config::load_or_default;
use arbor_observe::{LogConfig, LogFormat};
use arbor_store::StorageFactory;

#[derive(Parser, Debug)]
#[command(name = "arbordb")]
#[command(about = "ArborDB hierarchical resource repository", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Force background garbage collection on, overriding config
    #[arg(long)]
    background_gc: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = load_or_default(&args.config);

    // Override with CLI args
    if args.background_gc {
        config.gc.background = true;
    }

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        std::process::exit(1);
    }

    // Initialize observability
    arbor_observe::init_logging(LogConfig {
        format: config.observability.log_format.parse::<LogFormat>()?,
        filter: Some(config.observability.log_level.clone()),
        ..LogConfig::default()
    })?;

    tracing::info!("Starting ArborDB repository");

    // Initialize storage backend
    let store = StorageFactory::from_str(
        &config.store.backend,
        config.store.connection_string.clone(),
    )
    .await?;
    tracing::info!(backend = %config.store.backend, "storage backend ready");

    // Initialize system (create root resource and privileges if needed)
    let repo = initialization::initialize_system(store, &config).await?;

    // Start the background collector when configured
    let collector = if config.gc.background {
        tracing::info!(
            poll_interval_ms = config.gc.poll_interval_ms,
            "background orphan collection ENABLED"
        );
        Some(repo.start_collector())
    } else {
        tracing::info!("inline orphan collection (background GC disabled)");
        None
    };

    // Run until interrupted
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown signal received");

    // Graceful shutdown: the collector must observably exit before we do
    if let Some(handle) = collector {
        if handle.stop().await {
            tracing::info!("orphan collector drained and stopped");
        } else {
            tracing::error!("orphan collector aborted after shutdown wait");
        }
    }

    tracing::info!("ArborDB stopped");
    Ok(())
}
