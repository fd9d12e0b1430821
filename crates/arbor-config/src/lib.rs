//! # Arbor Config - Configuration Management
//!
//! Handles configuration loading from files and environment variables.

pub mod validation;

use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub gc: GcConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            gc: GcConfig::default(),
            quota: QuotaConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> validation::ValidationResult<()> {
        validation::validate(self)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,

    pub connection_string: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { backend: default_backend(), connection_string: None }
    }
}

fn default_backend() -> String {
    "memory".to_string()
}

/// Orphan-collection behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcConfig {
    /// `false` checks orphans inside the unbinding transaction; `true`
    /// defers them to the background worker.
    #[serde(default = "default_gc_background")]
    pub background: bool,

    #[serde(default = "default_gc_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How long shutdown waits for the worker to exit.
    #[serde(default = "default_gc_shutdown_wait_ms")]
    pub shutdown_wait_ms: u64,
}

impl Default for GcConfig {
    fn default() -> Self {
        Self {
            background: default_gc_background(),
            poll_interval_ms: default_gc_poll_interval_ms(),
            shutdown_wait_ms: default_gc_shutdown_wait_ms(),
        }
    }
}

fn default_gc_background() -> bool {
    false
}

fn default_gc_poll_interval_ms() -> u64 {
    1000
}

fn default_gc_shutdown_wait_ms() -> u64 {
    5000
}

/// Per-principal storage quota. Consulted by the protocol layer, not
/// enforced by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// 0 means unlimited.
    #[serde(default)]
    pub default_bytes: u64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { default_bytes: 0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: default_log_level(), log_format: default_log_format() }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

/// Load configuration from a file (optional) layered with `ARBOR_`-prefixed
/// environment variables (e.g. `ARBOR_GC__BACKGROUND=true`).
pub fn load(path: &str) -> Result<Config, ConfigError> {
    ConfigBuilder::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(Environment::with_prefix("ARBOR").separator("__"))
        .build()?
        .try_deserialize()
}

/// Load configuration, falling back to defaults when loading fails.
pub fn load_or_default(path: &str) -> Config {
    match load(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, path, "failed to load configuration, using defaults");
            Config::default()
        }
    }
}
