//! Configuration validation.
//!
//! Validates configuration values and ensures consistency before the
//! repository starts.

use thiserror::Error;

use crate::{Config, GcConfig, ObservabilityConfig, StoreConfig};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid backend: {0} (must be: memory)")]
    InvalidBackend(String),

    #[error("Invalid GC poll interval: {0}ms (must be > 0)")]
    InvalidPollInterval(u64),

    #[error("Invalid GC shutdown wait: {0}ms (must be >= the poll interval)")]
    InvalidShutdownWait(u64),

    #[error("Invalid log level: {0} (must be one of: trace, debug, info, warn, error)")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0} (must be one of: pretty, compact, json)")]
    InvalidLogFormat(String),

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate complete configuration.
pub fn validate(config: &Config) -> ValidationResult<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_store(&config.store) {
        errors.push(e);
    }
    if let Err(e) = validate_gc(&config.gc) {
        errors.push(e);
    }
    if let Err(e) = validate_observability(&config.observability) {
        errors.push(e);
    }

    if errors.is_empty() {
        Ok(())
    } else if errors.len() == 1 {
        Err(errors.into_iter().next().unwrap())
    } else {
        Err(ValidationError::Multiple(errors))
    }
}

pub fn validate_store(config: &StoreConfig) -> ValidationResult<()> {
    match config.backend.as_str() {
        "memory" => Ok(()),
        other => Err(ValidationError::InvalidBackend(other.to_string())),
    }
}

pub fn validate_gc(config: &GcConfig) -> ValidationResult<()> {
    if config.poll_interval_ms == 0 {
        return Err(ValidationError::InvalidPollInterval(config.poll_interval_ms));
    }
    if config.shutdown_wait_ms < config.poll_interval_ms {
        return Err(ValidationError::InvalidShutdownWait(config.shutdown_wait_ms));
    }
    Ok(())
}

pub fn validate_observability(config: &ObservabilityConfig) -> ValidationResult<()> {
    match config.log_level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        other => return Err(ValidationError::InvalidLogLevel(other.to_string())),
    }
    match config.log_format.as_str() {
        "pretty" | "compact" | "json" => Ok(()),
        other => Err(ValidationError::InvalidLogFormat(other.to_string())),
    }
}
