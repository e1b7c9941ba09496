//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (workers > 0, intervals > 0)
//! - Check that the bind host is an IP literal
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::IpAddr;

use thiserror::Error;

use crate::config::schema::ServiceConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.host `{0}` is not a valid IP address")]
    InvalidHost(String),

    #[error("server.max_workers must be at least 1")]
    NoWorkers,

    #[error("server.max_shutdown_secs must be at least 1")]
    ZeroShutdownTime,

    #[error("logging.level `{0}` is not one of trace, debug, info, warn, error")]
    UnknownLogLevel(String),

    #[error("logging.file.directory must not be empty")]
    EmptyLogDirectory,

    #[error("lifecycle.poll_interval_ms must be at least 1")]
    ZeroPollInterval,

    #[error("service.name must not be empty")]
    EmptyServiceName,
}

/// Check an IPv4 or IPv6 literal.
pub fn is_valid_ip(host: &str) -> bool {
    host.parse::<IpAddr>().is_ok()
}

/// Validate a deserialized configuration, collecting every error.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::EmptyServiceName);
    }
    if !is_valid_ip(&config.server.host) {
        errors.push(ValidationError::InvalidHost(config.server.host.clone()));
    }
    if config.server.max_workers == 0 {
        errors.push(ValidationError::NoWorkers);
    }
    if config.server.max_shutdown_secs == 0 {
        errors.push(ValidationError::ZeroShutdownTime);
    }
    if !LOG_LEVELS.contains(&config.logging.level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::UnknownLogLevel(config.logging.level.clone()));
    }
    if let Some(file) = &config.logging.file {
        if file.directory.trim().is_empty() {
            errors.push(ValidationError::EmptyLogDirectory);
        }
    }
    if config.lifecycle.poll_interval_ms == 0 {
        errors.push(ValidationError::ZeroPollInterval);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
