//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServiceConfig (validated, immutable)
//!     → sections handed down to logging, server, lifecycle
//!
//! On load failure:
//!     built-in default is used
//!     → error returned to the caller, logged as a warning once logging is up
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_or_default, ConfigError};
pub use schema::{
    FileLogConfig, HookFailurePolicy, LifecycleConfig, LogFormat, LogRotation, LoggingConfig,
    ServerConfig, ServiceConfig, ServiceInfo,
};
