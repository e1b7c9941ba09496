//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the service process.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    /// Service identity.
    pub service: ServiceInfo,

    /// Network server settings.
    pub server: ServerConfig,

    /// Logging settings.
    pub logging: LoggingConfig,

    /// Startup and shutdown behavior.
    pub lifecycle: LifecycleConfig,
}

/// Service identity used in log lines.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServiceInfo {
    /// Service name (e.g., "rag").
    pub name: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            name: "rag".to_string(),
        }
    }
}

/// Network server configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host IP to bind (IPv4 or IPv6 literal).
    pub host: String,

    /// Port to bind. 0 picks an ephemeral port.
    pub port: u16,

    /// Maximum concurrent connections served at once.
    pub max_workers: usize,

    /// Time allowed for in-flight connections to drain before a forced close.
    pub max_shutdown_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 50051,
            max_workers: 10,
            max_shutdown_secs: 5,
        }
    }
}

impl ServerConfig {
    /// Address string in `host:port` form, bracketing IPv6 literals.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Console output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    Pretty,
    /// Single-line output.
    #[default]
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Console format.
    pub format: LogFormat,

    /// Optional rolling file output.
    pub file: Option<FileLogConfig>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Compact,
            file: None,
        }
    }
}

/// Rolling file output for logs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FileLogConfig {
    /// Directory receiving log files. Created if missing.
    pub directory: String,

    /// File name prefix; the rotation suffix is appended.
    pub file_name_prefix: String,

    /// Rotation period.
    pub rotation: LogRotation,
}

impl Default for FileLogConfig {
    fn default() -> Self {
        Self {
            directory: "logs".to_string(),
            file_name_prefix: "service.log".to_string(),
            rotation: LogRotation::Daily,
        }
    }
}

/// What hook failures do to the process exit status.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum HookFailurePolicy {
    /// Hook failures are logged only; the exit status follows the main body.
    #[default]
    Ignore,
    /// Any hook failure makes the exit status nonzero.
    Fail,
}

/// Lifecycle configuration handed to the orchestrator.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Policy applied to hook failures when resolving the exit status.
    pub hook_failure_policy: HookFailurePolicy,

    /// Interval between `shutdown_requested` checks in the main wait loop.
    pub poll_interval_ms: u64,

    /// Erase a partially typed terminal line when a signal arrives.
    pub clear_terminal_line: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            hook_failure_policy: HookFailurePolicy::Ignore,
            poll_interval_ms: 100,
            clear_terminal_line: true,
        }
    }
}
