//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events (info/warn/error)
//!
//! logging.rs installs the subscriber:
//!     → console (pretty, compact or JSON)
//!     → rolling file (optional, non-blocking)
//! ```
//!
//! # Design Decisions
//! - Subscriber is configured once from the passed-down LoggingConfig
//! - No module-level logger state besides the tracing dispatcher itself

pub mod logging;

pub use logging::{init_logging, LoggingError, LoggingGuard};
