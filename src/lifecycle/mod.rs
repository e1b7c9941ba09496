//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (shutdown.rs → context.rs):
//!     enter_managed_context → install signal listeners → ready → ManagedContext
//!
//! Shutdown triggers (any of):
//!     SIGTERM/SIGINT (signals.rs) → handle_signal
//!     ManagedContext dropped / finished (normal exit, error, panic)
//!
//! Shutdown routine (shutdown.rs → hooks.rs), runs once:
//!     claim hooks → run newest first, each isolated → report → Completed
//!
//! Exit (exit.rs):
//!     body outcome + report + HookFailurePolicy → process exit code
//! ```
//!
//! # Design Decisions
//! - State is a single atomic; NotRequested → Requested is a compare-and-swap
//! - The hook registry is sealed in the same step that claims it for
//!   execution, so late registrations are rejected rather than lost
//! - Hook failures never abort teardown; they are collected and reported

pub mod context;
pub mod exit;
pub mod hooks;
pub mod shutdown;
pub mod signals;
pub mod state;

use thiserror::Error;

pub use context::ManagedContext;
pub use exit::ExitStatus;
pub use hooks::{HookError, HookResult, ShutdownError, ShutdownHook, ShutdownReport};
pub use shutdown::{LifecycleOrchestrator, ManagedError};
pub use signals::Signal;
pub use state::ShutdownState;

/// Errors raised by the orchestrator itself.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Hook registration attempted after shutdown execution began.
    #[error("shutdown already in progress; hook registration rejected")]
    ShutdownInProgress,

    /// OS signal listeners could not be registered.
    #[error("failed to install signal handlers: {0}")]
    SignalInstall(#[source] std::io::Error),

    /// `enter_managed_context` was called outside a tokio runtime.
    #[error("no tokio runtime available to listen for signals")]
    NoRuntime,

    /// The managed context was already entered.
    #[error("managed context already entered")]
    AlreadyEntered,
}
