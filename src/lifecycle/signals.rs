//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT)
//! - Translate signals to [`Signal`] values
//! - Hand each signal to the orchestrator's signal entry point
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The listener keeps running after the first signal so later ones are
//!   absorbed instead of killing the process
//! - Hooks may block, so each signal is handled on the blocking pool

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::LifecycleOrchestrator;

/// A process-termination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// SIGINT (Ctrl-C).
    Interrupt,
    /// SIGTERM.
    Terminate,
}

impl Signal {
    /// Symbolic signal name.
    pub fn name(&self) -> &'static str {
        match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
        }
    }
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Install interrupt/terminate listeners feeding `orchestrator`.
///
/// Handlers are registered before this returns, so registration errors
/// surface here rather than inside the spawned task.
#[cfg(unix)]
pub(crate) fn install(
    orchestrator: Arc<LifecycleOrchestrator>,
    runtime: &Handle,
) -> std::io::Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let _guard = runtime.enter();
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    Ok(runtime.spawn(async move {
        loop {
            let received = tokio::select! {
                r = sigint.recv() => r.map(|_| Signal::Interrupt),
                r = sigterm.recv() => r.map(|_| Signal::Terminate),
            };
            let Some(signal) = received else {
                break;
            };
            dispatch(&orchestrator, signal);
        }
    }))
}

#[cfg(not(unix))]
pub(crate) fn install(
    orchestrator: Arc<LifecycleOrchestrator>,
    runtime: &Handle,
) -> std::io::Result<JoinHandle<()>> {
    let _guard = runtime.enter();
    Ok(runtime.spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            dispatch(&orchestrator, Signal::Interrupt);
        }
    }))
}

fn dispatch(orchestrator: &Arc<LifecycleOrchestrator>, signal: Signal) {
    tracing::debug!(signal = %signal, "Signal received");
    let orchestrator = Arc::clone(orchestrator);
    tokio::task::spawn_blocking(move || {
        orchestrator.handle_signal(signal);
    });
}
