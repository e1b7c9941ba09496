//! Managed context: the scoped region whose exit always runs shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::lifecycle::hooks::ShutdownReport;
use crate::lifecycle::shutdown::LifecycleOrchestrator;

/// Guard returned by [`LifecycleOrchestrator::enter_managed_context`].
///
/// Dropping it, on a normal return or while a panic unwinds, runs the
/// shutdown routine if nothing else has and waits for it to complete.
pub struct ManagedContext {
    orchestrator: Arc<LifecycleOrchestrator>,
    signal_listener: Option<JoinHandle<()>>,
    finished: bool,
}

impl ManagedContext {
    pub(crate) fn new(orchestrator: Arc<LifecycleOrchestrator>, signal_listener: JoinHandle<()>) -> Self {
        Self {
            orchestrator,
            signal_listener: Some(signal_listener),
            finished: false,
        }
    }

    /// True once shutdown has been requested by any path.
    pub fn shutdown_requested(&self) -> bool {
        self.orchestrator.shutdown_requested()
    }

    pub fn orchestrator(&self) -> &Arc<LifecycleOrchestrator> {
        &self.orchestrator
    }

    /// Idle until shutdown is requested, checking at the configured interval.
    pub fn wait_for_shutdown(&self) {
        let interval = Duration::from_millis(self.orchestrator.config().poll_interval_ms.max(1));
        while !self.shutdown_requested() {
            std::thread::sleep(interval);
        }
    }

    /// Leave the managed region and return the shutdown report.
    pub fn finish(mut self) -> ShutdownReport {
        self.finalize()
    }

    fn finalize(&mut self) -> ShutdownReport {
        self.finished = true;
        if let Some(listener) = self.signal_listener.take() {
            listener.abort();
        }

        match self.orchestrator.execute_shutdown() {
            Some(report) => report,
            None => self.orchestrator.wait_for_completion().unwrap_or_default(),
        }
    }
}

impl Drop for ManagedContext {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        if std::thread::panicking() {
            tracing::error!("Error during app execution: panic in managed region");
        }
        self.finalize();
    }
}

impl std::fmt::Debug for ManagedContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedContext")
            .field("orchestrator", &self.orchestrator)
            .field("finished", &self.finished)
            .finish()
    }
}
