//! Shutdown coordination for the service.

use std::io::{IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::config::LifecycleConfig;
use crate::lifecycle::context::ManagedContext;
use crate::lifecycle::hooks::{run_hooks, HookRegistry, HookResult, ShutdownReport};
use crate::lifecycle::signals::{self, Signal};
use crate::lifecycle::state::{AtomicShutdownState, ShutdownState};
use crate::lifecycle::LifecycleError;

/// Owns shutdown state and the hook sequence for one process lifetime.
///
/// Shared as `Arc<LifecycleOrchestrator>` between the main body and the
/// signal listener. Hooks run at most once no matter how many callers race
/// to trigger shutdown.
pub struct LifecycleOrchestrator {
    config: LifecycleConfig,
    state: AtomicShutdownState,
    hooks: Mutex<HookRegistry>,
    report: Mutex<Option<ShutdownReport>>,
    completed: Condvar,
    executor: Mutex<Option<ThreadId>>,
    entered: AtomicBool,
    ready: AtomicBool,
}

impl LifecycleOrchestrator {
    /// Create an orchestrator with the given lifecycle settings.
    pub fn new(config: LifecycleConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            state: AtomicShutdownState::new(),
            hooks: Mutex::new(HookRegistry::default()),
            report: Mutex::new(None),
            completed: Condvar::new(),
            executor: Mutex::new(None),
            entered: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        })
    }

    /// Lifecycle settings this orchestrator was built with.
    pub fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Enter the managed region.
    ///
    /// Installs SIGINT/SIGTERM listeners on the current tokio runtime and
    /// returns a guard that runs shutdown when dropped. Must be called from
    /// within a runtime context.
    pub fn enter_managed_context(self: &Arc<Self>) -> Result<ManagedContext, LifecycleError> {
        if self.entered.swap(true, Ordering::SeqCst) {
            return Err(LifecycleError::AlreadyEntered);
        }

        let listener = tokio::runtime::Handle::try_current()
            .map_err(|_| LifecycleError::NoRuntime)
            .and_then(|runtime| {
                signals::install(Arc::clone(self), &runtime).map_err(LifecycleError::SignalInstall)
            });
        let listener = match listener {
            Ok(listener) => listener,
            Err(e) => {
                self.entered.store(false, Ordering::SeqCst);
                return Err(e);
            }
        };

        self.ready.store(true, Ordering::SeqCst);
        tracing::info!(hooks = self.hook_count(), "Lifecycle started");

        Ok(ManagedContext::new(Arc::clone(self), listener))
    }

    /// Run `body` inside a managed context.
    ///
    /// Shutdown always runs before this returns. A body error is logged and
    /// handed back unchanged; panics propagate after shutdown has run.
    pub fn run_managed<T, E, F>(self: &Arc<Self>, body: F) -> Result<T, ManagedError<E>>
    where
        F: FnOnce(&ManagedContext) -> Result<T, E>,
        E: std::fmt::Display,
    {
        let context = self.enter_managed_context().map_err(ManagedError::Lifecycle)?;

        let outcome = body(&context);
        if let Err(e) = &outcome {
            tracing::error!(error = %e, "Error during app execution: {}", e);
        }

        context.finish();
        outcome.map_err(ManagedError::Body)
    }

    /// Append a hook named after its registration index.
    pub fn register_shutdown_hook<F>(&self, hook: F) -> Result<usize, LifecycleError>
    where
        F: FnOnce() -> HookResult + Send + 'static,
    {
        lock(&self.hooks).push(None, Box::new(hook))
    }

    /// Append a hook with a name used in shutdown reports.
    pub fn register_named_shutdown_hook<F>(
        &self,
        name: impl Into<String>,
        hook: F,
    ) -> Result<usize, LifecycleError>
    where
        F: FnOnce() -> HookResult + Send + 'static,
    {
        lock(&self.hooks).push(Some(name.into()), Box::new(hook))
    }

    /// Number of hooks waiting to run.
    pub fn hook_count(&self) -> usize {
        lock(&self.hooks).len()
    }

    /// Mark shutdown as requested. Returns true only for the first caller.
    pub fn request_shutdown(&self) -> bool {
        self.state.request()
    }

    /// True once shutdown has been requested.
    pub fn shutdown_requested(&self) -> bool {
        self.state.load() != ShutdownState::NotRequested
    }

    pub fn state(&self) -> ShutdownState {
        self.state.load()
    }

    /// True after the managed context has been entered.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Signal entry point.
    ///
    /// A signal arriving after shutdown was already requested is absorbed.
    pub fn handle_signal(&self, signal: Signal) -> Option<ShutdownReport> {
        if !self.request_shutdown() {
            tracing::debug!(signal = %signal, "Shutdown already in progress, ignoring signal");
            return None;
        }

        if self.config.clear_terminal_line {
            clear_terminal_line();
        }
        tracing::info!(signal = %signal, "Received {} signal. Starting shutdown ...", signal);

        self.execute_shutdown()
    }

    /// Run every hook once, newest first.
    ///
    /// The first caller runs the hooks and gets the report. Concurrent callers
    /// block until it finishes and get `None`.
    pub fn execute_shutdown(&self) -> Option<ShutdownReport> {
        self.request_shutdown();

        let claimed = lock(&self.hooks).seal();
        let Some(hooks) = claimed else {
            if !self.is_executor() {
                self.wait_for_completion();
            }
            return None;
        };

        *lock(&self.executor) = Some(thread::current().id());
        tracing::info!(
            hooks = hooks.len(),
            "Application must execute {} functions before completing the shutdown",
            hooks.len()
        );

        let report = run_hooks(hooks);

        if report.is_clean() {
            tracing::info!(hooks_run = report.hooks_run, "Shutdown complete with no errors");
        } else {
            let listing: String = report
                .errors
                .iter()
                .map(|e| format!("\t{}\n", e))
                .collect();
            tracing::warn!(
                hooks_run = report.hooks_run,
                errors = report.errors.len(),
                "Shutdown completed with {} errors.\n{}",
                report.errors.len(),
                listing
            );
        }

        // Completed is only observable once the report is readable.
        let mut stored = lock(&self.report);
        *stored = Some(report.clone());
        self.state.complete();
        drop(stored);
        self.completed.notify_all();
        *lock(&self.executor) = None;

        Some(report)
    }

    /// Block until shutdown has completed and return its report.
    ///
    /// Returns `None` when called from inside a running hook, which would
    /// otherwise wait on itself.
    pub fn wait_for_completion(&self) -> Option<ShutdownReport> {
        if self.is_executor() {
            return None;
        }
        let mut report = lock(&self.report);
        while report.is_none() {
            report = self
                .completed
                .wait(report)
                .unwrap_or_else(PoisonError::into_inner);
        }
        report.clone()
    }

    /// Report of the completed shutdown, if it has run.
    pub fn report(&self) -> Option<ShutdownReport> {
        lock(&self.report).clone()
    }

    fn is_executor(&self) -> bool {
        *lock(&self.executor) == Some(thread::current().id())
    }
}

impl std::fmt::Debug for LifecycleOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleOrchestrator")
            .field("state", &self.state())
            .field("hooks", &self.hook_count())
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Failure of a managed run.
#[derive(Debug)]
pub enum ManagedError<E> {
    /// The managed context could not be entered.
    Lifecycle(LifecycleError),
    /// The body returned an error.
    Body(E),
}

impl<E: std::fmt::Display> std::fmt::Display for ManagedError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagedError::Lifecycle(e) => write!(f, "Lifecycle error: {}", e),
            ManagedError::Body(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for ManagedError<E> {}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Erase whatever was echoed on the current terminal line (e.g. `^C`).
fn clear_terminal_line() {
    let mut stdout = std::io::stdout();
    if stdout.is_terminal() {
        let _ = stdout.write_all(b"\r\x1b[K");
        let _ = stdout.flush();
    }
}
