//! Shutdown hook registry and execution.
//!
//! # Responsibilities
//! - Keep hooks in registration order
//! - Run them last-registered first, each in isolation
//! - Turn every failure (error return or panic) into a [`ShutdownError`]

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use thiserror::Error;

use crate::lifecycle::LifecycleError;

/// Error a hook may return.
pub type HookError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Return type of a shutdown hook.
pub type HookResult = Result<(), HookError>;

/// A deferred teardown action.
pub type ShutdownHook = Box<dyn FnOnce() -> HookResult + Send + 'static>;

/// One hook failure recorded during shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("hook #{index} ({name}): {message}")]
pub struct ShutdownError {
    /// Registration index of the failing hook.
    pub index: usize,
    /// Hook name.
    pub name: String,
    /// Failure description.
    pub message: String,
}

/// Outcome of the shutdown routine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Number of hooks executed.
    pub hooks_run: usize,
    /// Failures in execution order.
    pub errors: Vec<ShutdownError>,
}

impl ShutdownReport {
    /// True when every hook succeeded.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

impl fmt::Display for ShutdownReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors.is_empty() {
            return write!(f, "{} hooks run, no errors", self.hooks_run);
        }
        write!(f, "{} hooks run, {} errors", self.hooks_run, self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n\t{}", error)?;
        }
        Ok(())
    }
}

pub(crate) struct RegisteredHook {
    index: usize,
    name: String,
    hook: ShutdownHook,
}

/// Ordered hook storage. Sealed once shutdown execution claims it.
#[derive(Default)]
pub(crate) struct HookRegistry {
    hooks: Vec<RegisteredHook>,
    next_index: usize,
    sealed: bool,
}

impl HookRegistry {
    pub(crate) fn push(&mut self, name: Option<String>, hook: ShutdownHook) -> Result<usize, LifecycleError> {
        if self.sealed {
            return Err(LifecycleError::ShutdownInProgress);
        }
        let index = self.next_index;
        self.next_index += 1;
        self.hooks.push(RegisteredHook {
            index,
            name: name.unwrap_or_else(|| format!("hook-{}", index)),
            hook,
        });
        Ok(index)
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Claim every hook for execution. Only the first call gets them.
    pub(crate) fn seal(&mut self) -> Option<Vec<RegisteredHook>> {
        if self.sealed {
            return None;
        }
        self.sealed = true;
        Some(std::mem::take(&mut self.hooks))
    }
}

/// Run hooks in reverse registration order. Never panics.
pub(crate) fn run_hooks(hooks: Vec<RegisteredHook>) -> ShutdownReport {
    let mut report = ShutdownReport::default();

    for RegisteredHook { index, name, hook } in hooks.into_iter().rev() {
        tracing::debug!(hook = %name, index, "Running shutdown hook");
        report.hooks_run += 1;

        let message = match panic::catch_unwind(AssertUnwindSafe(hook)) {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };

        tracing::debug!(hook = %name, index, error = %message, "Shutdown hook failed");
        report.errors.push(ShutdownError { index, name, message });
    }

    report
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
