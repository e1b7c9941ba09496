//! Process exit status resolution.
//!
//! Hook failures only affect the exit status under [`HookFailurePolicy::Fail`];
//! by default they are reported in the logs and the status follows the main body.

use std::process::ExitCode;

use crate::config::HookFailurePolicy;
use crate::lifecycle::hooks::ShutdownReport;

/// Final process status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Clean run.
    Success,
    /// The managed body failed.
    BodyFailed,
    /// Startup could not proceed (CLI, configuration, logging, runtime).
    Fatal,
    /// Body succeeded but a hook failed under the `fail` policy.
    HookFailed,
}

impl ExitStatus {
    /// Combine the body outcome with the shutdown report.
    pub fn resolve(body_ok: bool, report: Option<&ShutdownReport>, policy: HookFailurePolicy) -> Self {
        if !body_ok {
            return ExitStatus::BodyFailed;
        }
        let hooks_failed = report.is_some_and(|r| !r.is_clean());
        match policy {
            HookFailurePolicy::Fail if hooks_failed => ExitStatus::HookFailed,
            _ => ExitStatus::Success,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::BodyFailed => 1,
            ExitStatus::Fatal => 2,
            ExitStatus::HookFailed => 3,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}
