//! Shutdown state machine.
//!
//! # State Transitions
//! ```text
//! NotRequested → Requested: first request_shutdown / signal / scope exit
//! Requested → Completed: shutdown hooks finished
//! ```
//!
//! Transitions only move forward. The NotRequested → Requested step is a
//! single compare-and-swap so exactly one caller wins it.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Process shutdown progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ShutdownState {
    NotRequested = 0,
    Requested = 1,
    Completed = 2,
}

impl ShutdownState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownState::NotRequested,
            1 => ShutdownState::Requested,
            _ => ShutdownState::Completed,
        }
    }
}

impl fmt::Display for ShutdownState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShutdownState::NotRequested => "not-requested",
            ShutdownState::Requested => "requested",
            ShutdownState::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Lock-free holder for a [`ShutdownState`].
#[derive(Debug)]
pub(crate) struct AtomicShutdownState(AtomicU8);

impl AtomicShutdownState {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(ShutdownState::NotRequested as u8))
    }

    pub(crate) fn load(&self) -> ShutdownState {
        ShutdownState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// NotRequested → Requested. Returns true only for the caller that made the move.
    pub(crate) fn request(&self) -> bool {
        self.0
            .compare_exchange(
                ShutdownState::NotRequested as u8,
                ShutdownState::Requested as u8,
                Ordering::SeqCst,
                Ordering::SeqCst,
            )
            .is_ok()
    }

    /// Move to Completed from any earlier state.
    pub(crate) fn complete(&self) {
        self.0.fetch_max(ShutdownState::Completed as u8, Ordering::SeqCst);
    }
}
