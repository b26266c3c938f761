//! Reload pipeline state machine.
//!
//! # State Transitions
//! ```text
//! Idle → Reducing: batch dequeued
//! Reducing → Mutating: verdict computed
//! Mutating → Compiling: store updated
//! Compiling → Publishing: generation built
//! Compiling → Failed: validation error or budget exceeded
//! Publishing → Idle, Failed → Idle
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::Serialize;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadState {
    Idle = 0,
    Reducing = 1,
    Mutating = 2,
    Compiling = 3,
    Publishing = 4,
    Failed = 5,
}

impl From<u8> for ReloadState {
    fn from(val: u8) -> Self {
        match val {
            1 => ReloadState::Reducing,
            2 => ReloadState::Mutating,
            3 => ReloadState::Compiling,
            4 => ReloadState::Publishing,
            5 => ReloadState::Failed,
            _ => ReloadState::Idle,
        }
    }
}

impl fmt::Display for ReloadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReloadState::Idle => "idle",
            ReloadState::Reducing => "reducing",
            ReloadState::Mutating => "mutating",
            ReloadState::Compiling => "compiling",
            ReloadState::Publishing => "publishing",
            ReloadState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Lock-free holder of the current state, readable by the admin surface.
#[derive(Debug, Default)]
pub struct StateCell {
    state: AtomicU8,
}

impl StateCell {
    pub fn get(&self) -> ReloadState {
        ReloadState::from(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, next: ReloadState) {
        let prev = ReloadState::from(self.state.swap(next as u8, Ordering::AcqRel));
        tracing::trace!(from = %prev, to = %next, "Reload state transition");
    }
}
