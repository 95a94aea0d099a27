// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful-departure state machine.
//!
//! One per daemon process. Drives release → sync → disconnect and keeps a
//! snapshot for `leave/status`. Terminal states are restartable: a new
//! `start` from Completed or Failed resets everything.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::error::CoordError;

/// Phases of a graceful departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeavePhase {
    Idle,
    Initiated,
    ReleasingLocks,
    Syncing,
    Disconnecting,
    Completed,
    Failed,
}

impl LeavePhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LeavePhase::Completed | LeavePhase::Failed)
    }
}

impl std::fmt::Display for LeavePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LeavePhase::Idle => "idle",
            LeavePhase::Initiated => "initiated",
            LeavePhase::ReleasingLocks => "releasing_locks",
            LeavePhase::Syncing => "syncing",
            LeavePhase::Disconnecting => "disconnecting",
            LeavePhase::Completed => "completed",
            LeavePhase::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Point-in-time snapshot of a departure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveStatus {
    pub phase: LeavePhase,
    pub started_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at_ms: Option<u64>,
    /// Wall time of the departure, present once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    pub locks_released: usize,
    pub context_synced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

struct LeaveInner {
    phase: LeavePhase,
    started_at_ms: u64,
    finished_at_ms: Option<u64>,
    locks_released: usize,
    context_synced: bool,
    error: Option<String>,
}

impl LeaveInner {
    fn fresh() -> Self {
        Self {
            phase: LeavePhase::Idle,
            started_at_ms: 0,
            finished_at_ms: None,
            locks_released: 0,
            context_synced: false,
            error: None,
        }
    }
}

/// Serialized departure tracker; the only process-wide singleton in the core.
pub struct LeaveStateMachine<C: Clock = SystemClock> {
    clock: C,
    inner: Mutex<LeaveInner>,
}

impl LeaveStateMachine<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for LeaveStateMachine<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> LeaveStateMachine<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, inner: Mutex::new(LeaveInner::fresh()) }
    }

    /// Begin a departure.
    ///
    /// Refused while one is already running; from Idle or a terminal
    /// state, counters and timestamps reset and the phase moves to
    /// Initiated.
    pub fn start(&self) -> Result<(), CoordError> {
        let mut inner = self.inner.lock();
        if inner.phase != LeavePhase::Idle && !inner.phase.is_terminal() {
            return Err(CoordError::retryable(
                "leave_in_progress",
                format!("leave already in progress (phase {})", inner.phase),
            ));
        }
        *inner = LeaveInner::fresh();
        inner.phase = LeavePhase::Initiated;
        inner.started_at_ms = self.clock.epoch_ms();
        tracing::info!("leave initiated");
        Ok(())
    }

    /// Move to a non-terminal working phase.
    pub fn transition_to(&self, phase: LeavePhase) -> Result<(), CoordError> {
        let mut inner = self.inner.lock();
        if inner.phase == LeavePhase::Idle || inner.phase.is_terminal() {
            return Err(CoordError::permanent(
                "leave_not_running",
                format!("no departure in progress (phase {})", inner.phase),
            ));
        }
        if phase == LeavePhase::Idle || phase.is_terminal() {
            return Err(CoordError::validation(
                "bad_transition",
                "use start/complete/fail for idle and terminal phases",
            ));
        }
        tracing::debug!(from = %inner.phase, to = %phase, "leave transition");
        inner.phase = phase;
        Ok(())
    }

    pub fn set_locks_released(&self, count: usize) {
        self.inner.lock().locks_released = count;
    }

    pub fn set_context_synced(&self, synced: bool) {
        self.inner.lock().context_synced = synced;
    }

    /// Terminal success.
    pub fn complete(&self) -> Result<(), CoordError> {
        let mut inner = self.inner.lock();
        if inner.phase == LeavePhase::Idle || inner.phase.is_terminal() {
            return Err(CoordError::permanent(
                "leave_not_running",
                format!("no departure in progress (phase {})", inner.phase),
            ));
        }
        inner.phase = LeavePhase::Completed;
        inner.finished_at_ms = Some(self.clock.epoch_ms());
        tracing::info!(locks_released = inner.locks_released, "leave completed");
        Ok(())
    }

    /// Terminal failure with a reason.
    pub fn fail(&self, error: impl Into<String>) {
        let mut inner = self.inner.lock();
        let error = error.into();
        tracing::warn!(%error, "leave failed");
        inner.phase = LeavePhase::Failed;
        inner.finished_at_ms = Some(self.clock.epoch_ms());
        inner.error = Some(error);
    }

    /// Snapshot for `leave/status`.
    pub fn status(&self) -> LeaveStatus {
        let inner = self.inner.lock();
        let duration_ms = inner
            .finished_at_ms
            .filter(|_| inner.phase.is_terminal())
            .map(|end| end.saturating_sub(inner.started_at_ms));
        LeaveStatus {
            phase: inner.phase,
            started_at_ms: inner.started_at_ms,
            finished_at_ms: inner.finished_at_ms,
            duration_ms,
            locks_released: inner.locks_released,
            context_synced: inner.context_synced,
            error: inner.error.clone(),
        }
    }

    pub fn phase(&self) -> LeavePhase {
        self.inner.lock().phase
    }
}

#[cfg(test)]
#[path = "leave_tests.rs"]
mod tests;
