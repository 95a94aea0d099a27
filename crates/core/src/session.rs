// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conflict-negotiation sessions.
//!
//! A session is created when a lock intent collides with a held lock. It
//! retains pre-conflict snapshots of both locks for reporting; live lock
//! state is always re-read from the store by id. The state machine and
//! proposal/vote records live here because they travel on the wire; the
//! negotiation runtime that drives them lives in `hive-engine`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::agent::AgentId;
use crate::define_id;
use crate::lock::{LockId, SemanticLock};

define_id! {
    /// Identifier for a conflict-negotiation session.
    pub struct SessionId("sess-");
}

/// One peer's vote on a negotiation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter_id: AgentId,
    pub voter_name: String,
    pub approve: bool,
    #[serde(default)]
    pub reason: String,
    pub timestamp_ms: u64,
}

/// Where a session is in its state machine.
///
/// `IntentAnnounced → WaitingVotes → (Acquired | Rejected | Escalated | TimedOut)`
///
/// A session opens in `IntentAnnounced` (the conflict has been announced
/// to the conflict callback and the mesh) and moves to `WaitingVotes`
/// when the first vote arrives. Proposals and timeouts resolve it from
/// either working state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    IntentAnnounced,
    WaitingVotes,
    Acquired,
    Rejected,
    Escalated,
    TimedOut,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::IntentAnnounced | SessionState::WaitingVotes)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SessionState::IntentAnnounced => "intent_announced",
            SessionState::WaitingVotes => "waiting_votes",
            SessionState::Acquired => "acquired",
            SessionState::Rejected => "rejected",
            SessionState::Escalated => "escalated",
            SessionState::TimedOut => "timed_out",
        };
        write!(f, "{s}")
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionKind {
    /// Settled by a proposal (yield, split, priority).
    Negotiated,
    /// Settled by majority vote in favor.
    Approved,
    /// Settled by majority vote against.
    Rejected,
    /// Hit the negotiation deadline.
    TimedOut,
    /// Escalated for human adjudication.
    HumanNeeded,
}

impl std::fmt::Display for ResolutionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ResolutionKind::Negotiated => "negotiated",
            ResolutionKind::Approved => "approved",
            ResolutionKind::Rejected => "rejected",
            ResolutionKind::TimedOut => "timed_out",
            ResolutionKind::HumanNeeded => "human_needed",
        };
        write!(f, "{s}")
    }
}

/// Terminal outcome of a session. Immutable once set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub kind: ResolutionKind,
    /// The lock left standing, when the outcome has a winner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner: Option<LockId>,
    pub detail: String,
    pub resolved_at_ms: u64,
}

/// A proposal offered to settle a conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Proposal {
    /// The named holder's lock loses.
    Yield { yielder: AgentId },
    /// Divide the contested range at a line: the held lock keeps
    /// `[.., split_point - 1]`, the requested lock starts at `split_point`.
    Split { split_point: u32 },
    /// Higher fencing token wins, ties broken by node id.
    Priority,
    /// Hand the conflict to a human.
    Escalate { reason: String },
}

/// Negotiation state for one conflict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegotiationSession {
    pub id: SessionId,
    /// Pre-conflict snapshot of the lock being requested.
    pub requested: SemanticLock,
    /// Pre-conflict snapshot of the lock already held.
    pub conflicting: SemanticLock,
    pub state: SessionState,
    pub votes: HashMap<AgentId, Vote>,
    pub required_votes: usize,
    pub started_at_ms: u64,
    pub expires_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
}

impl NegotiationSession {
    pub fn new(
        requested: SemanticLock,
        conflicting: SemanticLock,
        required_votes: usize,
        started_at_ms: u64,
        timeout_ms: u64,
    ) -> Self {
        Self {
            id: SessionId::new(),
            requested,
            conflicting,
            state: SessionState::IntentAnnounced,
            votes: HashMap::new(),
            required_votes,
            started_at_ms,
            expires_at_ms: started_at_ms + timeout_ms,
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }

    /// Record a vote keyed by voter; a voter's later vote replaces their
    /// earlier one. The first vote moves the session out of
    /// `IntentAnnounced`.
    pub fn record_vote(&mut self, vote: Vote) {
        if self.state == SessionState::IntentAnnounced {
            self.state = SessionState::WaitingVotes;
        }
        self.votes.insert(vote.voter_id.clone(), vote);
    }

    /// Once enough votes are in: `Some(true)` for a majority in favor.
    pub fn tally(&self) -> Option<bool> {
        if self.votes.len() < self.required_votes {
            return None;
        }
        let approvals = self.votes.values().filter(|v| v.approve).count();
        Some(approvals * 2 > self.votes.len())
    }

    /// Set the terminal outcome. Returns false (and changes nothing) if
    /// the session is already resolved.
    pub fn resolve(
        &mut self,
        state: SessionState,
        kind: ResolutionKind,
        winner: Option<LockId>,
        detail: impl Into<String>,
        now_ms: u64,
    ) -> bool {
        if self.resolution.is_some() {
            return false;
        }
        self.state = state;
        self.resolution = Some(Resolution {
            kind,
            winner,
            detail: detail.into(),
            resolved_at_ms: now_ms,
        });
        true
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
