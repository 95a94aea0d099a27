// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

use hive_core::{
    ErrorCategory, Event, Interest, LeaveStatus, LockId, NegotiationSession, NodeId, Resolution,
    SemanticLock,
};

/// What a successful `LockAcquire` hands back to the holder.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LockGrant {
    pub lock_id: LockId,
    pub fencing_token: u64,
    pub expires_at_ms: u64,
}

/// Daemon status summary for `Status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonStatus {
    pub version: String,
    pub node_id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub uptime_ms: u64,
    pub active_locks: usize,
    pub interests: usize,
    pub pending_notifications: usize,
    pub event_log_size: usize,
    pub connected_peers: usize,
}

/// Response from the daemon to a client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    /// Ping reply
    Pong,

    /// Handshake reply
    Hello { version: String },

    /// Generic success with nothing to report
    Ok,

    /// Operation failed; category tells the client whether to retry
    Error {
        category: ErrorCategory,
        code: String,
        message: String,
    },

    /// Mesh created
    InitOk { project: String, node_id: NodeId, token: String },

    /// Mesh joined
    JoinOk { project: String, connected_peers: usize },

    /// Lock granted
    LockAcquired { grant: LockGrant },

    /// Active locks
    Locks { locks: Vec<SemanticLock> },

    /// A proposal settled the session
    Negotiated { resolution: Resolution },

    /// Open negotiation sessions, oldest first
    Sessions { sessions: Vec<NegotiationSession> },

    /// Interest registered
    InterestRegistered { interest: Interest },

    /// Events visible to the requesting agent, newest first
    Events { events: Vec<Event> },

    /// Departure snapshot
    LeaveStatus { status: LeaveStatus },

    /// Daemon status summary
    Status { status: DaemonStatus },

    /// Shutdown acknowledged
    ShuttingDown,
}

impl Response {
    /// Map a coordination error onto the wire.
    pub fn from_error(err: &hive_core::CoordError) -> Self {
        Response::Error {
            category: err.category(),
            code: err.code().to_string(),
            message: err.message().to_string(),
        }
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
