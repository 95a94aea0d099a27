// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use hive_core::{AgentId, EventFilter, InterestLevel, LockId, NotificationId, Proposal, SessionId};

/// Interest registration parameters as clients send them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterestSpec {
    pub patterns: Vec<String>,
    #[serde(default)]
    pub track_dependencies: bool,
    pub level: InterestLevel,
    /// Override the default TTL, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Request from a client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Health check ping
    Ping,

    /// Version handshake
    Hello { version: String },

    /// Create a mesh for a project; returns the invite token
    Init { project: String },

    /// Join an existing mesh via invite token
    Join { token: String },

    /// Acquire a semantic lock (intent + acquire in one round trip)
    LockAcquire {
        file_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_line: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_line: Option<u32>,
        intention: String,
        holder_id: AgentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        holder_name: Option<String>,
    },

    /// Release a held lock
    LockRelease { lock_id: LockId, holder_id: AgentId },

    /// Renew a held lock's lease
    LockRenew { lock_id: LockId, holder_id: AgentId },

    /// List active locks
    LockList,

    /// Offer a proposal on an open negotiation session
    Negotiate { session_id: SessionId, proposal: Proposal },

    /// List open negotiation sessions
    SessionList,

    /// Register an interest for an agent
    InterestRegister { agent_id: AgentId, agent_name: String, spec: InterestSpec },

    /// Share a context document with the mesh
    ContextShare {
        agent_id: AgentId,
        file_path: String,
        content: String,
        #[serde(default)]
        metadata: HashMap<String, String>,
    },

    /// List events visible to an agent
    Events {
        agent_id: AgentId,
        #[serde(default)]
        filter: EventFilter,
    },

    /// Answer a pending notification
    NotifyRespond {
        notification_id: NotificationId,
        action_id: String,
        #[serde(default)]
        data: HashMap<String, String>,
    },

    /// Begin a graceful departure
    LeaveStart,

    /// Snapshot the departure state machine
    LeaveStatus,

    /// Get daemon status
    Status,

    /// Request daemon shutdown
    Shutdown,
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
