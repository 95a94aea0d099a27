// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inter-daemon envelope.
//!
//! Every frame on the mesh is one `PeerMessage`, JSON-encoded. The
//! transport below is opaque pub/sub + unicast; ordering across daemons is
//! whatever it provides.

use serde::{Deserialize, Serialize};

use hive_core::{
    Event, InterestChange, LockId, NodeId, SemanticLock, SessionId, Vote,
};

/// One frame between daemons
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerMessage {
    /// Phase-one reservation announcement
    Intent {
        lock: SemanticLock,
        announced_at_ms: u64,
        expires_at_ms: u64,
    },

    /// A lock entered the sender's store
    Acquired { lock: SemanticLock },

    /// A lock left the sender's store
    Released { lock_id: LockId },

    /// A coordination event for interest-based routing
    Event { event: Event },

    /// The sender's interest registry changed
    InterestChange { change: InterestChange },

    /// A vote on a negotiation session
    Vote { session_id: SessionId, vote: Vote },

    /// The sender is departing the mesh
    PeerLeaving { node_id: NodeId, reason: String },
}

impl PeerMessage {
    /// Message kind for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Intent { .. } => "intent",
            PeerMessage::Acquired { .. } => "acquired",
            PeerMessage::Released { .. } => "released",
            PeerMessage::Event { .. } => "event",
            PeerMessage::InterestChange { .. } => "interest_change",
            PeerMessage::Vote { .. } => "vote",
            PeerMessage::PeerLeaving { .. } => "peer_leaving",
        }
    }
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
