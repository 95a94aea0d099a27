// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination events.
//!
//! Events are the unit of propagation between agents and across the mesh:
//! file changes, lock traffic, shared context, membership. They are owned
//! by the [`EventLog`]; routers and subscribers only see clones.
//!
//! [`EventLog`]: crate::event_log::EventLog

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, NodeId};
use crate::define_id;
use crate::lock::{LockConflict, LockId, SemanticLock};

define_id! {
    /// Identifier for a published event.
    pub struct EventId("evt-");
}

/// Default event time-to-live: 24 hours.
pub const DEFAULT_EVENT_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Kinds of coordination events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    FileChange,
    LockAcquired,
    LockReleased,
    LockConflict,
    ContextShared,
    AgentJoined,
    AgentLeft,
    Warning,
}

impl EventKind {
    /// Lock-related kinds are the only ones delivered at the
    /// `LocksOnly` interest level.
    pub fn is_lock_related(&self) -> bool {
        matches!(
            self,
            EventKind::LockAcquired | EventKind::LockReleased | EventKind::LockConflict
        )
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::FileChange => "file_change",
            EventKind::LockAcquired => "lock_acquired",
            EventKind::LockReleased => "lock_released",
            EventKind::LockConflict => "lock_conflict",
            EventKind::ContextShared => "context_shared",
            EventKind::AgentJoined => "agent_joined",
            EventKind::AgentLeft => "agent_left",
            EventKind::Warning => "warning",
        };
        write!(f, "{s}")
    }
}

/// Lifecycle status of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Active,
    Completed,
    Archived,
}

/// Type-tagged payload carried by an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    FileChange {
        change: String,
    },
    LockAcquired {
        lock: SemanticLock,
    },
    LockReleased {
        lock_id: LockId,
        holder_id: AgentId,
    },
    LockConflict {
        conflict: LockConflict,
    },
    ContextShared {
        summary: String,
        #[serde(default)]
        content_len: usize,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        metadata: HashMap<String, String>,
    },
    AgentJoined {
        node_id: NodeId,
        agent_name: String,
    },
    AgentLeft {
        node_id: NodeId,
        reason: String,
    },
    Warning {
        message: String,
    },
    /// Unknown payloads from newer peers deserialize here.
    #[serde(other)]
    Opaque,
}

/// A coordination event as stored and routed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub timestamp_ms: u64,
    pub source_id: AgentId,
    pub source_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_start: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_end: Option<u32>,
    pub payload: EventPayload,
    pub status: EventStatus,
    pub expires_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<EventId>,
}

impl Event {
    /// Build an event with a fresh id, Active status, and the default TTL.
    pub fn new(
        kind: EventKind,
        source_id: AgentId,
        source_name: impl Into<String>,
        payload: EventPayload,
        now_ms: u64,
    ) -> Self {
        Self {
            id: EventId::new(),
            kind,
            timestamp_ms: now_ms,
            source_id,
            source_name: source_name.into(),
            file_path: None,
            line_start: None,
            line_end: None,
            payload,
            status: EventStatus::Active,
            expires_at_ms: now_ms + DEFAULT_EVENT_TTL_MS,
            superseded_by: None,
        }
    }

    pub fn with_file(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.line_start = Some(start);
        self.line_end = Some(end);
        self
    }

    pub fn with_ttl_ms(mut self, ttl_ms: u64) -> Self {
        self.expires_at_ms = self.timestamp_ms + ttl_ms;
        self
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    pub fn is_archived(&self) -> bool {
        self.status == EventStatus::Archived
    }

    /// Compact line for the daemon log.
    pub fn log_summary(&self) -> String {
        match &self.file_path {
            Some(path) => format!("{} id={} src={} path={}", self.kind, self.id, self.source_id, path),
            None => format!("{} id={} src={}", self.kind, self.id, self.source_id),
        }
    }
}

/// Filter for event queries (`events/list` and subscriber backfill).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Restrict to these kinds; empty means all kinds.
    #[serde(default)]
    pub kinds: Vec<EventKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<AgentId>,
    /// Bypass interest matching and return everything the filter allows.
    #[serde(default)]
    pub include_all: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl EventFilter {
    /// True if the event satisfies kind/since/path/source constraints.
    /// Interest-level gating happens in the router, not here.
    pub fn accepts(&self, event: &Event) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if let Some(since) = self.since_ms {
            if event.timestamp_ms < since {
                return false;
            }
        }
        if let Some(path) = &self.file_path {
            if event.file_path.as_deref() != Some(path.as_str()) {
                return false;
            }
        }
        if let Some(source) = &self.source_id {
            if &event.source_id != source {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
