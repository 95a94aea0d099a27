// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fixture builders shared by this crate's tests and, behind the
//! `test-support` feature, by other crates' tests.

use crate::agent::{AgentId, NodeId};
use crate::event::{Event, EventKind, EventPayload};
use crate::interest::{Interest, InterestId, InterestLevel};
use crate::lock::{LockId, SemanticLock, DEFAULT_MAX_RENEWALS};
use crate::target::SemanticTarget;

/// A line-range lock with fixed node identity and sensible defaults.
pub fn lock_fixture(
    holder: &str,
    path: &str,
    start: u32,
    end: u32,
    fencing_token: u64,
    expires_at_ms: u64,
) -> SemanticLock {
    SemanticLock {
        id: LockId::new(),
        target: SemanticTarget::line_range(path, start, end),
        holder_id: AgentId::new(holder),
        holder_name: holder.to_string(),
        intention: format!("{holder} works on {path}"),
        fencing_token,
        node_id: NodeId::from_string("node-00000000000000aa"),
        acquired_at_ms: 0,
        expires_at_ms,
        renew_count: 0,
        max_renewals: DEFAULT_MAX_RENEWALS,
    }
}

/// A whole-file lock.
pub fn file_lock_fixture(holder: &str, path: &str, fencing_token: u64, expires_at_ms: u64) -> SemanticLock {
    let mut lock = lock_fixture(holder, path, 0, 0, fencing_token, expires_at_ms);
    lock.target = SemanticTarget::file(path);
    lock
}

/// A FileChange event for `path` from `source`.
pub fn file_event(source: &str, path: &str, now_ms: u64) -> Event {
    Event::new(
        EventKind::FileChange,
        AgentId::new(source),
        source,
        EventPayload::FileChange { change: "edit".into() },
        now_ms,
    )
    .with_file(path)
}

/// An interest over `patterns` at the given level, expiring far in the future.
pub fn interest_fixture(agent: &str, patterns: &[&str], level: InterestLevel) -> Interest {
    Interest {
        id: InterestId::new(),
        agent_id: AgentId::new(agent),
        agent_name: agent.to_string(),
        patterns: patterns.iter().map(|s| s.to_string()).collect(),
        track_dependencies: false,
        level,
        created_at_ms: 0,
        expires_at_ms: u64::MAX,
        metadata: Default::default(),
        remote: false,
        node_id: None,
    }
}
