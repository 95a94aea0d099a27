// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Semantic locks and acquisition intents.
//!
//! A lock is a lease on a [`SemanticTarget`] carrying a human-readable
//! intention and a fencing token. Locks live only in the [`LockStore`];
//! everything here is plain data.
//!
//! [`LockStore`]: crate::lock_store::LockStore

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, NodeId};
use crate::define_id;
use crate::error::CoordError;
use crate::target::SemanticTarget;

define_id! {
    /// Identifier for a semantic lock.
    pub struct LockId("lock-");
}

/// Default lease length for a freshly acquired lock.
pub const DEFAULT_LOCK_TTL_MS: u64 = 15 * 60 * 1000;

/// Default number of renewals a holder may perform.
pub const DEFAULT_MAX_RENEWALS: u32 = 3;

/// A lease on a code region, held by one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticLock {
    pub id: LockId,
    pub target: SemanticTarget,
    pub holder_id: AgentId,
    #[serde(default = "default_holder_name")]
    pub holder_name: String,
    pub intention: String,
    /// Strictly monotonic per minting daemon; ties across daemons break
    /// on `(fencing_token, node_id)`.
    pub fencing_token: u64,
    /// Daemon that minted this lock.
    pub node_id: NodeId,
    pub acquired_at_ms: u64,
    pub expires_at_ms: u64,
    #[serde(default)]
    pub renew_count: u32,
    #[serde(default = "default_max_renewals")]
    pub max_renewals: u32,
}

fn default_holder_name() -> String {
    "unknown".to_string()
}

fn default_max_renewals() -> u32 {
    DEFAULT_MAX_RENEWALS
}

impl SemanticLock {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Lease time left at `now_ms`, zero when expired.
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.expires_at_ms.saturating_sub(now_ms)
    }

    pub fn can_renew(&self) -> bool {
        self.renew_count < self.max_renewals
    }

    /// Extend the lease by `ttl_ms` from `now_ms`.
    ///
    /// Failure is idempotent: once the renewal budget is spent, every call
    /// returns the same error and the lock is untouched.
    pub fn renew(&mut self, now_ms: u64, ttl_ms: u64) -> Result<(), CoordError> {
        if !self.can_renew() {
            return Err(CoordError::permanent("max_renewals", "max renewals exceeded")
                .with_lock_id(self.id)
                .with_file_path(&self.target.file_path));
        }
        self.renew_count += 1;
        self.expires_at_ms = now_ms + ttl_ms;
        Ok(())
    }
}

/// Phase-one reservation of a lock, pending acquire.
///
/// Transient: discarded on acquire, timeout, or when a conflict upgrades
/// it into a negotiation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockIntent {
    pub lock: SemanticLock,
    pub announced_at_ms: u64,
    pub expires_at_ms: u64,
    /// Peers that have acknowledged seeing this intent.
    #[serde(default)]
    pub acknowledged: HashSet<NodeId>,
}

impl LockIntent {
    pub fn id(&self) -> LockId {
        self.lock.id
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at_ms
    }
}

/// A detected collision between a requested lock and a held one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConflict {
    pub requested: SemanticLock,
    pub conflicting: SemanticLock,
    pub detected_at_ms: u64,
}

impl LockConflict {
    pub fn file_path(&self) -> &str {
        &self.requested.target.file_path
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
