// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store of active semantic locks.
//!
//! The store exclusively owns every [`SemanticLock`] record. Secondary
//! indices (holder, file) mutate under the same writer lock as the primary
//! map and contain exactly the ids present in it. Expired entries are
//! invisible to reads and reclaimed by [`LockStore::reap_expired`].

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::agent::AgentId;
use crate::clock::{Clock, SystemClock};
use crate::error::CoordError;
use crate::lock::{LockId, SemanticLock};
use crate::target::SemanticTarget;

#[derive(Default)]
struct StoreInner {
    by_id: HashMap<LockId, SemanticLock>,
    by_holder: HashMap<AgentId, HashSet<LockId>>,
    by_file: HashMap<String, HashSet<LockId>>,
}

impl StoreInner {
    fn insert(&mut self, lock: SemanticLock) {
        let id = lock.id;
        self.by_holder.entry(lock.holder_id.clone()).or_default().insert(id);
        self.by_file.entry(lock.target.file_path.clone()).or_default().insert(id);
        self.by_id.insert(id, lock);
    }

    fn remove(&mut self, id: &LockId) -> Option<SemanticLock> {
        let lock = self.by_id.remove(id)?;
        if let Some(ids) = self.by_holder.get_mut(&lock.holder_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_holder.remove(&lock.holder_id);
            }
        }
        if let Some(ids) = self.by_file.get_mut(&lock.target.file_path) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_file.remove(&lock.target.file_path);
            }
        }
        Some(lock)
    }

    fn conflicts(&self, target: &SemanticTarget, now_ms: u64) -> Vec<SemanticLock> {
        let Some(ids) = self.by_file.get(&target.file_path) else {
            return Vec::new();
        };
        let mut out: Vec<SemanticLock> = ids
            .iter()
            .filter_map(|id| self.by_id.get(id))
            .filter(|l| !l.is_expired(now_ms) && l.target.conflicts_with(target))
            .cloned()
            .collect();
        out.sort_by_key(|l| l.acquired_at_ms);
        out
    }
}

/// Concurrent store of this mesh's active locks (local and mirrored).
pub struct LockStore<C: Clock = SystemClock> {
    clock: C,
    inner: RwLock<StoreInner>,
}

impl LockStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for LockStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> LockStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, inner: RwLock::new(StoreInner::default()) }
    }

    /// Insert a lock after a conflict check under the same writer lock.
    ///
    /// Fails retryable with the first conflicting lock's context when the
    /// target overlaps any active lock.
    pub fn add(&self, lock: SemanticLock) -> Result<(), CoordError> {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.write();
        let conflicts = inner.conflicts(&lock.target, now_ms);
        if let Some(existing) = conflicts.first() {
            return Err(CoordError::retryable(
                "lock_conflict",
                format!("target overlaps lock held by {}", existing.holder_id),
            )
            .with_lock_id(existing.id)
            .with_file_path(&lock.target.file_path));
        }
        inner.insert(lock);
        Ok(())
    }

    /// Insert without a conflict check. Used when a negotiation resolution
    /// has already decided the winner.
    pub fn add_unchecked(&self, lock: SemanticLock) {
        self.inner.write().insert(lock);
    }

    /// Active lock by id; expired entries read as absent.
    pub fn get(&self, id: &LockId) -> Option<SemanticLock> {
        let now_ms = self.clock.epoch_ms();
        let inner = self.inner.read();
        inner.by_id.get(id).filter(|l| !l.is_expired(now_ms)).cloned()
    }

    /// Remove and return a lock regardless of expiry.
    pub fn remove(&self, id: &LockId) -> Option<SemanticLock> {
        self.inner.write().remove(id)
    }

    /// Apply `f` to the stored lock under the writer lock.
    ///
    /// Returns `None` if the lock is absent or expired; otherwise the
    /// updated copy.
    pub fn update<F, T>(&self, id: &LockId, f: F) -> Option<(SemanticLock, T)>
    where
        F: FnOnce(&mut SemanticLock) -> T,
    {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.write();
        let lock = inner.by_id.get_mut(id)?;
        if lock.is_expired(now_ms) {
            return None;
        }
        let out = f(lock);
        Some((lock.clone(), out))
    }

    /// Active locks held by one agent.
    pub fn list_by_holder(&self, holder: &AgentId) -> Vec<SemanticLock> {
        let now_ms = self.clock.epoch_ms();
        let inner = self.inner.read();
        let Some(ids) = inner.by_holder.get(holder) else {
            return Vec::new();
        };
        let mut out: Vec<SemanticLock> = ids
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|l| !l.is_expired(now_ms))
            .cloned()
            .collect();
        out.sort_by_key(|l| l.acquired_at_ms);
        out
    }

    /// Active locks covering one file.
    pub fn list_by_file(&self, path: &str) -> Vec<SemanticLock> {
        let now_ms = self.clock.epoch_ms();
        let inner = self.inner.read();
        let Some(ids) = inner.by_file.get(path) else {
            return Vec::new();
        };
        let mut out: Vec<SemanticLock> = ids
            .iter()
            .filter_map(|id| inner.by_id.get(id))
            .filter(|l| !l.is_expired(now_ms))
            .cloned()
            .collect();
        out.sort_by_key(|l| l.acquired_at_ms);
        out
    }

    /// Every active lock, oldest first.
    pub fn list_all(&self) -> Vec<SemanticLock> {
        let now_ms = self.clock.epoch_ms();
        let inner = self.inner.read();
        let mut out: Vec<SemanticLock> =
            inner.by_id.values().filter(|l| !l.is_expired(now_ms)).cloned().collect();
        out.sort_by_key(|l| l.acquired_at_ms);
        out
    }

    /// Active locks whose targets overlap `target`.
    pub fn find_conflicts(&self, target: &SemanticTarget) -> Vec<SemanticLock> {
        let now_ms = self.clock.epoch_ms();
        self.inner.read().conflicts(target, now_ms)
    }

    /// Drop expired entries from the primary map and all indices.
    /// Returns how many were reaped.
    pub fn reap_expired(&self) -> usize {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.write();
        let expired: Vec<LockId> = inner
            .by_id
            .values()
            .filter(|l| l.is_expired(now_ms))
            .map(|l| l.id)
            .collect();
        let reaped = expired.len();
        for id in expired {
            inner.remove(&id);
        }
        if reaped > 0 {
            tracing::debug!(reaped, "expired locks reaped");
        }
        reaped
    }

    /// Count of active locks.
    pub fn len(&self) -> usize {
        let now_ms = self.clock.epoch_ms();
        self.inner.read().by_id.values().filter(|l| !l.is_expired(now_ms)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "lock_store_tests.rs"]
mod tests;
