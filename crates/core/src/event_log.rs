// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded, indexed, TTL'd append-only event log.
//!
//! The log owns every [`Event`] record. Entries are indexed by id, kind,
//! source, and file; all indices mutate under the same writer lock as the
//! primary sequence, so readers never observe a partially updated index.
//! Archived and expired entries linger until [`EventLog::compact`] runs,
//! but are invisible to every read path except [`EventLog::get`] and
//! [`EventLog::total_size`].

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;

use crate::agent::AgentId;
use crate::clock::{Clock, SystemClock};
use crate::event::{Event, EventId, EventKind, EventStatus};

/// Tuning for the event log.
#[derive(Debug, Clone)]
pub struct EventLogConfig {
    /// Cap on active entries; the oldest active entry is evicted when full.
    pub max_size: usize,
    /// Per-file cap; exceeding it archives the oldest entry for that file.
    pub max_events_per_file: usize,
}

impl Default for EventLogConfig {
    fn default() -> Self {
        Self { max_size: 10_000, max_events_per_file: 10 }
    }
}

#[derive(Default)]
struct LogInner {
    /// Primary sequence, insertion order.
    seq: VecDeque<EventId>,
    by_id: HashMap<EventId, Event>,
    by_kind: HashMap<EventKind, Vec<EventId>>,
    by_source: HashMap<AgentId, Vec<EventId>>,
    by_file: HashMap<String, Vec<EventId>>,
}

impl LogInner {
    fn insert(&mut self, event: Event) {
        let id = event.id;
        self.seq.push_back(id);
        self.by_kind.entry(event.kind).or_default().push(id);
        self.by_source.entry(event.source_id.clone()).or_default().push(id);
        if let Some(path) = &event.file_path {
            self.by_file.entry(path.clone()).or_default().push(id);
        }
        self.by_id.insert(id, event);
    }

    /// Remove an entry from the sequence and every index.
    fn purge(&mut self, id: EventId) {
        let Some(event) = self.by_id.remove(&id) else {
            return;
        };
        self.seq.retain(|e| *e != id);
        if let Some(ids) = self.by_kind.get_mut(&event.kind) {
            ids.retain(|e| *e != id);
            if ids.is_empty() {
                self.by_kind.remove(&event.kind);
            }
        }
        if let Some(ids) = self.by_source.get_mut(&event.source_id) {
            ids.retain(|e| *e != id);
            if ids.is_empty() {
                self.by_source.remove(&event.source_id);
            }
        }
        if let Some(path) = &event.file_path {
            if let Some(ids) = self.by_file.get_mut(path) {
                ids.retain(|e| *e != id);
                if ids.is_empty() {
                    self.by_file.remove(path);
                }
            }
        }
    }

    fn is_live(&self, id: &EventId, now_ms: u64) -> bool {
        self.by_id
            .get(id)
            .map(|e| !e.is_archived() && !e.is_expired(now_ms))
            .unwrap_or(false)
    }

    fn live_count(&self, now_ms: u64) -> usize {
        self.seq.iter().filter(|id| self.is_live(id, now_ms)).count()
    }

    fn collect_live(&self, ids: &[EventId], now_ms: u64) -> Vec<Event> {
        ids.iter()
            .filter(|id| self.is_live(id, now_ms))
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }
}

/// In-memory event log shared across the router and the daemon.
pub struct EventLog<C: Clock = SystemClock> {
    config: EventLogConfig,
    clock: C,
    inner: RwLock<LogInner>,
}

impl EventLog<SystemClock> {
    pub fn new(config: EventLogConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> EventLog<C> {
    pub fn with_clock(config: EventLogConfig, clock: C) -> Self {
        Self { config, clock, inner: RwLock::new(LogInner::default()) }
    }

    /// Append an event, evicting and archiving as the caps require.
    /// Returns the event's id.
    pub fn append(&self, event: Event) -> EventId {
        let now_ms = self.clock.epoch_ms();
        let id = event.id;
        let file_path = event.file_path.clone();
        let mut inner = self.inner.write();

        // Ring bound: drop the oldest active entry to make room.
        while inner.live_count(now_ms) >= self.config.max_size {
            let oldest = inner
                .seq
                .iter()
                .find(|e| inner.is_live(e, now_ms))
                .copied();
            match oldest {
                Some(old) => inner.purge(old),
                None => break,
            }
        }

        inner.insert(event);

        // Per-file cap: archive the oldest active entry for this file and
        // point every archived entry at the newest.
        if let Some(path) = file_path {
            let ids: Vec<EventId> = inner.by_file.get(&path).cloned().unwrap_or_default();
            let live: Vec<EventId> =
                ids.iter().filter(|e| inner.is_live(e, now_ms)).copied().collect();
            if live.len() > self.config.max_events_per_file {
                let overflow = live.len() - self.config.max_events_per_file;
                for old in live.iter().take(overflow) {
                    if let Some(e) = inner.by_id.get_mut(old) {
                        e.status = EventStatus::Archived;
                    }
                }
            }
            for archived in ids {
                if archived == id {
                    continue;
                }
                if let Some(e) = inner.by_id.get_mut(&archived) {
                    if e.is_archived() {
                        e.superseded_by = Some(id);
                    }
                }
            }
        }
        id
    }

    /// Direct lookup, archived and expired entries included.
    pub fn get(&self, id: &EventId) -> Option<Event> {
        self.inner.read().by_id.get(id).cloned()
    }

    /// Newest-first slice of live entries, capped at `n`.
    pub fn get_recent(&self, n: usize) -> Vec<Event> {
        let now_ms = self.clock.epoch_ms();
        let inner = self.inner.read();
        inner
            .seq
            .iter()
            .rev()
            .filter(|id| inner.is_live(id, now_ms))
            .take(n)
            .filter_map(|id| inner.by_id.get(id).cloned())
            .collect()
    }

    /// Live entries of one kind, publish order.
    pub fn get_by_kind(&self, kind: EventKind) -> Vec<Event> {
        let now_ms = self.clock.epoch_ms();
        let inner = self.inner.read();
        let ids = inner.by_kind.get(&kind).cloned().unwrap_or_default();
        inner.collect_live(&ids, now_ms)
    }

    /// Live entries from one source, publish order.
    pub fn get_by_source(&self, source: &AgentId) -> Vec<Event> {
        let now_ms = self.clock.epoch_ms();
        let inner = self.inner.read();
        let ids = inner.by_source.get(source).cloned().unwrap_or_default();
        inner.collect_live(&ids, now_ms)
    }

    /// Live entries for one file, publish order.
    pub fn get_by_file(&self, path: &str) -> Vec<Event> {
        let now_ms = self.clock.epoch_ms();
        let inner = self.inner.read();
        let ids = inner.by_file.get(path).cloned().unwrap_or_default();
        inner.collect_live(&ids, now_ms)
    }

    /// Live entries with `timestamp_ms >= since_ms`, publish order.
    pub fn get_since(&self, since_ms: u64) -> Vec<Event> {
        let now_ms = self.clock.epoch_ms();
        let inner = self.inner.read();
        inner
            .seq
            .iter()
            .filter(|id| inner.is_live(id, now_ms))
            .filter_map(|id| inner.by_id.get(id))
            .filter(|e| e.timestamp_ms >= since_ms)
            .cloned()
            .collect()
    }

    /// The newest non-archived event for a path, if any.
    pub fn get_latest_by_file(&self, path: &str) -> Option<Event> {
        let inner = self.inner.read();
        let ids = inner.by_file.get(path)?;
        ids.iter()
            .rev()
            .filter_map(|id| inner.by_id.get(id))
            .find(|e| !e.is_archived())
            .cloned()
    }

    /// Count of live (non-archived, non-expired) entries.
    pub fn size(&self) -> usize {
        let now_ms = self.clock.epoch_ms();
        self.inner.read().live_count(now_ms)
    }

    /// Count of every entry still held, archived and expired included.
    pub fn total_size(&self) -> usize {
        self.inner.read().by_id.len()
    }

    /// Drop archived and expired entries from the sequence and all
    /// indices. Returns how many were dropped.
    pub fn compact(&self) -> usize {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.write();
        let stale: Vec<EventId> = inner
            .by_id
            .values()
            .filter(|e| e.is_archived() || e.is_expired(now_ms))
            .map(|e| e.id)
            .collect();
        let dropped = stale.len();
        for id in stale {
            inner.purge(id);
        }
        if dropped > 0 {
            tracing::debug!(dropped, remaining = inner.by_id.len(), "event log compacted");
        }
        dropped
    }
}

#[cfg(test)]
#[path = "event_log_tests.rs"]
mod tests;
