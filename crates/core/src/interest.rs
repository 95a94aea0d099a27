// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent interests: glob-pattern subscriptions with delivery levels.
//!
//! An interest declares which file paths an agent wants to hear about and
//! how much it wants to hear. Matching distinguishes direct pattern hits,
//! dependency hits (a path some interesting file depends on), and
//! proximity hits (same directory as something previously matched), each
//! with a fixed relevance score.

use std::collections::{HashMap, HashSet};

use glob::Pattern;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, NodeId};
use crate::clock::{Clock, SystemClock};
use crate::define_id;
use crate::error::CoordError;
use crate::event::EventKind;

define_id! {
    /// Identifier for a registered interest.
    pub struct InterestId("int-");
}

/// Default interest time-to-live: 1 hour.
pub const DEFAULT_INTEREST_TTL_MS: u64 = 60 * 60 * 1000;

/// How much event traffic an interest wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestLevel {
    /// Every event kind, any match strength.
    All,
    /// Only direct and dependency matches.
    Direct,
    /// Only lock traffic (acquired/released/conflict).
    LocksOnly,
    /// Search-only: registered but never delivered to.
    None,
}

/// How a path matched an interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchKind {
    Direct,
    Dependency,
    Proximity,
}

impl MatchKind {
    pub fn relevance(&self) -> f64 {
        match self {
            MatchKind::Direct => 1.0,
            MatchKind::Dependency => 0.8,
            MatchKind::Proximity => 0.5,
        }
    }
}

/// An agent's declared area of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    pub id: InterestId,
    pub agent_id: AgentId,
    pub agent_name: String,
    /// Glob patterns over forward-slash paths; `*` within a segment,
    /// `**` across segments.
    pub patterns: Vec<String>,
    #[serde(default)]
    pub track_dependencies: bool,
    pub level: InterestLevel,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    /// True when this interest was mirrored from another daemon.
    #[serde(default)]
    pub remote: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
}

impl Interest {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// True if any pattern matches the path. `*` stays within one path
    /// segment; `**` crosses segments.
    pub fn matches_pattern(&self, path: &str) -> bool {
        let opts = glob::MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        self.patterns.iter().any(|p| {
            Pattern::new(p).map(|pat| pat.matches_with(path, opts)).unwrap_or(false)
        })
    }

    /// Level gate: should an event of `kind`, matched with `match_kind`,
    /// be delivered to this interest?
    pub fn accepts(&self, kind: EventKind, match_kind: MatchKind) -> bool {
        match self.level {
            InterestLevel::None => false,
            InterestLevel::LocksOnly => kind.is_lock_related(),
            InterestLevel::Direct => {
                matches!(match_kind, MatchKind::Direct | MatchKind::Dependency)
            }
            InterestLevel::All => true,
        }
    }
}

/// Why an interest registry changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Added,
    Removed,
    /// Declared for forward compatibility; `register` always emits `Added`.
    Updated,
}

/// A registry change to propagate across the mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestChange {
    pub change: ChangeKind,
    pub interest: Interest,
}

/// A single interest's match against a concrete path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestMatch {
    pub interest: Interest,
    pub kind: MatchKind,
    pub matched_path: String,
    pub relevance: f64,
}

#[derive(Default)]
struct InterestInner {
    by_id: HashMap<InterestId, Interest>,
    by_agent: HashMap<AgentId, HashSet<InterestId>>,
    /// file -> paths it depends on.
    depends_on: HashMap<String, HashSet<String>>,
    /// Directories of previously direct-matched paths, per interest.
    seen_dirs: HashMap<InterestId, HashSet<String>>,
}

impl InterestInner {
    fn remove(&mut self, id: &InterestId) -> Option<Interest> {
        let interest = self.by_id.remove(id)?;
        if let Some(ids) = self.by_agent.get_mut(&interest.agent_id) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_agent.remove(&interest.agent_id);
            }
        }
        self.seen_dirs.remove(id);
        Some(interest)
    }

    fn drop_expired(&mut self, now_ms: u64) {
        let expired: Vec<InterestId> = self
            .by_id
            .values()
            .filter(|i| i.is_expired(now_ms))
            .map(|i| i.id)
            .collect();
        for id in expired {
            self.remove(&id);
        }
    }
}

fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

/// Registry of interests with glob matching and TTL expiry.
pub struct InterestManager<C: Clock = SystemClock> {
    clock: C,
    default_ttl_ms: u64,
    inner: RwLock<InterestInner>,
}

impl InterestManager<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl Default for InterestManager<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> InterestManager<C> {
    pub fn with_clock(clock: C) -> Self {
        Self { clock, default_ttl_ms: DEFAULT_INTEREST_TTL_MS, inner: RwLock::new(InterestInner::default()) }
    }

    /// Register an interest, filling in id and timestamps when unset.
    /// Returns the `added` change signal for mesh propagation.
    pub fn register(&self, mut interest: Interest) -> Result<InterestChange, CoordError> {
        if interest.patterns.is_empty() {
            return Err(CoordError::validation("empty_patterns", "interest has no patterns"));
        }
        for p in &interest.patterns {
            if Pattern::new(p).is_err() {
                return Err(CoordError::validation(
                    "bad_pattern",
                    format!("invalid glob pattern: {p}"),
                ));
            }
        }
        let now_ms = self.clock.epoch_ms();
        if interest.id.is_empty() {
            interest.id = InterestId::new();
        }
        if interest.created_at_ms == 0 {
            interest.created_at_ms = now_ms;
        }
        if interest.expires_at_ms == 0 {
            interest.expires_at_ms = now_ms + self.default_ttl_ms;
        }
        let mut inner = self.inner.write();
        inner.drop_expired(now_ms);
        inner.by_agent.entry(interest.agent_id.clone()).or_default().insert(interest.id);
        inner.by_id.insert(interest.id, interest.clone());
        tracing::debug!(id = %interest.id, agent = %interest.agent_id, "interest registered");
        Ok(InterestChange { change: ChangeKind::Added, interest })
    }

    /// Remove one interest; returns the `removed` signal if it existed.
    pub fn remove(&self, id: &InterestId) -> Option<InterestChange> {
        let interest = self.inner.write().remove(id)?;
        Some(InterestChange { change: ChangeKind::Removed, interest })
    }

    /// Remove every interest owned by an agent.
    pub fn remove_by_agent(&self, agent: &AgentId) -> Vec<InterestChange> {
        let mut inner = self.inner.write();
        let ids: Vec<InterestId> =
            inner.by_agent.get(agent).map(|s| s.iter().copied().collect()).unwrap_or_default();
        ids.iter()
            .filter_map(|id| inner.remove(id))
            .map(|interest| InterestChange { change: ChangeKind::Removed, interest })
            .collect()
    }

    /// Reset an interest's expiry to now + default TTL.
    pub fn renew(&self, id: &InterestId) -> Result<Interest, CoordError> {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.write();
        let interest = inner.by_id.get_mut(id).ok_or_else(|| {
            CoordError::permanent("interest_not_found", "interest not found")
        })?;
        interest.expires_at_ms = now_ms + self.default_ttl_ms;
        Ok(interest.clone())
    }

    /// Record that `file` depends on `dep`. Used for dependency-level
    /// matching when an interest tracks dependencies.
    pub fn record_dependency(&self, file: impl Into<String>, dep: impl Into<String>) {
        self.inner.write().depends_on.entry(file.into()).or_default().insert(dep.into());
    }

    /// All live interests.
    pub fn list(&self) -> Vec<Interest> {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.write();
        inner.drop_expired(now_ms);
        let mut out: Vec<Interest> = inner.by_id.values().cloned().collect();
        out.sort_by_key(|i| i.created_at_ms);
        out
    }

    /// Live interests owned by one agent.
    pub fn list_for_agent(&self, agent: &AgentId) -> Vec<Interest> {
        self.list().into_iter().filter(|i| &i.agent_id == agent).collect()
    }

    /// True if the agent has at least one live interest.
    pub fn agent_has_interests(&self, agent: &AgentId) -> bool {
        !self.list_for_agent(agent).is_empty()
    }

    /// Match a path against every live interest, one [`InterestMatch`]
    /// per interest, strongest kind preferred.
    pub fn match_path(&self, path: &str) -> Vec<InterestMatch> {
        let now_ms = self.clock.epoch_ms();
        let mut inner = self.inner.write();
        inner.drop_expired(now_ms);

        // Paths whose dependencies include `path`, for dependency matches.
        let dependents: Vec<String> = inner
            .depends_on
            .iter()
            .filter(|(_, deps)| deps.contains(path))
            .map(|(file, _)| file.clone())
            .collect();

        let mut matches = Vec::new();
        let ids: Vec<InterestId> = inner.by_id.keys().copied().collect();
        for id in ids {
            let Some(interest) = inner.by_id.get(&id) else {
                continue;
            };
            let kind = if interest.matches_pattern(path) {
                Some(MatchKind::Direct)
            } else if interest.track_dependencies
                && dependents.iter().any(|file| interest.matches_pattern(file))
            {
                Some(MatchKind::Dependency)
            } else if interest.track_dependencies
                && inner
                    .seen_dirs
                    .get(&id)
                    .map(|dirs| dirs.contains(parent_dir(path)))
                    .unwrap_or(false)
            {
                Some(MatchKind::Proximity)
            } else {
                None
            };

            if let Some(kind) = kind {
                let interest = interest.clone();
                if kind == MatchKind::Direct {
                    inner
                        .seen_dirs
                        .entry(id)
                        .or_default()
                        .insert(parent_dir(path).to_string());
                }
                matches.push(InterestMatch {
                    kind,
                    matched_path: path.to_string(),
                    relevance: kind.relevance(),
                    interest,
                });
            }
        }
        matches
    }
}

#[cfg(test)]
#[path = "interest_tests.rs"]
mod tests;
