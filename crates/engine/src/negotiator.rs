// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The three-phase lock protocol and conflict negotiation.
//!
//! Phase 1 announces an intent (admission-controlled, conflict-checked),
//! phase 2 acquires after a re-check, phase 3 releases with a holder
//! check. A conflict at phase 1 opens a [`NegotiationSession`] settled by
//! proposal or vote.
//!
//! Locking discipline: the negotiator never touches the [`LockStore`]
//! while holding its own session lock. Resolutions are committed to the
//! session first (that is the exactly-once gate), then the store is
//! brought in line; callbacks fire after every lock is released.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use hive_adapters::Broadcaster;
use hive_core::{
    fence_order, AgentId, Clock, CoordError, FencingTokenSource, LockConflict, LockId, LockIntent,
    LockStore, NegotiationSession, NodeId, Proposal, RateLimiter, Resolution, ResolutionKind,
    SemanticLock, SemanticTarget, SessionId, SessionState, SystemClock, Vote,
};
use hive_wire::PeerMessage;

/// Protocol tuning.
#[derive(Debug, Clone)]
pub struct NegotiatorConfig {
    /// How long an announced intent stays acquirable.
    pub intent_timeout_ms: u64,
    /// How long a session may stay unresolved before escalating.
    pub negotiation_timeout_ms: u64,
    /// How long resolved sessions are kept for inspection.
    pub resolved_retention_ms: u64,
    /// Lease length for freshly acquired locks, also the renewal extension.
    pub lock_ttl_ms: u64,
    pub max_renewals: u32,
    /// Votes needed before a session tallies.
    pub required_votes: usize,
}

impl Default for NegotiatorConfig {
    fn default() -> Self {
        Self {
            intent_timeout_ms: 5_000,
            negotiation_timeout_ms: 30_000,
            resolved_retention_ms: 60 * 60 * 1000,
            lock_ttl_ms: hive_core::lock::DEFAULT_LOCK_TTL_MS,
            max_renewals: hive_core::lock::DEFAULT_MAX_RENEWALS,
            required_votes: 1,
        }
    }
}

type ConflictCallback = Box<dyn Fn(&LockConflict) + Send + Sync>;
type EscalateCallback = Box<dyn Fn(&NegotiationSession) + Send + Sync>;

/// Runs the lock protocol for one daemon.
pub struct LockNegotiator<C: Clock = SystemClock> {
    node_id: NodeId,
    config: NegotiatorConfig,
    clock: C,
    store: Arc<LockStore<C>>,
    limiter: Arc<RateLimiter<C>>,
    fence: Arc<FencingTokenSource>,
    intents: RwLock<HashMap<LockId, LockIntent>>,
    sessions: RwLock<HashMap<SessionId, NegotiationSession>>,
    on_conflict: RwLock<Option<ConflictCallback>>,
    on_escalate: RwLock<Option<EscalateCallback>>,
    broadcaster: RwLock<Option<Arc<dyn Broadcaster>>>,
}

impl<C: Clock> LockNegotiator<C> {
    pub fn new(
        node_id: NodeId,
        config: NegotiatorConfig,
        clock: C,
        store: Arc<LockStore<C>>,
        limiter: Arc<RateLimiter<C>>,
    ) -> Self {
        Self {
            node_id,
            config,
            clock,
            store,
            limiter,
            fence: Arc::new(FencingTokenSource::new()),
            intents: RwLock::new(HashMap::new()),
            sessions: RwLock::new(HashMap::new()),
            on_conflict: RwLock::new(None),
            on_escalate: RwLock::new(None),
            broadcaster: RwLock::new(None),
        }
    }

    /// Set once after construction; the negotiator tolerates none.
    pub fn set_on_conflict(&self, cb: ConflictCallback) {
        *self.on_conflict.write() = Some(cb);
    }

    /// Set once after construction; the negotiator tolerates none.
    pub fn set_on_escalate(&self, cb: EscalateCallback) {
        *self.on_escalate.write() = Some(cb);
    }

    /// Wire the mesh hook. Broadcast failures are logged, never surfaced.
    pub fn set_broadcaster(&self, broadcaster: Arc<dyn Broadcaster>) {
        *self.broadcaster.write() = Some(broadcaster);
    }

    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    pub fn store(&self) -> &Arc<LockStore<C>> {
        &self.store
    }

    /// Phase 1: announce an intent to lock `target`.
    ///
    /// On conflict, fires the conflict callback per overlapping lock,
    /// opens a session against the first, and fails retryable with the
    /// session id in the message.
    pub fn announce_intent(
        &self,
        target: SemanticTarget,
        holder_id: AgentId,
        holder_name: Option<String>,
        intention: String,
    ) -> Result<LockIntent, CoordError> {
        target.validate()?;
        if holder_id.is_empty() {
            return Err(CoordError::validation("empty_holder", "lock holder id is empty"));
        }
        if !self.limiter.allow(holder_id.as_str()) {
            return Err(CoordError::retryable("rate_limited", "rate limited")
                .with_file_path(&target.file_path));
        }

        let now_ms = self.clock.epoch_ms();
        let requested = self.mint_lock(target.clone(), holder_id, holder_name, intention, now_ms);

        let conflicts = self.store.find_conflicts(&target);
        if let Some(first) = conflicts.first() {
            let session = NegotiationSession::new(
                requested.clone(),
                first.clone(),
                self.config.required_votes,
                now_ms,
                self.config.negotiation_timeout_ms,
            );
            let session_id = session.id;
            self.sessions.write().insert(session_id, session);

            for conflicting in &conflicts {
                let conflict = LockConflict {
                    requested: requested.clone(),
                    conflicting: conflicting.clone(),
                    detected_at_ms: now_ms,
                };
                self.fire_conflict(&conflict);
            }
            tracing::info!(
                session = %session_id,
                holder = %requested.holder_id,
                against = %first.holder_id,
                path = %target.file_path,
                "lock conflict, negotiation opened"
            );
            return Err(CoordError::retryable(
                "lock_conflict",
                format!("conflict with {}, negotiation session {}", first.holder_id, session_id),
            )
            .with_lock_id(first.id)
            .with_file_path(&target.file_path));
        }

        let intent = LockIntent {
            lock: requested,
            announced_at_ms: now_ms,
            expires_at_ms: now_ms + self.config.intent_timeout_ms,
            acknowledged: Default::default(),
        };
        self.intents.write().insert(intent.id(), intent.clone());
        self.broadcast(&PeerMessage::Intent {
            lock: intent.lock.clone(),
            announced_at_ms: intent.announced_at_ms,
            expires_at_ms: intent.expires_at_ms,
        });
        Ok(intent)
    }

    /// Phase 2: convert an announced intent into a held lock.
    pub fn acquire(&self, intent_id: &LockId) -> Result<SemanticLock, CoordError> {
        let now_ms = self.clock.epoch_ms();
        let Some(intent) = self.intents.read().get(intent_id).cloned() else {
            return Err(CoordError::permanent("intent_not_found", "intent not found")
                .with_lock_id(*intent_id));
        };
        if intent.is_expired(now_ms) {
            self.intents.write().remove(intent_id);
            return Err(CoordError::retryable("intent_expired", "intent expired")
                .with_lock_id(*intent_id));
        }
        // Another acquire may have landed since phase 1.
        let conflicts = self.store.find_conflicts(&intent.lock.target);
        if let Some(first) = conflicts.first() {
            self.intents.write().remove(intent_id);
            return Err(CoordError::retryable(
                "lock_conflict",
                format!("target was locked by {} since the intent", first.holder_id),
            )
            .with_lock_id(first.id)
            .with_file_path(&intent.lock.target.file_path));
        }
        self.store.add(intent.lock.clone())?;
        self.intents.write().remove(intent_id);
        self.broadcast(&PeerMessage::Acquired { lock: intent.lock.clone() });
        tracing::info!(lock = %intent.lock.id, holder = %intent.lock.holder_id, "lock acquired");
        Ok(intent.lock)
    }

    /// Phase 3: release a held lock.
    pub fn release(&self, lock_id: &LockId, holder_id: &AgentId) -> Result<SemanticLock, CoordError> {
        let Some(lock) = self.store.get(lock_id) else {
            return Err(CoordError::permanent("lock_not_found", "lock not found")
                .with_lock_id(*lock_id));
        };
        if &lock.holder_id != holder_id {
            return Err(CoordError::permanent("not_holder", "not lock holder")
                .with_lock_id(*lock_id)
                .with_file_path(&lock.target.file_path));
        }
        self.store.remove(lock_id);
        self.broadcast(&PeerMessage::Released { lock_id: *lock_id });
        tracing::info!(lock = %lock_id, holder = %holder_id, "lock released");
        Ok(lock)
    }

    /// Extend a held lock's lease. Fails permanent once the renewal
    /// budget is spent; that failure has no side effects.
    pub fn renew(&self, lock_id: &LockId, holder_id: &AgentId) -> Result<SemanticLock, CoordError> {
        let now_ms = self.clock.epoch_ms();
        let ttl_ms = self.config.lock_ttl_ms;
        let outcome = self.store.update(lock_id, |lock| {
            if &lock.holder_id != holder_id {
                return Err(CoordError::permanent("not_holder", "not lock holder")
                    .with_lock_id(lock.id));
            }
            lock.renew(now_ms, ttl_ms)
        });
        match outcome {
            None => Err(CoordError::permanent("lock_not_found", "lock not found")
                .with_lock_id(*lock_id)),
            Some((_, Err(err))) => Err(err),
            Some((lock, Ok(()))) => {
                self.broadcast(&PeerMessage::Acquired { lock: lock.clone() });
                Ok(lock)
            }
        }
    }

    /// Offer a proposal on an open session.
    ///
    /// Yield, split, and priority resolve the session as negotiated and
    /// reshape the store accordingly. Escalate resolves as human-needed
    /// and fails permanent.
    pub fn negotiate(
        &self,
        session_id: &SessionId,
        proposal: Proposal,
    ) -> Result<Resolution, CoordError> {
        let now_ms = self.clock.epoch_ms();
        let session = {
            let sessions = self.sessions.read();
            sessions.get(session_id).cloned()
        };
        let Some(session) = session else {
            return Err(CoordError::permanent("session_not_found", "negotiation session not found"));
        };
        if session.is_resolved() {
            return Err(CoordError::permanent("session_resolved", "session already resolved"));
        }
        if session.is_expired(now_ms) {
            self.timeout_session(session_id, now_ms);
            return Err(CoordError::permanent("session_expired", "negotiation session expired"));
        }

        match proposal {
            Proposal::Escalate { reason } => {
                let (snapshot, _) = self.commit_resolution(
                    session_id,
                    SessionState::Escalated,
                    ResolutionKind::HumanNeeded,
                    None,
                    reason,
                    now_ms,
                )?;
                self.fire_escalate(&snapshot);
                Err(CoordError::permanent("human_required", "human intervention required"))
            }

            Proposal::Yield { yielder } => {
                let (winner, loser_held) = if yielder == session.conflicting.holder_id {
                    (session.requested.clone(), true)
                } else if yielder == session.requested.holder_id {
                    (session.conflicting.clone(), false)
                } else {
                    return Err(CoordError::validation(
                        "unknown_yielder",
                        format!("{yielder} holds neither side of the conflict"),
                    ));
                };
                let state = if loser_held { SessionState::Acquired } else { SessionState::Rejected };
                let (_, resolution) = self.commit_resolution(
                    session_id,
                    state,
                    ResolutionKind::Negotiated,
                    Some(winner.id),
                    format!("{yielder} yielded"),
                    now_ms,
                )?;

                if loser_held {
                    // The held lock steps aside for the requested one.
                    self.store.remove(&session.conflicting.id);
                    self.insert_resolved(session.requested.clone());
                    self.broadcast(&PeerMessage::Released { lock_id: session.conflicting.id });
                    self.broadcast(&PeerMessage::Acquired { lock: session.requested.clone() });
                }
                Ok(resolution)
            }

            Proposal::Split { split_point } => {
                let Some((req_start, req_end)) = session.requested.target.line_span() else {
                    return Err(CoordError::validation(
                        "split_unbounded",
                        "cannot split a file-wide lock",
                    ));
                };
                let Some((conf_start, _)) = session.conflicting.target.line_span() else {
                    return Err(CoordError::validation(
                        "split_unbounded",
                        "cannot split against a file-wide lock",
                    ));
                };
                // Boundary splits are rejected: each side must keep at
                // least one line.
                if split_point <= req_start || split_point >= req_end || split_point <= conf_start {
                    return Err(CoordError::validation(
                        "split_out_of_range",
                        format!("split point {split_point} must fall strictly inside {req_start}-{req_end}"),
                    ));
                }

                let mut kept = session.conflicting.clone();
                kept.target.end_line = Some(split_point - 1);
                let mut granted = session.requested.clone();
                granted.target.start_line = Some(split_point);

                let (_, resolution) = self.commit_resolution(
                    session_id,
                    SessionState::Acquired,
                    ResolutionKind::Negotiated,
                    Some(granted.id),
                    format!("split at line {split_point}"),
                    now_ms,
                )?;

                self.store.remove(&session.conflicting.id);
                self.insert_resolved(kept.clone());
                self.insert_resolved(granted.clone());
                self.broadcast(&PeerMessage::Acquired { lock: kept });
                self.broadcast(&PeerMessage::Acquired { lock: granted });
                Ok(resolution)
            }

            Proposal::Priority => {
                let requested_wins = fence_order(
                    (session.requested.fencing_token, &session.requested.node_id),
                    (session.conflicting.fencing_token, &session.conflicting.node_id),
                ) == std::cmp::Ordering::Greater;
                let (winner, loser) = if requested_wins {
                    (session.requested.clone(), session.conflicting.clone())
                } else {
                    (session.conflicting.clone(), session.requested.clone())
                };
                let state = if requested_wins { SessionState::Acquired } else { SessionState::Rejected };
                let (_, resolution) = self.commit_resolution(
                    session_id,
                    state,
                    ResolutionKind::Negotiated,
                    Some(winner.id),
                    format!(
                        "priority: token {} beats {}",
                        winner.fencing_token, loser.fencing_token
                    ),
                    now_ms,
                )?;

                if self.store.get(&loser.id).is_some() {
                    self.store.remove(&loser.id);
                    self.broadcast(&PeerMessage::Released { lock_id: loser.id });
                }
                if self.store.get(&winner.id).is_none() {
                    self.insert_resolved(winner.clone());
                    self.broadcast(&PeerMessage::Acquired { lock: winner });
                }
                Ok(resolution)
            }
        }
    }

    /// Feed a vote into a session; resolves once the quorum is reached.
    pub fn vote(&self, session_id: &SessionId, vote: Vote) -> Result<Option<Resolution>, CoordError> {
        let now_ms = self.clock.epoch_ms();
        let (tally, session) = {
            let mut sessions = self.sessions.write();
            let Some(session) = sessions.get_mut(session_id) else {
                return Err(CoordError::permanent(
                    "session_not_found",
                    "negotiation session not found",
                ));
            };
            if session.is_resolved() {
                return Err(CoordError::permanent("session_resolved", "session already resolved"));
            }
            if session.is_expired(now_ms) {
                drop(sessions);
                self.timeout_session(session_id, now_ms);
                return Err(CoordError::permanent("session_expired", "negotiation session expired"));
            }
            session.record_vote(vote);
            (session.tally(), session.clone())
        };

        let Some(approved) = tally else {
            return Ok(None);
        };
        let (state, kind, winner) = if approved {
            (SessionState::Acquired, ResolutionKind::Approved, Some(session.requested.id))
        } else {
            (SessionState::Rejected, ResolutionKind::Rejected, Some(session.conflicting.id))
        };
        let approvals = session.votes.values().filter(|v| v.approve).count();
        let (_, resolution) = self.commit_resolution(
            session_id,
            state,
            kind,
            winner,
            format!("{approvals} of {} votes in favor", session.votes.len()),
            now_ms,
        )?;

        if approved {
            // Majority in favor transfers the lock to the requester.
            self.store.remove(&session.conflicting.id);
            self.insert_resolved(session.requested.clone());
            self.broadcast(&PeerMessage::Released { lock_id: session.conflicting.id });
            self.broadcast(&PeerMessage::Acquired { lock: session.requested.clone() });
        }
        Ok(Some(resolution))
    }

    /// Expire stale intents, time out overdue sessions, and drop resolved
    /// sessions past retention. Returns (intents, timeouts, dropped).
    pub fn cleanup(&self) -> (usize, usize, usize) {
        let now_ms = self.clock.epoch_ms();

        let expired_intents = {
            let mut intents = self.intents.write();
            let before = intents.len();
            intents.retain(|_, intent| !intent.is_expired(now_ms));
            before - intents.len()
        };

        let overdue: Vec<SessionId> = {
            let sessions = self.sessions.read();
            sessions
                .values()
                .filter(|s| !s.is_resolved() && s.is_expired(now_ms))
                .map(|s| s.id)
                .collect()
        };
        let timed_out = overdue.len();
        for id in overdue {
            self.timeout_session(&id, now_ms);
        }

        let dropped = {
            let retention = self.config.resolved_retention_ms;
            let mut sessions = self.sessions.write();
            let before = sessions.len();
            sessions.retain(|_, s| match &s.resolution {
                Some(r) => r.resolved_at_ms + retention > now_ms,
                None => true,
            });
            before - sessions.len()
        };

        if expired_intents + timed_out + dropped > 0 {
            tracing::debug!(expired_intents, timed_out, dropped, "negotiator cleanup");
        }
        (expired_intents, timed_out, dropped)
    }

    /// Mirror a remote peer's intent so it expires alongside local ones.
    pub fn handle_remote_intent(&self, lock: SemanticLock, announced_at_ms: u64, expires_at_ms: u64) {
        let intent = LockIntent {
            lock,
            announced_at_ms,
            expires_at_ms,
            acknowledged: Default::default(),
        };
        tracing::debug!(lock = %intent.id(), "remote intent mirrored");
        self.intents.write().insert(intent.id(), intent);
    }

    /// Mirror a remote acquisition. A conflict here is surfaced through
    /// the conflict callback, not as an error: both sides already believe
    /// they hold the lock, and that needs negotiation, not a refusal.
    pub fn handle_remote_acquired(&self, lock: SemanticLock) {
        let conflicts = self.store.find_conflicts(&lock.target);
        if let Some(first) = conflicts.first() {
            let conflict = LockConflict {
                requested: lock.clone(),
                conflicting: first.clone(),
                detected_at_ms: self.clock.epoch_ms(),
            };
            tracing::warn!(
                incoming = %lock.id,
                existing = %first.id,
                path = %lock.target.file_path,
                "remote lock conflicts with local state"
            );
            self.fire_conflict(&conflict);
            return;
        }
        self.intents.write().remove(&lock.id);
        self.store.add_unchecked(lock);
    }

    /// Mirror a remote release.
    pub fn handle_remote_released(&self, lock_id: &LockId) {
        self.intents.write().remove(lock_id);
        if self.store.remove(lock_id).is_some() {
            tracing::debug!(lock = %lock_id, "remote release mirrored");
        }
    }

    /// Feed a remote vote into its session, if we own it.
    pub fn handle_remote_vote(&self, session_id: &SessionId, vote: Vote) {
        match self.vote(session_id, vote) {
            Ok(_) => {}
            Err(err) => tracing::debug!(session = %session_id, %err, "remote vote dropped"),
        }
    }

    /// Every active lock in the store.
    pub fn locks(&self) -> Vec<SemanticLock> {
        self.store.list_all()
    }

    pub fn session(&self, id: &SessionId) -> Option<NegotiationSession> {
        self.sessions.read().get(id).cloned()
    }

    /// Unresolved sessions, oldest first.
    pub fn open_sessions(&self) -> Vec<NegotiationSession> {
        let mut out: Vec<NegotiationSession> =
            self.sessions.read().values().filter(|s| !s.is_resolved()).cloned().collect();
        out.sort_by_key(|s| s.started_at_ms);
        out
    }

    pub fn intent(&self, id: &LockId) -> Option<LockIntent> {
        self.intents.read().get(id).cloned()
    }

    fn mint_lock(
        &self,
        target: SemanticTarget,
        holder_id: AgentId,
        holder_name: Option<String>,
        intention: String,
        now_ms: u64,
    ) -> SemanticLock {
        SemanticLock {
            id: LockId::new(),
            target,
            holder_name: holder_name.unwrap_or_else(|| "unknown".to_string()),
            holder_id,
            intention,
            fencing_token: self.fence.next(),
            node_id: self.node_id,
            acquired_at_ms: now_ms,
            expires_at_ms: now_ms + self.config.lock_ttl_ms,
            renew_count: 0,
            max_renewals: self.config.max_renewals,
        }
    }

    /// Insert a lock decided by a resolution. The range was freed by the
    /// resolution itself; a residual overlap means a third lock appeared
    /// mid-negotiation and is logged, not raised.
    fn insert_resolved(&self, lock: SemanticLock) {
        if let Err(err) = self.store.add(lock) {
            tracing::warn!(%err, "resolved lock could not be inserted");
        }
    }

    /// Write the resolution into the session map; this is the
    /// exactly-once gate for concurrent proposals.
    fn commit_resolution(
        &self,
        session_id: &SessionId,
        state: SessionState,
        kind: ResolutionKind,
        winner: Option<LockId>,
        detail: String,
        now_ms: u64,
    ) -> Result<(NegotiationSession, Resolution), CoordError> {
        let mut sessions = self.sessions.write();
        let Some(session) = sessions.get_mut(session_id) else {
            return Err(CoordError::permanent("session_not_found", "negotiation session not found"));
        };
        if !session.resolve(state, kind, winner, detail, now_ms) {
            return Err(CoordError::permanent("session_resolved", "session already resolved"));
        }
        let snapshot = session.clone();
        let resolution = snapshot.resolution.clone().unwrap_or_else(|| unreachable!("just resolved"));
        Ok((snapshot, resolution))
    }

    fn timeout_session(&self, session_id: &SessionId, now_ms: u64) {
        let snapshot = {
            let mut sessions = self.sessions.write();
            match sessions.get_mut(session_id) {
                Some(session) => {
                    if session.resolve(
                        SessionState::Escalated,
                        ResolutionKind::TimedOut,
                        None,
                        "negotiation timed out",
                        now_ms,
                    ) {
                        Some(session.clone())
                    } else {
                        None
                    }
                }
                None => None,
            }
        };
        if let Some(session) = snapshot {
            tracing::warn!(session = %session.id, "negotiation timed out, escalating");
            self.fire_escalate(&session);
        }
    }

    fn fire_conflict(&self, conflict: &LockConflict) {
        if let Some(cb) = self.on_conflict.read().as_ref() {
            cb(conflict);
        }
    }

    fn fire_escalate(&self, session: &NegotiationSession) {
        if let Some(cb) = self.on_escalate.read().as_ref() {
            cb(session);
        }
    }

    fn broadcast(&self, msg: &PeerMessage) {
        let broadcaster = self.broadcaster.read();
        let Some(broadcaster) = broadcaster.as_ref() else {
            return;
        };
        match hive_wire::encode(msg) {
            Ok(bytes) => {
                if let Err(err) = broadcaster.broadcast(&bytes) {
                    tracing::warn!(kind = msg.kind(), %err, "broadcast failed");
                }
            }
            Err(err) => tracing::warn!(kind = msg.kind(), %err, "broadcast encode failed"),
        }
    }
}

#[cfg(test)]
#[path = "negotiator_tests.rs"]
mod tests;
