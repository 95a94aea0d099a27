// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root: one `Coord` per daemon process.
//!
//! Owns the stores, the negotiator, the router, and the notification
//! fabric, and wires the cross-component callbacks: conflicts become
//! events and human notifications, escalations become pending questions
//! whose answers feed back as votes.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use hive_adapters::{Broadcaster, ContextDoc, ContextSink, NullContextSink};
use hive_core::{
    AgentId, CoordError, Event, EventKind, EventLog, EventLogConfig, EventPayload, InterestManager,
    LeaveStateMachine, LockStore, NodeId, Notification, NotificationAction, NotificationPriority,
    RateLimiter, RateLimiterConfig, SessionId, SystemClock,
};
use hive_engine::{
    LockNegotiator, NegotiatorConfig, NotificationManager, NotificationManagerConfig, EventRouter,
};

/// Everything a request handler needs, composed once at startup.
pub struct Coord {
    pub clock: SystemClock,
    pub node_id: NodeId,
    pub agent_name: String,
    pub project: RwLock<Option<String>>,
    pub peers: RwLock<HashSet<NodeId>>,
    pub store: Arc<LockStore<SystemClock>>,
    pub limiter: Arc<RateLimiter<SystemClock>>,
    pub log: Arc<EventLog<SystemClock>>,
    pub interests: Arc<InterestManager<SystemClock>>,
    pub negotiator: Arc<LockNegotiator<SystemClock>>,
    pub router: Arc<EventRouter<SystemClock>>,
    pub notifications: Arc<NotificationManager<SystemClock>>,
    pub leave: Arc<LeaveStateMachine<SystemClock>>,
    pub context_sink: Arc<dyn ContextSink>,
    pub broadcaster: RwLock<Option<Arc<dyn Broadcaster>>>,
    pub start_time: Instant,
}

impl Coord {
    /// Build the coordination engine with default tuning and wire the
    /// conflict/escalation/response callbacks.
    pub fn new(agent_name: String) -> Arc<Self> {
        let clock = SystemClock;
        let node_id = NodeId::new();
        let store = Arc::new(LockStore::with_clock(clock.clone()));
        let limiter =
            Arc::new(RateLimiter::with_clock(RateLimiterConfig::default(), clock.clone()));
        let log = Arc::new(EventLog::with_clock(EventLogConfig::default(), clock.clone()));
        let interests = Arc::new(InterestManager::with_clock(clock.clone()));
        let negotiator = Arc::new(LockNegotiator::new(
            node_id,
            NegotiatorConfig::default(),
            clock.clone(),
            Arc::clone(&store),
            Arc::clone(&limiter),
        ));
        let router = Arc::new(EventRouter::new(Arc::clone(&log), Arc::clone(&interests)));
        let notifications =
            Arc::new(NotificationManager::new(NotificationManagerConfig::default(), clock.clone()));
        let leave = Arc::new(LeaveStateMachine::with_clock(clock.clone()));

        let coord = Arc::new(Self {
            clock,
            node_id,
            agent_name,
            project: RwLock::new(None),
            peers: RwLock::new(HashSet::new()),
            store,
            limiter,
            log,
            interests,
            negotiator,
            router,
            notifications,
            leave,
            context_sink: Arc::new(NullContextSink),
            broadcaster: RwLock::new(None),
            start_time: Instant::now(),
        });
        coord.wire_callbacks();
        coord
    }

    /// Hand the mesh hook to every component that broadcasts.
    pub fn set_broadcaster(&self, broadcaster: Arc<dyn Broadcaster>) {
        self.negotiator.set_broadcaster(Arc::clone(&broadcaster));
        self.router.set_broadcaster(Arc::clone(&broadcaster));
        *self.broadcaster.write() = Some(broadcaster);
    }

    /// Share a context document: publish the event, hand the body to the
    /// document store.
    pub async fn share_context(
        &self,
        agent_id: AgentId,
        file_path: String,
        content: String,
        metadata: std::collections::HashMap<String, String>,
    ) -> Result<(), CoordError> {
        use hive_core::Clock;
        let event = Event::new(
            EventKind::ContextShared,
            agent_id,
            self.agent_name.clone(),
            EventPayload::ContextShared {
                summary: content.chars().take(120).collect(),
                content_len: content.len(),
                metadata: metadata.clone(),
            },
            self.clock.epoch_ms(),
        )
        .with_file(file_path.clone());
        self.router.publish(event);

        self.context_sink
            .store(ContextDoc { file_path, content, metadata })
            .await
            .map_err(|e| CoordError::network("context_store_failed", e.to_string()))
    }

    pub fn note_peer(&self, node_id: NodeId) {
        if node_id != self.node_id {
            self.peers.write().insert(node_id);
        }
    }

    pub fn forget_peer(&self, node_id: &NodeId) {
        self.peers.write().remove(node_id);
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    fn wire_callbacks(self: &Arc<Self>) {
        // Conflicts: record an event and tell humans, without blocking the
        // negotiator.
        let on_conflict = Arc::downgrade(self);
        self.negotiator.set_on_conflict(Box::new(move |conflict| {
            let Some(coord) = on_conflict.upgrade() else {
                return;
            };
            use hive_core::Clock;
            let event = Event::new(
                EventKind::LockConflict,
                conflict.requested.holder_id.clone(),
                conflict.requested.holder_name.clone(),
                EventPayload::LockConflict { conflict: conflict.clone() },
                coord.clock.epoch_ms(),
            )
            .with_file(conflict.file_path());
            coord.router.publish_local(event);

            let notification = Notification::info(
                "lock",
                "Lock conflict",
                format!(
                    "{} and {} both want {}",
                    conflict.requested.holder_name,
                    conflict.conflicting.holder_name,
                    conflict.file_path(),
                ),
            )
            .with_priority(NotificationPriority::High)
            .with_detail("file", conflict.file_path());
            let notifications = Arc::clone(&coord.notifications);
            tokio::spawn(async move {
                let _ = notifications.notify(notification).await;
            });
        }));

        // Escalations: open a question whose answer becomes a human vote.
        let on_escalate = Arc::downgrade(self);
        self.negotiator.set_on_escalate(Box::new(move |session| {
            let Some(coord) = on_escalate.upgrade() else {
                return;
            };
            let detail = session
                .resolution
                .as_ref()
                .map(|r| r.detail.clone())
                .unwrap_or_default();
            let notification = Notification::info(
                "escalation",
                "Lock negotiation needs a decision",
                format!(
                    "{} requested {} held by {} ({detail})",
                    session.requested.holder_name,
                    session.requested.target,
                    session.conflicting.holder_name,
                ),
            )
            .with_priority(NotificationPriority::Critical)
            .with_detail("session_id", session.id.as_str())
            .with_actions(vec![
                NotificationAction {
                    id: "approve".into(),
                    label: "Give it to the requester".into(),
                    description: format!("transfers the range to {}", session.requested.holder_name),
                    is_default: false,
                    is_dangerous: true,
                },
                NotificationAction {
                    id: "reject".into(),
                    label: "Keep the current holder".into(),
                    description: String::new(),
                    is_default: true,
                    is_dangerous: false,
                },
            ]);
            let notifications = Arc::clone(&coord.notifications);
            tokio::spawn(async move {
                let _ = notifications.notify(notification).await;
            });
        }));

        // A human approval on an escalated session releases the held
        // lock so the requester's retry can land. Runs off the
        // notification manager's stack.
        let on_response = Arc::downgrade(self);
        self.notifications.set_on_response(Box::new(move |notification, response| {
            let Some(coord) = on_response.upgrade() else {
                return;
            };
            let Some(session_id) = notification.details.get("session_id") else {
                return;
            };
            if response.action_id != "approve" {
                return;
            }
            let session_id = SessionId::from_string(session_id);
            tokio::spawn(async move {
                let Some(session) = coord.negotiator.session(&session_id) else {
                    return;
                };
                match coord
                    .negotiator
                    .release(&session.conflicting.id, &session.conflicting.holder_id)
                {
                    Ok(_) => tracing::info!(
                        session = %session_id,
                        lock = %session.conflicting.id,
                        "held lock released by human decision"
                    ),
                    Err(err) => tracing::warn!(
                        session = %session_id, %err,
                        "human-approved release failed"
                    ),
                }
            });
        }));
    }
}

#[cfg(test)]
#[path = "coord_tests.rs"]
mod tests;
