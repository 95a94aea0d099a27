// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interest-based event routing.
//!
//! `publish` appends to the log, fans out to local subscribers whose
//! interests match, and hands the frame to the mesh broadcaster.
//! Subscriber channels are bounded and sends never block: a slow
//! subscriber loses events rather than stalling a publish.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use hive_adapters::Broadcaster;
use hive_core::{
    AgentId, Clock, CoordError, Event, EventFilter, EventId, EventLog, Interest, InterestChange,
    InterestId, InterestManager, MatchKind, SystemClock,
};
use hive_wire::PeerMessage;

/// Bounded per-subscriber channel capacity.
const SUBSCRIBER_CAPACITY: usize = 256;

/// Routes published events to subscribers and the mesh.
pub struct EventRouter<C: Clock = SystemClock> {
    log: Arc<EventLog<C>>,
    interests: Arc<InterestManager<C>>,
    subscribers: RwLock<HashMap<AgentId, mpsc::Sender<Event>>>,
    broadcaster: RwLock<Option<Arc<dyn Broadcaster>>>,
}

impl<C: Clock> EventRouter<C> {
    pub fn new(log: Arc<EventLog<C>>, interests: Arc<InterestManager<C>>) -> Self {
        Self {
            log,
            interests,
            subscribers: RwLock::new(HashMap::new()),
            broadcaster: RwLock::new(None),
        }
    }

    /// Wire the mesh hook. Broadcast failures are logged, never surfaced.
    pub fn set_broadcaster(&self, broadcaster: Arc<dyn Broadcaster>) {
        *self.broadcaster.write() = Some(broadcaster);
    }

    pub fn log(&self) -> &Arc<EventLog<C>> {
        &self.log
    }

    pub fn interests(&self) -> &Arc<InterestManager<C>> {
        &self.interests
    }

    /// Publish an event: log it, deliver locally, broadcast to the mesh.
    pub fn publish(&self, event: Event) -> EventId {
        self.publish_inner(event, true)
    }

    /// Publish without the mesh broadcast (for events that arrived from
    /// the mesh, and for purely local traffic).
    pub fn publish_local(&self, event: Event) -> EventId {
        self.publish_inner(event, false)
    }

    /// Parse a raw event frame from a peer and publish it locally.
    pub fn handle_remote_event(&self, bytes: &[u8]) -> Result<EventId, CoordError> {
        let event: Event = serde_json::from_slice(bytes).map_err(|e| {
            CoordError::validation("bad_event_frame", format!("unparseable event frame: {e}"))
        })?;
        Ok(self.publish_local(event))
    }

    /// Open a bounded event channel for an agent. An existing channel for
    /// the same agent is replaced (and thereby closed).
    pub fn subscribe(&self, agent_id: AgentId) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let previous = self.subscribers.write().insert(agent_id.clone(), tx);
        if previous.is_some() {
            tracing::debug!(agent = %agent_id, "subscriber channel replaced");
        }
        rx
    }

    /// Close an agent's event channel.
    pub fn unsubscribe(&self, agent_id: &AgentId) {
        self.subscribers.write().remove(agent_id);
    }

    /// Register an interest and announce the change to the mesh.
    pub fn register_interest(&self, interest: Interest) -> Result<Interest, CoordError> {
        let change = self.interests.register(interest)?;
        self.broadcast(&PeerMessage::InterestChange { change: change.clone() });
        Ok(change.interest)
    }

    /// Remove an interest and announce the change to the mesh.
    pub fn remove_interest(&self, id: &InterestId) -> Option<Interest> {
        let change = self.interests.remove(id)?;
        self.broadcast(&PeerMessage::InterestChange { change: change.clone() });
        Some(change.interest)
    }

    /// Apply a peer's interest-registry change to the local mirror.
    pub fn handle_remote_interest_change(&self, change: InterestChange) {
        match change.change {
            hive_core::ChangeKind::Added | hive_core::ChangeKind::Updated => {
                let mut interest = change.interest;
                interest.remote = true;
                if let Err(err) = self.interests.register(interest) {
                    tracing::warn!(%err, "remote interest rejected");
                }
            }
            hive_core::ChangeKind::Removed => {
                self.interests.remove(&change.interest.id);
            }
        }
    }

    /// Events visible to `agent_id` under `filter`, newest first, capped
    /// at `filter.limit`.
    ///
    /// Without `include_all`, an agent sees an event only if it has at
    /// least one interest, and the event either has no file path (system
    /// events go to everyone) or matches one of the agent's interests at
    /// a level that admits the event's kind.
    pub fn get_events(&self, agent_id: &AgentId, filter: &EventFilter) -> Vec<Event> {
        let candidates: Vec<Event> = self
            .log
            .get_recent(usize::MAX)
            .into_iter()
            .filter(|e| filter.accepts(e))
            .collect();

        let visible: Vec<Event> = if filter.include_all {
            candidates
        } else {
            let own: Vec<Interest> = self.interests.list_for_agent(agent_id);
            if own.is_empty() {
                return Vec::new();
            }
            candidates
                .into_iter()
                .filter(|event| match &event.file_path {
                    None => own.iter().any(|i| i.accepts(event.kind, MatchKind::Direct)),
                    Some(path) => self
                        .interests
                        .match_path(path)
                        .into_iter()
                        .filter(|m| &m.interest.agent_id == agent_id)
                        .any(|m| m.interest.accepts(event.kind, m.kind)),
                })
                .collect()
        };

        match filter.limit {
            Some(limit) => visible.into_iter().take(limit).collect(),
            None => visible,
        }
    }

    fn publish_inner(&self, event: Event, broadcast: bool) -> EventId {
        let id = self.log.append(event.clone());
        tracing::debug!("{}", event.log_summary());

        match &event.file_path {
            Some(path) => {
                for m in self.interests.match_path(path) {
                    if m.interest.remote {
                        continue;
                    }
                    if !m.interest.accepts(event.kind, m.kind) {
                        continue;
                    }
                    self.deliver(&m.interest.agent_id, &event);
                }
            }
            None => {
                // System events reach every local subscriber whose level
                // admits the kind.
                let recipients: Vec<AgentId> =
                    self.subscribers.read().keys().cloned().collect();
                for agent_id in recipients {
                    let admits = self
                        .interests
                        .list_for_agent(&agent_id)
                        .iter()
                        .any(|i| i.accepts(event.kind, MatchKind::Direct));
                    if admits {
                        self.deliver(&agent_id, &event);
                    }
                }
            }
        }

        if broadcast {
            self.broadcast(&PeerMessage::Event { event });
        }
        id
    }

    fn deliver(&self, agent_id: &AgentId, event: &Event) {
        let subscribers = self.subscribers.read();
        let Some(tx) = subscribers.get(agent_id) else {
            return;
        };
        match tx.try_send(event.clone()) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(agent = %agent_id, event = %event.id, "subscriber full, event lost");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(agent = %agent_id, "subscriber gone");
            }
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
#[path = "router_tests.rs"]
mod tests;
