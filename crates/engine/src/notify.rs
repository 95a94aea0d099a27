// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending-response registry and notifier fan-out.
//!
//! `notify` registers a question (or drops an informational message into
//! history) and fans it out to every registered transport, best effort.
//! `respond` validates the chosen action, records the answer, and invokes
//! the response handler after releasing the registry lock.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use hive_adapters::Notifier;
use hive_core::notification::DEFAULT_NOTIFICATION_TTL_MS;
use hive_core::{
    Clock, CoordError, Notification, NotificationId, NotificationResponse, SystemClock,
};

/// Registry tuning.
#[derive(Debug, Clone)]
pub struct NotificationManagerConfig {
    /// Applied when a notification arrives without its own deadline.
    pub default_ttl_ms: u64,
    /// FIFO cap on the delivery history.
    pub history_cap: usize,
}

impl Default for NotificationManagerConfig {
    fn default() -> Self {
        Self { default_ttl_ms: DEFAULT_NOTIFICATION_TTL_MS, history_cap: 100 }
    }
}

type ResponseHandler = Box<dyn Fn(&Notification, &NotificationResponse) + Send + Sync>;

/// Owns pending notifications and the notifier set.
pub struct NotificationManager<C: Clock = SystemClock> {
    config: NotificationManagerConfig,
    clock: C,
    notifiers: RwLock<Vec<Arc<dyn Notifier>>>,
    pending: RwLock<HashMap<NotificationId, Notification>>,
    history: RwLock<VecDeque<Notification>>,
    on_response: RwLock<Option<ResponseHandler>>,
}

impl<C: Clock> NotificationManager<C> {
    pub fn new(config: NotificationManagerConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            notifiers: RwLock::new(Vec::new()),
            pending: RwLock::new(HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            on_response: RwLock::new(None),
        }
    }

    pub fn add_notifier(&self, notifier: Arc<dyn Notifier>) {
        self.notifiers.write().push(notifier);
    }

    /// Set once after construction; the manager tolerates none.
    pub fn set_on_response(&self, handler: ResponseHandler) {
        *self.on_response.write() = Some(handler);
    }

    /// Register and fan out a notification.
    ///
    /// The notification is registered (pending iff it has actions) and
    /// appended to history before any delivery is attempted, so a dead
    /// transport cannot lose a question. Returns the id on full success
    /// and the last delivery error otherwise.
    pub async fn notify(&self, mut notification: Notification) -> Result<NotificationId, CoordError> {
        let now_ms = self.clock.epoch_ms();
        if notification.id.is_empty() {
            notification.id = NotificationId::new();
        }
        if notification.created_at_ms == 0 {
            notification.created_at_ms = now_ms;
        }
        if notification.expires_at_ms == 0 {
            notification.expires_at_ms = now_ms + self.config.default_ttl_ms;
        }
        let id = notification.id;

        if !notification.actions.is_empty() {
            self.pending.write().insert(id, notification.clone());
        }
        {
            let mut history = self.history.write();
            history.push_back(notification.clone());
            while history.len() > self.config.history_cap {
                history.pop_front();
            }
        }

        let notifiers: Vec<Arc<dyn Notifier>> = self.notifiers.read().clone();
        let mut last_err: Option<CoordError> = None;
        for notifier in notifiers {
            if let Err(err) = notifier.deliver(&notification).await {
                tracing::warn!(transport = notifier.name(), %err, "notification delivery failed");
                last_err = Some(
                    CoordError::network("notify_failed", err.to_string()),
                );
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(id),
        }
    }

    /// Record a human's answer to a pending notification.
    ///
    /// The response handler runs after the registry lock is released.
    pub fn respond(
        &self,
        id: &NotificationId,
        action_id: &str,
        data: HashMap<String, String>,
    ) -> Result<Notification, CoordError> {
        let now_ms = self.clock.epoch_ms();
        let (notification, response) = {
            let mut pending = self.pending.write();
            let Some(entry) = pending.get(id) else {
                return Err(CoordError::permanent(
                    "notification_not_found",
                    "no pending notification with that id",
                ));
            };
            if entry.action(action_id).is_none() {
                return Err(CoordError::validation(
                    "unknown_action",
                    format!("action {action_id:?} is not offered by this notification"),
                ));
            }
            let mut notification = pending.remove(id).unwrap_or_else(|| unreachable!("just found"));
            let response = NotificationResponse {
                action_id: action_id.to_string(),
                data,
                responded_at_ms: now_ms,
            };
            notification.response = Some(response.clone());
            notification.acknowledged = true;
            (notification, response)
        };
        self.record_in_history(&notification);

        if let Some(handler) = self.on_response.read().as_ref() {
            handler(&notification, &response);
        }
        Ok(notification)
    }

    /// Clear a pending notification without choosing an action.
    pub fn acknowledge(&self, id: &NotificationId) -> Result<(), CoordError> {
        let mut notification = self.pending.write().remove(id).ok_or_else(|| {
            CoordError::permanent("notification_not_found", "no pending notification with that id")
        })?;
        notification.acknowledged = true;
        self.record_in_history(&notification);
        Ok(())
    }

    /// Pending notifications, oldest first.
    pub fn pending(&self) -> Vec<Notification> {
        let now_ms = self.clock.epoch_ms();
        let mut out: Vec<Notification> = self
            .pending
            .read()
            .values()
            .filter(|n| n.is_pending(now_ms))
            .cloned()
            .collect();
        out.sort_by_key(|n| n.created_at_ms);
        out
    }

    pub fn pending_count(&self) -> usize {
        self.pending().len()
    }

    /// Delivery history, oldest first, capped.
    pub fn history(&self) -> Vec<Notification> {
        self.history.read().iter().cloned().collect()
    }

    /// Drop expired pending entries. Returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        let now_ms = self.clock.epoch_ms();
        let mut pending = self.pending.write();
        let before = pending.len();
        pending.retain(|_, n| !n.is_expired(now_ms));
        let dropped = before - pending.len();
        if dropped > 0 {
            tracing::debug!(dropped, "expired notifications dropped");
        }
        dropped
    }

    fn record_in_history(&self, notification: &Notification) {
        let mut history = self.history.write();
        if let Some(slot) = history.iter_mut().find(|n| n.id == notification.id) {
            *slot = notification.clone();
        } else {
            history.push_back(notification.clone());
        }
    }
}

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
