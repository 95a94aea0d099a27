// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-in-the-loop notification records.
//!
//! A notification with actions is a question awaiting a human answer; one
//! without actions is informational. The pending registry and delivery
//! fan-out live in `hive-engine`; these are the plain records.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::define_id;

define_id! {
    /// Identifier for a notification.
    pub struct NotificationId("notif-");
}

/// Default lifetime of a pending notification: 5 minutes.
pub const DEFAULT_NOTIFICATION_TTL_MS: u64 = 5 * 60 * 1000;

/// Urgency as shown to humans. Ordering is by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Critical,
}

/// One choice a human can take on a pending notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default)]
    pub is_dangerous: bool,
}

/// A recorded human answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationResponse {
    pub action_id: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
    pub responded_at_ms: u64,
}

/// A message to a human, optionally awaiting a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub category: String,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, String>,
    #[serde(default)]
    pub actions: Vec<NotificationAction>,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<NotificationResponse>,
}

impl Notification {
    /// Informational notification with no actions.
    pub fn info(
        category: impl Into<String>,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: NotificationId::from_string(""),
            category: category.into(),
            priority: NotificationPriority::Normal,
            title: title.into(),
            message: message.into(),
            details: HashMap::new(),
            actions: Vec::new(),
            created_at_ms: 0,
            expires_at_ms: 0,
            acknowledged: false,
            response: None,
        }
    }

    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn with_actions(mut self, actions: Vec<NotificationAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Pending: has actions, not yet answered or expired.
    pub fn is_pending(&self, now_ms: u64) -> bool {
        !self.actions.is_empty() && !self.acknowledged && !self.is_expired(now_ms)
    }

    /// The action a human picked by id, if it exists.
    pub fn action(&self, action_id: &str) -> Option<&NotificationAction> {
        self.actions.iter().find(|a| a.id == action_id)
    }
}

#[cfg(test)]
#[path = "notification_tests.rs"]
mod tests;
