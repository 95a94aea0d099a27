// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background maintenance loops.
//!
//! Four long-lived tasks tied to one cancellation token: event-log
//! compaction, negotiation cleanup (intents, timeouts, retention),
//! expired-notification cleanup, and rate-limiter bucket reaping.
//! Cancellation lands at the next tick boundary; in-flight work finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use hive_core::{Clock, EventLog, LockStore, RateLimiter};

use crate::negotiator::LockNegotiator;
use crate::notify::NotificationManager;

/// Tick intervals for the maintenance loops.
#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    pub compact_interval: Duration,
    /// Fast tick: intent timeouts are measured in seconds.
    pub negotiation_interval: Duration,
    pub notification_interval: Duration,
    pub limiter_interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            compact_interval: Duration::from_secs(60),
            negotiation_interval: Duration::from_secs(1),
            notification_interval: Duration::from_secs(30),
            limiter_interval: Duration::from_secs(60),
        }
    }
}

/// Spawn the maintenance loops. Dropping the token's parent cancels all.
pub fn spawn_maintenance<C: Clock>(
    log: Arc<EventLog<C>>,
    store: Arc<LockStore<C>>,
    negotiator: Arc<LockNegotiator<C>>,
    notifications: Arc<NotificationManager<C>>,
    limiter: Arc<RateLimiter<C>>,
    config: MaintenanceConfig,
    cancel: CancellationToken,
) -> Vec<JoinHandle<()>> {
    vec![
        spawn_loop("compaction", config.compact_interval, cancel.clone(), move || {
            log.compact();
            store.reap_expired();
        }),
        spawn_loop("negotiation", config.negotiation_interval, cancel.clone(), move || {
            negotiator.cleanup();
        }),
        spawn_loop("notifications", config.notification_interval, cancel.clone(), move || {
            notifications.cleanup();
        }),
        spawn_loop("rate-limiter", config.limiter_interval, cancel, move || {
            limiter.cleanup();
        }),
    ]
}

fn spawn_loop(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut work: impl FnMut() + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; skip it so a loop does no
        // work before its first full period.
        tick.tick().await;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!(task = name, "maintenance loop stopped");
                    break;
                }
                _ = tick.tick() => work(),
            }
        }
    })
}

#[cfg(test)]
#[path = "tasks_tests.rs"]
mod tests;
