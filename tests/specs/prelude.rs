// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for the scenario suite: one fully wired engine on a
//! fake clock.

use std::sync::Arc;

use hive_core::{
    AgentId, EventLog, EventLogConfig, FakeClock, InterestManager, LockIntent, LockStore,
    NodeId, RateLimiter, RateLimiterConfig, SemanticLock, SemanticTarget,
};
use hive_engine::{EventRouter, LockNegotiator, NegotiatorConfig};

pub struct Engine {
    pub clock: FakeClock,
    pub node_id: NodeId,
    pub negotiator: LockNegotiator<FakeClock>,
    pub router: EventRouter<FakeClock>,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_limits(RateLimiterConfig { rate: 1_000.0, burst: 1_000.0, ..Default::default() })
    }

    pub fn with_limits(limits: RateLimiterConfig) -> Self {
        let clock = FakeClock::new();
        let node_id = NodeId::new();
        let store = Arc::new(LockStore::with_clock(clock.clone()));
        let limiter = Arc::new(RateLimiter::with_clock(limits, clock.clone()));
        let log = Arc::new(EventLog::with_clock(EventLogConfig::default(), clock.clone()));
        let interests = Arc::new(InterestManager::with_clock(clock.clone()));
        Self {
            negotiator: LockNegotiator::new(
                node_id,
                NegotiatorConfig::default(),
                clock.clone(),
                store,
                Arc::clone(&limiter),
            ),
            router: EventRouter::new(log, interests),
            node_id,
            clock,
        }
    }

    pub fn announce(&self, holder: &str, path: &str, start: u32, end: u32, why: &str) -> LockIntent {
        self.negotiator
            .announce_intent(
                SemanticTarget::line_range(path, start, end),
                AgentId::new(holder),
                Some(holder.to_string()),
                why.to_string(),
            )
            .unwrap_or_else(|e| panic!("announce for {holder} failed: {e}"))
    }

    pub fn acquire(&self, holder: &str, path: &str, start: u32, end: u32, why: &str) -> SemanticLock {
        let intent = self.announce(holder, path, start, end, why);
        self.negotiator
            .acquire(&intent.id())
            .unwrap_or_else(|e| panic!("acquire for {holder} failed: {e}"))
    }
}
