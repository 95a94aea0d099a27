// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-core: coordination primitives for the Hive agent mesh.
//!
//! Everything in this crate is in-memory and synchronous: stores guard their
//! state with reader-writer locks and never call out while holding them.
//! Network delivery, notification fan-out, and the negotiation runtime live
//! in `hive-engine`; this crate owns the types and the single-daemon state.

pub mod agent;
pub mod clock;
pub mod error;
pub mod event;
pub mod event_log;
pub mod fence;
pub mod id;
pub mod interest;
pub mod leave;
pub mod lock;
pub mod lock_store;
pub mod notification;
pub mod rate_limit;
pub mod session;
pub mod target;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use agent::{AgentId, NodeId};
pub use clock::{Clock, FakeClock, SystemClock};
pub use error::{CoordError, ErrorCategory};
pub use event::{Event, EventFilter, EventId, EventKind, EventPayload, EventStatus};
pub use event_log::{EventLog, EventLogConfig};
pub use fence::{fence_order, FencingTokenSource};
pub use id::short;
pub use interest::{
    ChangeKind, Interest, InterestChange, InterestId, InterestLevel, InterestManager,
    InterestMatch, MatchKind,
};
pub use leave::{LeavePhase, LeaveStateMachine, LeaveStatus};
pub use lock::{LockConflict, LockId, LockIntent, SemanticLock};
pub use lock_store::LockStore;
pub use notification::{
    Notification, NotificationAction, NotificationId, NotificationPriority, NotificationResponse,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig, RateLimiterStats};
pub use session::{
    NegotiationSession, Proposal, Resolution, ResolutionKind, SessionId, SessionState, Vote,
};
pub use target::{SemanticTarget, TargetKind};
