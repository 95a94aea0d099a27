// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-engine: the coordination runtime.
//!
//! Three actors over the core stores: the [`LockNegotiator`] runs the
//! intent/acquire/release protocol and conflict negotiation, the
//! [`EventRouter`] fans published events out to interested subscribers and
//! the mesh, and the [`NotificationManager`] tracks questions awaiting a
//! human. `tasks` supervises the background maintenance loops; `leave`
//! drives a graceful departure.

pub mod leave;
pub mod negotiator;
pub mod notify;
pub mod router;
pub mod tasks;

pub use hive_core::{NegotiationSession, Proposal, Resolution, ResolutionKind, SessionState};
pub use leave::run_leave;
pub use negotiator::{LockNegotiator, NegotiatorConfig};
pub use notify::{NotificationManager, NotificationManagerConfig};
pub use router::EventRouter;
pub use tasks::{spawn_maintenance, MaintenanceConfig};
