// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-adapters: edge contracts for the coordination engine.
//!
//! Narrow traits the engine calls out through — human notification
//! transports, the mesh broadcast hook, and the context document sink —
//! plus the concrete adapters the daemon wires in. Fakes for each live
//! behind the `test-support` feature.

pub mod broadcast;
pub mod context;
pub mod notify;

pub use broadcast::{Broadcaster, ChannelBroadcaster, NullBroadcaster};
pub use context::{ContextDoc, ContextError, ContextSink, NullContextSink};
pub use notify::{DesktopNotifier, Notifier, NotifyError, WebhookNotifier};

#[cfg(any(test, feature = "test-support"))]
pub use context::RecordingContextSink;
#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotifier;
