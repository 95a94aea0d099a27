// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Inbound mesh dispatch.
//!
//! The transport substrate is opaque to the daemon: it delivers framed
//! [`PeerMessage`]s from peers, and drains the outbound frame queue the
//! engine's broadcaster fills. `dispatch_frame` is the single inbound
//! entry point.

use std::sync::Arc;

use tracing::{debug, warn};

use hive_wire::PeerMessage;

use crate::coord::Coord;

/// Apply one frame from a peer to local state.
pub fn dispatch_frame(coord: &Arc<Coord>, bytes: &[u8]) {
    let msg: PeerMessage = match hive_wire::decode(bytes) {
        Ok(msg) => msg,
        Err(err) => {
            warn!(%err, "unparseable mesh frame dropped");
            return;
        }
    };
    debug!(kind = msg.kind(), "mesh frame");
    match msg {
        PeerMessage::Intent { lock, announced_at_ms, expires_at_ms } => {
            coord.note_peer(lock.node_id);
            coord.negotiator.handle_remote_intent(lock, announced_at_ms, expires_at_ms);
        }
        PeerMessage::Acquired { lock } => {
            coord.note_peer(lock.node_id);
            coord.negotiator.handle_remote_acquired(lock);
        }
        PeerMessage::Released { lock_id } => {
            coord.negotiator.handle_remote_released(&lock_id);
        }
        PeerMessage::Event { event } => {
            coord.router.publish_local(event);
        }
        PeerMessage::InterestChange { change } => {
            if let Some(node_id) = change.interest.node_id {
                coord.note_peer(node_id);
            }
            coord.router.handle_remote_interest_change(change);
        }
        PeerMessage::Vote { session_id, vote } => {
            coord.negotiator.handle_remote_vote(&session_id, vote);
        }
        PeerMessage::PeerLeaving { node_id, reason } => {
            debug!(peer = %node_id, %reason, "peer leaving");
            coord.forget_peer(&node_id);
        }
    }
}

/// Drain outbound frames until the sender side closes.
///
/// A real transport replaces this loop with its publish path; without one
/// the frames are counted and dropped so the queue never fills.
pub async fn run_outbound_pump(mut frames: tokio::sync::mpsc::Receiver<Vec<u8>>) {
    let mut sent: u64 = 0;
    while let Some(frame) = frames.recv().await {
        sent += 1;
        debug!(bytes = frame.len(), total = sent, "outbound mesh frame");
    }
    debug!(total = sent, "outbound pump stopped");
}

#[cfg(test)]
#[path = "mesh_tests.rs"]
mod tests;
