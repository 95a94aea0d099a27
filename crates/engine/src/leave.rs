// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Graceful-departure driver.
//!
//! Walks the [`LeaveStateMachine`] through release → sync → disconnect:
//! releases every lock this daemon minted, announces the departure to the
//! mesh, waits briefly for propagation, and completes. Failures at any
//! step move the machine to Failed with the reason.

use std::sync::Arc;
use std::time::Duration;

use hive_adapters::Broadcaster;
use hive_core::{
    AgentId, Clock, CoordError, Event, EventKind, EventPayload, LeavePhase, LeaveStateMachine,
    LeaveStatus,
};
use hive_wire::PeerMessage;

use crate::negotiator::LockNegotiator;
use crate::router::EventRouter;

/// How long to let the departure events propagate before completing.
pub const PROPAGATION_DELAY: Duration = Duration::from_millis(250);

/// Drive a graceful departure to a terminal state.
///
/// Returns the terminal status snapshot. A failure mid-way still leaves
/// the machine terminal (Failed) and restartable.
pub async fn run_leave<C: Clock>(
    machine: &LeaveStateMachine<C>,
    negotiator: &LockNegotiator<C>,
    router: &EventRouter<C>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    agent_name: &str,
    reason: &str,
    clock: &C,
) -> Result<LeaveStatus, CoordError> {
    machine.start()?;
    match drive(machine, negotiator, router, broadcaster, agent_name, reason, clock).await {
        Ok(()) => Ok(machine.status()),
        Err(err) => {
            machine.fail(err.to_string());
            Err(err)
        }
    }
}

async fn drive<C: Clock>(
    machine: &LeaveStateMachine<C>,
    negotiator: &LockNegotiator<C>,
    router: &EventRouter<C>,
    broadcaster: Option<Arc<dyn Broadcaster>>,
    agent_name: &str,
    reason: &str,
    clock: &C,
) -> Result<(), CoordError> {
    let node_id = *negotiator.node_id();

    machine.transition_to(LeavePhase::ReleasingLocks)?;
    let mut released = 0;
    for lock in negotiator.locks() {
        if lock.node_id != node_id {
            continue;
        }
        match negotiator.release(&lock.id, &lock.holder_id) {
            Ok(_) => released += 1,
            Err(err) => {
                // Expired between listing and release; anything else is
                // worth surfacing in the log.
                tracing::warn!(lock = %lock.id, %err, "release during leave failed");
            }
        }
    }
    machine.set_locks_released(released);

    machine.transition_to(LeavePhase::Syncing)?;
    router.publish(
        Event::new(
            EventKind::AgentLeft,
            AgentId::new(node_id.as_str()),
            agent_name,
            EventPayload::AgentLeft { node_id, reason: reason.to_string() },
            clock.epoch_ms(),
        ),
    );
    machine.set_context_synced(true);

    machine.transition_to(LeavePhase::Disconnecting)?;
    if let Some(broadcaster) = broadcaster {
        let msg = PeerMessage::PeerLeaving { node_id, reason: reason.to_string() };
        match hive_wire::encode(&msg) {
            Ok(bytes) => {
                if let Err(err) = broadcaster.broadcast(&bytes) {
                    tracing::warn!(%err, "peer_leaving broadcast failed");
                }
            }
            Err(err) => tracing::warn!(%err, "peer_leaving encode failed"),
        }
    }
    tokio::time::sleep(PROPAGATION_DELAY).await;

    machine.complete()?;
    tracing::info!(released, "departure complete");
    Ok(())
}

#[cfg(test)]
#[path = "leave_tests.rs"]
mod tests;
