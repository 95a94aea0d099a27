// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-daemon mesh exchange: frames produced by one engine are applied
//! to the other through the mesh dispatcher, as a transport would.

use std::sync::Arc;

use hive_adapters::ChannelBroadcaster;
use hive_core::{AgentId, EventFilter, EventKind, LeavePhase, SemanticTarget};
use hive_daemon::{mesh, Coord};
use hive_engine::run_leave;
use tokio::sync::mpsc;

struct Pair {
    a: Arc<Coord>,
    a_out: mpsc::Receiver<Vec<u8>>,
    b: Arc<Coord>,
    b_out: mpsc::Receiver<Vec<u8>>,
}

fn pair() -> Pair {
    let a = Coord::new("alpha".into());
    let (a_caster, a_out) = ChannelBroadcaster::new();
    a.set_broadcaster(Arc::new(a_caster));

    let b = Coord::new("beta".into());
    let (b_caster, b_out) = ChannelBroadcaster::new();
    b.set_broadcaster(Arc::new(b_caster));

    Pair { a, a_out, b, b_out }
}

/// Deliver every queued frame from one daemon into the other.
fn pump(from: &mut mpsc::Receiver<Vec<u8>>, to: &Arc<Coord>) -> usize {
    let mut delivered = 0;
    while let Ok(frame) = from.try_recv() {
        mesh::dispatch_frame(to, &frame);
        delivered += 1;
    }
    delivered
}

fn acquire(coord: &Arc<Coord>, holder: &str, path: &str, start: u32, end: u32) -> hive_core::SemanticLock {
    let intent = coord
        .negotiator
        .announce_intent(
            SemanticTarget::line_range(path, start, end),
            AgentId::new(holder),
            Some(holder.into()),
            "edit".into(),
        )
        .unwrap();
    coord.negotiator.acquire(&intent.id()).unwrap()
}

#[tokio::test]
async fn acquisition_mirrors_across_the_mesh() {
    let mut pair = pair();
    let lock = acquire(&pair.a, "alice", "auth/jwt.go", 10, 50);

    assert!(pump(&mut pair.a_out, &pair.b) >= 1, "intent and acquired frames flow");
    assert!(pair.b.store.get(&lock.id).is_some(), "beta mirrors alpha's lock");
    assert_eq!(pair.b.peer_count(), 1);

    // The mirrored lock now blocks a conflicting acquire on beta.
    let err = pair
        .b
        .negotiator
        .announce_intent(
            SemanticTarget::line_range("auth/jwt.go", 30, 70),
            AgentId::new("bob"),
            Some("bob".into()),
            "hotfix".into(),
        )
        .unwrap_err();
    assert_eq!(err.code(), "lock_conflict");

    // Release flows the same way.
    pair.a.negotiator.release(&lock.id, &AgentId::new("alice")).unwrap();
    pump(&mut pair.a_out, &pair.b);
    assert!(pair.b.store.get(&lock.id).is_none());
    acquire(&pair.b, "bob", "auth/jwt.go", 30, 70);
}

#[tokio::test]
async fn events_reach_remote_subscribers_once() {
    let mut pair = pair();
    // Bob on beta cares about auth-lib.
    pair.b
        .router
        .register_interest(hive_core::test_support::interest_fixture(
            "bob",
            &["auth-lib/**"],
            hive_core::InterestLevel::All,
        ))
        .unwrap();
    let mut bob_rx = pair.b.router.subscribe(AgentId::new("bob"));

    pair.a
        .share_context(
            AgentId::new("alice"),
            "auth-lib/jwt.go".into(),
            "claims moved".into(),
            Default::default(),
        )
        .await
        .unwrap();

    pump(&mut pair.a_out, &pair.b);
    let event = bob_rx.try_recv().unwrap();
    assert_eq!(event.kind, EventKind::ContextShared);
    assert!(bob_rx.try_recv().is_err(), "exactly one delivery");

    // Beta does not echo the remote event back onto its own mesh queue.
    assert_eq!(pump(&mut pair.b_out, &pair.a), 0);
}

#[tokio::test]
async fn interest_changes_mirror_remotely() {
    let mut pair = pair();
    pair.a
        .router
        .register_interest(hive_core::test_support::interest_fixture(
            "alice",
            &["src/**"],
            hive_core::InterestLevel::Direct,
        ))
        .unwrap();
    pump(&mut pair.a_out, &pair.b);

    let mirrored = pair.b.interests.list();
    assert_eq!(mirrored.len(), 1);
    assert!(mirrored[0].remote);
}

#[tokio::test]
async fn departure_propagates() {
    let mut pair = pair();
    let lock = acquire(&pair.a, "alice", "auth/jwt.go", 10, 50);
    pump(&mut pair.a_out, &pair.b);
    pair.b.note_peer(pair.a.node_id);

    let broadcaster = pair.a.broadcaster.read().clone();
    let status = run_leave(
        &pair.a.leave,
        &pair.a.negotiator,
        &pair.a.router,
        broadcaster,
        "alpha",
        "done for today",
        &pair.a.clock,
    )
    .await
    .unwrap();
    assert_eq!(status.phase, LeavePhase::Completed);
    assert_eq!(status.locks_released, 1);

    pump(&mut pair.a_out, &pair.b);
    assert!(pair.b.store.get(&lock.id).is_none(), "release propagated before departure");
    assert_eq!(pair.b.peer_count(), 0, "peer_leaving forgets alpha");

    // Beta's log saw the departure event.
    let events = pair.b.router.get_events(
        &AgentId::new("anyone"),
        &EventFilter { include_all: true, ..Default::default() },
    );
    assert!(events.iter().any(|e| e.kind == EventKind::AgentLeft));
}
