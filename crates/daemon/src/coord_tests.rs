// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hive_adapters::FakeNotifier;
use hive_core::{EventFilter, EventKind, SemanticTarget};
use hive_engine::Proposal;
use std::time::Duration;

fn acquire(coord: &Arc<Coord>, holder: &str, path: &str, start: u32, end: u32) {
    let intent = coord
        .negotiator
        .announce_intent(
            SemanticTarget::line_range(path, start, end),
            AgentId::new(holder),
            Some(holder.into()),
            "edit".into(),
        )
        .unwrap();
    coord.negotiator.acquire(&intent.id()).unwrap();
}

async fn settle() {
    // Callback work is spawned; give it a few scheduler turns.
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test]
async fn conflict_publishes_event_and_notifies() {
    let coord = Coord::new("tester".into());
    let fake = FakeNotifier::new();
    coord.notifications.add_notifier(Arc::new(fake.clone()));

    acquire(&coord, "alice", "auth/jwt.go", 10, 50);
    let err = coord
        .negotiator
        .announce_intent(
            SemanticTarget::line_range("auth/jwt.go", 30, 70),
            AgentId::new("bob"),
            Some("bob".into()),
            "hotfix".into(),
        )
        .unwrap_err();
    assert_eq!(err.code(), "lock_conflict");
    settle().await;

    let events = coord.router.get_events(
        &AgentId::new("anyone"),
        &EventFilter { include_all: true, ..Default::default() },
    );
    assert!(events.iter().any(|e| e.kind == EventKind::LockConflict));

    let delivered = fake.delivered();
    assert!(delivered.iter().any(|n| n.category == "lock"), "conflict notification sent");
}

#[tokio::test]
async fn escalation_opens_pending_question_and_approval_releases() {
    let coord = Coord::new("tester".into());
    acquire(&coord, "alice", "auth/jwt.go", 10, 50);
    let _ = coord
        .negotiator
        .announce_intent(
            SemanticTarget::line_range("auth/jwt.go", 30, 70),
            AgentId::new("bob"),
            Some("bob".into()),
            "hotfix".into(),
        )
        .unwrap_err();
    let session = coord.negotiator.open_sessions().remove(0);
    let held = session.conflicting.id;

    let err = coord
        .negotiator
        .negotiate(&session.id, Proposal::Escalate { reason: "ambiguous".into() })
        .unwrap_err();
    assert_eq!(err.code(), "human_required");
    settle().await;

    let pending = coord.notifications.pending();
    assert_eq!(pending.len(), 1, "escalation yields a pending question");
    let question = &pending[0];
    assert_eq!(question.details.get("session_id").map(String::as_str), Some(session.id.as_str()));

    // Human approves the requester: the held lock is released.
    coord.notifications.respond(&question.id, "approve", Default::default()).unwrap();
    settle().await;
    assert!(coord.store.get(&held).is_none(), "held lock released after approval");
    assert_eq!(coord.notifications.pending_count(), 0);
}

#[tokio::test]
async fn escalation_reject_keeps_holder() {
    let coord = Coord::new("tester".into());
    acquire(&coord, "alice", "auth/jwt.go", 10, 50);
    let _ = coord
        .negotiator
        .announce_intent(
            SemanticTarget::line_range("auth/jwt.go", 30, 70),
            AgentId::new("bob"),
            None,
            "hotfix".into(),
        )
        .unwrap_err();
    let session = coord.negotiator.open_sessions().remove(0);
    let held = session.conflicting.id;
    let _ = coord.negotiator.negotiate(&session.id, Proposal::Escalate { reason: "?".into() });
    settle().await;

    let question = coord.notifications.pending().remove(0);
    coord.notifications.respond(&question.id, "reject", Default::default()).unwrap();
    settle().await;
    assert!(coord.store.get(&held).is_some(), "holder keeps the lock on reject");
}

#[tokio::test]
async fn share_context_publishes_and_stores() {
    let coord = Coord::new("tester".into());
    coord
        .share_context(
            AgentId::new("alice"),
            "auth-lib/jwt.go".into(),
            "the claims struct moved".into(),
            Default::default(),
        )
        .await
        .unwrap();

    let events = coord.router.get_events(
        &AgentId::new("anyone"),
        &EventFilter { include_all: true, ..Default::default() },
    );
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].kind, EventKind::ContextShared);
    assert_eq!(events[0].file_path.as_deref(), Some("auth-lib/jwt.go"));
}

#[tokio::test]
async fn peer_bookkeeping() {
    let coord = Coord::new("tester".into());
    let peer = hive_core::NodeId::new();
    coord.note_peer(peer);
    coord.note_peer(peer);
    coord.note_peer(coord.node_id); // self is never a peer
    assert_eq!(coord.peer_count(), 1);
    coord.forget_peer(&peer);
    assert_eq!(coord.peer_count(), 0);
}
