// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interest routing and event log scenarios: pattern fan-out, level
//! gating, per-file compaction, and the notification round-trip law.

use std::sync::Arc;

use hive_adapters::FakeNotifier;
use hive_core::test_support::{file_event, interest_fixture, lock_fixture};
use hive_core::{
    AgentId, Clock, Event, EventKind, EventLog, EventLogConfig, EventPayload, EventStatus,
    FakeClock, InterestLevel, Notification, NotificationAction,
};
use hive_engine::{NotificationManager, NotificationManagerConfig};

use crate::prelude::Engine;

fn context_shared(engine: &Engine, path: &str) -> Event {
    Event::new(
        EventKind::ContextShared,
        AgentId::new("publisher"),
        "publisher",
        EventPayload::ContextShared {
            summary: "notes".into(),
            content_len: 0,
            metadata: Default::default(),
        },
        engine.clock.epoch_ms(),
    )
    .with_file(path)
}

/// Alice (`auth-lib/**`), Bob (`user-service/**`, `auth-lib/token.go`),
/// Charlie (`api-gateway/**`, `auth-lib/jwt.go`, `user-service/api/*`):
/// contextShared for auth-lib/jwt.go reaches Alice and Charlie only.
#[test]
fn interest_routing_fan_out() {
    let engine = Engine::new();
    for (agent, patterns) in [
        ("alice", vec!["auth-lib/**"]),
        ("bob", vec!["user-service/**", "auth-lib/token.go"]),
        ("charlie", vec!["api-gateway/**", "auth-lib/jwt.go", "user-service/api/*"]),
    ] {
        engine
            .router
            .register_interest(interest_fixture(agent, &patterns, InterestLevel::Direct))
            .unwrap();
    }
    let mut alice = engine.router.subscribe(AgentId::new("alice"));
    let mut bob = engine.router.subscribe(AgentId::new("bob"));
    let mut charlie = engine.router.subscribe(AgentId::new("charlie"));

    engine.router.publish(context_shared(&engine, "auth-lib/jwt.go"));

    assert!(alice.try_recv().is_ok(), "alice matches auth-lib/**");
    assert!(charlie.try_recv().is_ok(), "charlie matches auth-lib/jwt.go");
    assert!(bob.try_recv().is_err(), "bob matches neither pattern");
}

/// A locksOnly interest sees lockAcquired but not contextShared for the
/// same path.
#[test]
fn locks_only_level() {
    let engine = Engine::new();
    engine
        .router
        .register_interest(interest_fixture("alice", &["auth-lib/**"], InterestLevel::LocksOnly))
        .unwrap();
    let mut rx = engine.router.subscribe(AgentId::new("alice"));

    engine.router.publish(context_shared(&engine, "auth-lib/jwt.go"));
    assert!(rx.try_recv().is_err());

    let acquired = Event::new(
        EventKind::LockAcquired,
        AgentId::new("publisher"),
        "publisher",
        EventPayload::LockAcquired {
            lock: lock_fixture("bob", "auth-lib/jwt.go", 1, 9, 1, u64::MAX),
        },
        engine.clock.epoch_ms(),
    )
    .with_file("auth-lib/jwt.go");
    engine.router.publish(acquired);

    let received = rx.try_recv().unwrap();
    assert_eq!(received.kind, EventKind::LockAcquired);
}

/// A matching published event reaches exactly one channel of the
/// interested agent, in publish order.
#[test]
fn delivery_is_exactly_once_in_order() {
    let engine = Engine::new();
    engine
        .router
        .register_interest(interest_fixture(
            "alice",
            &["src/**", "src/deep/**"], // overlapping patterns, one delivery
            InterestLevel::All,
        ))
        .unwrap();
    let mut rx = engine.router.subscribe(AgentId::new("alice"));

    for i in 0..5 {
        engine
            .router
            .publish(file_event("publisher", &format!("src/deep/f{i}.rs"), engine.clock.epoch_ms()));
    }
    for i in 0..5 {
        let event = rx.try_recv().unwrap();
        assert_eq!(event.file_path.as_deref(), Some(format!("src/deep/f{i}.rs").as_str()));
    }
    assert!(rx.try_recv().is_err(), "no duplicate deliveries");
}

/// MaxEventsPerFile=10, 12 appends to a.go: the oldest 2 are archived
/// pointing at the 12th, and reads return exactly the 10 newest.
#[test]
fn per_file_compaction() {
    let clock = FakeClock::new();
    let log = EventLog::with_clock(
        EventLogConfig { max_size: 10_000, max_events_per_file: 10 },
        clock.clone(),
    );
    let mut ids = Vec::new();
    for _ in 0..12 {
        ids.push(log.append(file_event("alice", "a.go", clock.epoch_ms())));
        clock.advance(std::time::Duration::from_millis(1));
    }

    for old in &ids[..2] {
        let archived = log.get(old).unwrap();
        assert_eq!(archived.status, EventStatus::Archived);
        assert_eq!(archived.superseded_by, Some(ids[11]));
    }
    let live = log.get_by_file("a.go");
    assert_eq!(live.iter().map(|e| e.id).collect::<Vec<_>>(), ids[2..].to_vec());

    // Every archived event has a live successor for the same file.
    for old in &ids[..2] {
        let archived = log.get(old).unwrap();
        let successor = log.get(&archived.superseded_by.unwrap()).unwrap();
        assert_eq!(successor.file_path, archived.file_path);
    }

    // Compaction drops the archived pair from all read paths.
    assert_eq!(log.compact(), 2);
    assert_eq!(log.total_size(), 10);
}

/// Notify(n) then Respond(n.id, valid action) removes n from pending and
/// stamps a response no earlier than creation.
#[tokio::test]
async fn notify_respond_round_trip() {
    let clock = FakeClock::new();
    let manager = NotificationManager::new(NotificationManagerConfig::default(), clock.clone());
    let fake = FakeNotifier::new();
    manager.add_notifier(Arc::new(fake.clone()));

    let question = Notification::info("deploy", "Proceed?", "tests are green").with_actions(vec![
        NotificationAction {
            id: "go".into(),
            label: "Go".into(),
            description: String::new(),
            is_default: true,
            is_dangerous: false,
        },
    ]);
    let id = manager.notify(question).await.unwrap();
    assert_eq!(manager.pending_count(), 1);
    assert_eq!(fake.delivered().len(), 1);

    clock.advance(std::time::Duration::from_millis(10));
    let answered = manager.respond(&id, "go", Default::default()).unwrap();
    assert_eq!(manager.pending_count(), 0);
    let response = answered.response.unwrap();
    assert!(response.responded_at_ms >= answered.created_at_ms);
}

/// An agent with no interests sees nothing without include_all.
#[test]
fn no_interest_no_events() {
    let engine = Engine::new();
    engine.router.publish(file_event("bob", "src/a.rs", engine.clock.epoch_ms()));
    let events =
        engine.router.get_events(&AgentId::new("alice"), &hive_core::EventFilter::default());
    assert!(events.is_empty());
}
