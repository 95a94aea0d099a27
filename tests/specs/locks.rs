// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock negotiation scenarios: conflict then yield, split, priority,
//! escalation, rate limiting, and the acquire/release round-trip law.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use hive_core::{AgentId, RateLimiterConfig, SemanticTarget};
use hive_engine::{Proposal, ResolutionKind, SessionState};

use crate::prelude::Engine;

/// Alice holds auth/jwt.go 10-50 ("refactor"); Bob wants 30-70
/// ("hotfix"). Bob's announce conflicts and opens a session; yield(Alice)
/// hands the range to Bob with a newer fencing token.
#[test]
fn conflict_then_yield() {
    let engine = Engine::new();
    let alice = engine.acquire("alice", "auth/jwt.go", 10, 50, "refactor");

    let err = engine
        .negotiator
        .announce_intent(
            SemanticTarget::line_range("auth/jwt.go", 30, 70),
            AgentId::new("bob"),
            Some("bob".into()),
            "hotfix".into(),
        )
        .unwrap_err();
    assert!(err.is_retryable());

    let session = engine.negotiator.open_sessions().remove(0);
    let resolution = engine
        .negotiator
        .negotiate(&session.id, Proposal::Yield { yielder: AgentId::new("alice") })
        .unwrap();

    assert_eq!(resolution.kind, ResolutionKind::Negotiated);
    assert!(engine.negotiator.store().get(&alice.id).is_none());
    let bob = engine.negotiator.store().get(&session.requested.id).unwrap();
    assert_eq!(bob.holder_id, "bob");
    assert!(bob.fencing_token > alice.fencing_token);
}

/// Same start as yield, but Bob proposes a split at line 40: Alice keeps
/// 10-39, Bob takes 40-70, both present.
#[test]
fn conflict_then_split() {
    let engine = Engine::new();
    let alice = engine.acquire("alice", "auth/jwt.go", 10, 50, "refactor");
    let _ = engine
        .negotiator
        .announce_intent(
            SemanticTarget::line_range("auth/jwt.go", 30, 70),
            AgentId::new("bob"),
            Some("bob".into()),
            "hotfix".into(),
        )
        .unwrap_err();
    let session = engine.negotiator.open_sessions().remove(0);

    engine.negotiator.negotiate(&session.id, Proposal::Split { split_point: 40 }).unwrap();

    let kept = engine.negotiator.store().get(&alice.id).unwrap();
    let granted = engine.negotiator.store().get(&session.requested.id).unwrap();
    assert_eq!(kept.target.line_span(), Some((10, 39)));
    assert_eq!(granted.target.line_span(), Some((40, 70)));
}

/// Concurrent intents on the same target: the higher fencing token wins
/// a priority proposal and the loser's lock is removed.
#[test]
fn priority_tie_break() {
    let engine = Engine::new();
    // A mirrored lock from another daemon carries an older token.
    let mut remote = hive_core::test_support::lock_fixture("alice", "auth/jwt.go", 10, 50, 0, u64::MAX);
    remote.fencing_token = 7;
    engine.negotiator.handle_remote_acquired(remote.clone());

    let _ = engine
        .negotiator
        .announce_intent(
            SemanticTarget::line_range("auth/jwt.go", 30, 70),
            AgentId::new("bob"),
            Some("bob".into()),
            "hotfix".into(),
        )
        .unwrap_err();
    let session = engine.negotiator.open_sessions().remove(0);

    let resolution = engine.negotiator.negotiate(&session.id, Proposal::Priority).unwrap();
    assert_eq!(resolution.winner, Some(session.requested.id));
    assert!(engine.negotiator.store().get(&remote.id).is_none(), "alice's lock removed");
    assert!(engine.negotiator.store().get(&session.requested.id).is_some(), "bob wins");
}

/// Escalation resolves human-needed, fires the callback exactly once,
/// and surfaces a permanent error.
#[test]
fn escalation() {
    let engine = Engine::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&fired);
    engine.negotiator.set_on_escalate(Box::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    engine.acquire("alice", "auth/jwt.go", 10, 50, "refactor");
    let _ = engine
        .negotiator
        .announce_intent(
            SemanticTarget::line_range("auth/jwt.go", 30, 70),
            AgentId::new("bob"),
            Some("bob".into()),
            "hotfix".into(),
        )
        .unwrap_err();
    let session = engine.negotiator.open_sessions().remove(0);

    let err = engine
        .negotiator
        .negotiate(&session.id, Proposal::Escalate { reason: "ambiguous intent".into() })
        .unwrap_err();
    assert_eq!(err.category(), hive_core::ErrorCategory::Permanent);
    assert_eq!(fired.load(Ordering::SeqCst), 1);

    let resolved = engine.negotiator.session(&session.id).unwrap();
    assert_eq!(resolved.state, SessionState::Escalated);
    assert_eq!(resolved.resolution.unwrap().kind, ResolutionKind::HumanNeeded);
}

/// Burst 20 at 10/s: 25 announces admit exactly 20; after 500ms at
/// least 5 more land.
#[test]
fn rate_limit_burst() {
    let engine = Engine::with_limits(RateLimiterConfig {
        rate: 10.0,
        burst: 20.0,
        ..Default::default()
    });

    let announce = |i: usize| {
        engine.negotiator.announce_intent(
            SemanticTarget::line_range(format!("f{i}.rs"), 1, 2),
            AgentId::new("bob"),
            None,
            "burst".into(),
        )
    };

    let admitted = (0..25).filter(|i| announce(*i).is_ok()).count();
    assert_eq!(admitted, 20);

    engine.clock.advance(Duration::from_millis(500));
    let recovered = (25..35).filter(|i| announce(*i).is_ok()).count();
    assert!(recovered >= 5, "expected at least 5 admissions after refill, got {recovered}");
}

/// acquire(T); release(id) leaves the store semantically unchanged.
#[test]
fn acquire_release_round_trip() {
    let engine = Engine::new();
    engine.acquire("carol", "elsewhere.rs", 1, 5, "background");
    let before = engine.negotiator.locks();

    let lock = engine.acquire("alice", "auth/jwt.go", 10, 50, "probe");
    engine.negotiator.release(&lock.id, &AgentId::new("alice")).unwrap();

    assert_eq!(engine.negotiator.locks(), before);
    // The range is immediately reacquirable.
    engine.acquire("bob", "auth/jwt.go", 10, 50, "after release");
}

/// Fencing tokens from one daemon are strictly increasing across every
/// lock it mints.
#[test]
fn fencing_tokens_are_monotonic() {
    let engine = Engine::new();
    let mut last = 0;
    for i in 0..20 {
        let lock = engine.acquire("alice", &format!("file{i}.rs"), 1, 10, "sweep");
        assert!(lock.fencing_token > last);
        last = lock.fencing_token;
        engine.negotiator.release(&lock.id, &AgentId::new("alice")).unwrap();
    }
}
