// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use hive_core::{ErrorCategory, FakeClock, RateLimiterConfig, TargetKind};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

struct Rig {
    clock: FakeClock,
    negotiator: LockNegotiator<FakeClock>,
}

fn rig() -> Rig {
    rig_with(NegotiatorConfig::default())
}

fn rig_with(config: NegotiatorConfig) -> Rig {
    let clock = FakeClock::new();
    let store = Arc::new(LockStore::with_clock(clock.clone()));
    let limiter = Arc::new(RateLimiter::with_clock(
        RateLimiterConfig { rate: 1_000.0, burst: 1_000.0, ..Default::default() },
        clock.clone(),
    ));
    let negotiator = LockNegotiator::new(NodeId::new(), config, clock.clone(), store, limiter);
    Rig { clock, negotiator }
}

fn range(path: &str, start: u32, end: u32) -> SemanticTarget {
    SemanticTarget::line_range(path, start, end)
}

fn announce(rig: &Rig, holder: &str, target: SemanticTarget) -> LockIntent {
    rig.negotiator
        .announce_intent(target, AgentId::new(holder), Some(holder.into()), format!("{holder} edit"))
        .unwrap_or_else(|e| panic!("announce for {holder} failed: {e}"))
}

fn acquire(rig: &Rig, holder: &str, target: SemanticTarget) -> SemanticLock {
    let intent = announce(rig, holder, target);
    rig.negotiator.acquire(&intent.id()).unwrap()
}

#[test]
fn announce_then_acquire_happy_path() {
    let rig = rig();
    let intent = announce(&rig, "alice", range("auth/jwt.go", 10, 50));
    assert_eq!(intent.expires_at_ms, intent.announced_at_ms + 5_000);

    let lock = rig.negotiator.acquire(&intent.id()).unwrap();
    assert_eq!(lock.holder_id, "alice");
    assert!(lock.fencing_token > 0);
    assert!(rig.negotiator.store().get(&lock.id).is_some());
    assert!(rig.negotiator.intent(&lock.id).is_none(), "intent must be consumed");
}

#[test]
fn fencing_tokens_strictly_increase_across_locks() {
    let rig = rig();
    let mut prev = 0;
    for i in 0..5 {
        let lock = acquire(&rig, "alice", range(&format!("f{i}.rs"), 1, 10));
        assert!(lock.fencing_token > prev);
        prev = lock.fencing_token;
    }
}

#[test]
fn validation_errors() {
    let rig = rig();
    let err = rig
        .negotiator
        .announce_intent(range("", 1, 2), AgentId::new("alice"), None, "x".into())
        .unwrap_err();
    assert!(err.is_validation());

    let err = rig
        .negotiator
        .announce_intent(range("a.rs", 1, 2), AgentId::new(""), None, "x".into())
        .unwrap_err();
    assert_eq!(err.code(), "empty_holder");
}

#[test]
fn rate_limit_burst_then_recover() {
    let clock = FakeClock::new();
    let store = Arc::new(LockStore::with_clock(clock.clone()));
    let limiter = Arc::new(RateLimiter::with_clock(
        RateLimiterConfig { rate: 10.0, burst: 20.0, ..Default::default() },
        clock.clone(),
    ));
    let negotiator = LockNegotiator::new(
        NodeId::new(),
        NegotiatorConfig::default(),
        clock.clone(),
        store,
        limiter,
    );

    let mut admitted = 0;
    let mut limited = 0;
    for i in 0..25 {
        let result = negotiator.announce_intent(
            range(&format!("f{i}.rs"), 1, 2),
            AgentId::new("bob"),
            None,
            "burst".into(),
        );
        match result {
            Ok(_) => admitted += 1,
            Err(e) => {
                assert_eq!(e.code(), "rate_limited");
                assert!(e.is_retryable());
                limited += 1;
            }
        }
    }
    assert_eq!(admitted, 20);
    assert_eq!(limited, 5);

    clock.advance(Duration::from_millis(500));
    let mut recovered = 0;
    for i in 0..10 {
        if negotiator
            .announce_intent(
                range(&format!("g{i}.rs"), 1, 2),
                AgentId::new("bob"),
                None,
                "retry".into(),
            )
            .is_ok()
        {
            recovered += 1;
        }
    }
    assert!(recovered >= 5, "expected at least 5 admissions after refill, got {recovered}");
}

#[test]
fn conflict_opens_session_and_fires_callback() {
    let rig = rig();
    let conflicts_seen = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&conflicts_seen);
    rig.negotiator.set_on_conflict(Box::new(move |conflict| {
        assert_eq!(conflict.file_path(), "auth/jwt.go");
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    acquire(&rig, "alice", range("auth/jwt.go", 10, 50));
    let err = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();

    assert!(err.is_retryable());
    assert_eq!(err.code(), "lock_conflict");
    assert_eq!(conflicts_seen.load(Ordering::SeqCst), 1);

    let sessions = rig.negotiator.open_sessions();
    assert_eq!(sessions.len(), 1);
    let session = &sessions[0];
    assert_eq!(session.state, SessionState::IntentAnnounced);
    assert_eq!(session.requested.holder_id, "bob");
    assert_eq!(session.conflicting.holder_id, "alice");
    assert!(err.message().contains(session.id.as_str()), "error names the session");
}

#[test]
fn acquire_unknown_intent_is_permanent() {
    let rig = rig();
    let err = rig.negotiator.acquire(&LockId::new()).unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Permanent);
    assert_eq!(err.code(), "intent_not_found");
}

#[test]
fn acquire_expired_intent_is_retryable_and_dropped() {
    let rig = rig();
    let intent = announce(&rig, "alice", range("a.rs", 1, 10));
    rig.clock.advance(Duration::from_millis(5_001));
    let err = rig.negotiator.acquire(&intent.id()).unwrap_err();
    assert_eq!(err.code(), "intent_expired");
    assert!(err.is_retryable());
    assert!(rig.negotiator.intent(&intent.id()).is_none());
}

#[test]
fn acquire_recheck_catches_new_conflict() {
    let rig = rig();
    let bob_intent = announce(&rig, "bob", range("a.rs", 5, 15));
    // Alice wins the race between bob's phases.
    acquire(&rig, "alice", range("a.rs", 1, 10));
    let err = rig.negotiator.acquire(&bob_intent.id()).unwrap_err();
    assert_eq!(err.code(), "lock_conflict");
    assert!(err.is_retryable());
    assert!(rig.negotiator.intent(&bob_intent.id()).is_none(), "intent dropped on conflict");
}

#[test]
fn release_requires_holder() {
    let rig = rig();
    let lock = acquire(&rig, "alice", range("a.rs", 1, 10));

    let err = rig.negotiator.release(&lock.id, &AgentId::new("bob")).unwrap_err();
    assert_eq!(err.code(), "not_holder");
    assert_eq!(err.category(), ErrorCategory::Permanent);

    rig.negotiator.release(&lock.id, &AgentId::new("alice")).unwrap();
    assert!(rig.negotiator.store().get(&lock.id).is_none());

    let err = rig.negotiator.release(&lock.id, &AgentId::new("alice")).unwrap_err();
    assert_eq!(err.code(), "lock_not_found");
}

#[test]
fn renew_extends_until_budget_spent() {
    let mut config = NegotiatorConfig::default();
    config.max_renewals = 2;
    let rig = rig_with(config);
    let lock = acquire(&rig, "alice", range("a.rs", 1, 10));
    let holder = AgentId::new("alice");

    let renewed = rig.negotiator.renew(&lock.id, &holder).unwrap();
    assert_eq!(renewed.renew_count, 1);
    assert!(renewed.expires_at_ms >= lock.expires_at_ms);

    rig.negotiator.renew(&lock.id, &holder).unwrap();
    let err = rig.negotiator.renew(&lock.id, &holder).unwrap_err();
    assert_eq!(err.code(), "max_renewals");

    // Failure mode is idempotent: same error, no side effects.
    let before = rig.negotiator.store().get(&lock.id).unwrap();
    let err = rig.negotiator.renew(&lock.id, &holder).unwrap_err();
    assert_eq!(err.code(), "max_renewals");
    assert_eq!(rig.negotiator.store().get(&lock.id).unwrap(), before);

    let err = rig.negotiator.renew(&lock.id, &AgentId::new("bob")).unwrap_err();
    assert_eq!(err.code(), "not_holder");
}

/// Conflict then yield: the holder steps aside, the requester gets the
/// range, and the requester's fencing token is the newer one.
#[test]
fn yield_transfers_the_lock() {
    let rig = rig();
    let alice_lock = acquire(&rig, "alice", range("auth/jwt.go", 10, 50));
    assert!(rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .is_err());
    let session = rig.negotiator.open_sessions().remove(0);

    let resolution = rig
        .negotiator
        .negotiate(&session.id, Proposal::Yield { yielder: AgentId::new("alice") })
        .unwrap();

    assert_eq!(resolution.kind, ResolutionKind::Negotiated);
    assert_eq!(resolution.winner, Some(session.requested.id));
    assert!(rig.negotiator.store().get(&alice_lock.id).is_none(), "alice's lock removed");
    let bob_lock = rig.negotiator.store().get(&session.requested.id).unwrap();
    assert_eq!(bob_lock.holder_id, "bob");
    assert!(bob_lock.fencing_token > alice_lock.fencing_token);
    assert_eq!(rig.negotiator.session(&session.id).unwrap().state, SessionState::Acquired);
}

#[test]
fn yield_by_requester_keeps_holder() {
    let rig = rig();
    let alice_lock = acquire(&rig, "alice", range("auth/jwt.go", 10, 50));
    let _ = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();
    let session = rig.negotiator.open_sessions().remove(0);

    let resolution = rig
        .negotiator
        .negotiate(&session.id, Proposal::Yield { yielder: AgentId::new("bob") })
        .unwrap();

    assert_eq!(resolution.winner, Some(alice_lock.id));
    assert!(rig.negotiator.store().get(&alice_lock.id).is_some());
    assert!(rig.negotiator.store().get(&session.requested.id).is_none());
    assert_eq!(rig.negotiator.session(&session.id).unwrap().state, SessionState::Rejected);
}

#[test]
fn yield_by_stranger_is_rejected() {
    let rig = rig();
    acquire(&rig, "alice", range("auth/jwt.go", 10, 50));
    let _ = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();
    let session = rig.negotiator.open_sessions().remove(0);

    let err = rig
        .negotiator
        .negotiate(&session.id, Proposal::Yield { yielder: AgentId::new("mallory") })
        .unwrap_err();
    assert!(err.is_validation());
    assert!(!rig.negotiator.session(&session.id).unwrap().is_resolved());
}

/// Split at line 40: the held lock keeps 10-39, the requested lock takes
/// 40-70, both active.
#[test]
fn split_divides_the_range() {
    let rig = rig();
    let alice_lock = acquire(&rig, "alice", range("auth/jwt.go", 10, 50));
    let _ = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();
    let session = rig.negotiator.open_sessions().remove(0);

    let resolution =
        rig.negotiator.negotiate(&session.id, Proposal::Split { split_point: 40 }).unwrap();
    assert_eq!(resolution.kind, ResolutionKind::Negotiated);

    let kept = rig.negotiator.store().get(&alice_lock.id).unwrap();
    assert_eq!(kept.target.line_span(), Some((10, 39)));
    let granted = rig.negotiator.store().get(&session.requested.id).unwrap();
    assert_eq!(granted.target.line_span(), Some((40, 70)));
    assert!(!kept.target.conflicts_with(&granted.target));
}

#[test]
fn split_at_boundary_is_rejected() {
    let rig = rig();
    acquire(&rig, "alice", range("auth/jwt.go", 10, 50));
    let _ = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();
    let session = rig.negotiator.open_sessions().remove(0);

    for split_point in [30, 70, 5, 90] {
        let err = rig
            .negotiator
            .negotiate(&session.id, Proposal::Split { split_point })
            .unwrap_err();
        assert_eq!(err.code(), "split_out_of_range", "split at {split_point}");
    }
    assert!(!rig.negotiator.session(&session.id).unwrap().is_resolved());
}

/// Priority: the higher fencing token wins; the loser's lock is removed.
#[test]
fn priority_prefers_higher_token() {
    let rig = rig();
    // A remote peer holds the range with an older (smaller) token.
    let mut remote = hive_core::test_support::lock_fixture("alice", "auth/jwt.go", 10, 50, 0, u64::MAX);
    remote.fencing_token = 0;
    rig.negotiator.handle_remote_acquired(remote.clone());

    let _ = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();
    let session = rig.negotiator.open_sessions().remove(0);
    assert!(session.requested.fencing_token > remote.fencing_token);

    let resolution = rig.negotiator.negotiate(&session.id, Proposal::Priority).unwrap();
    assert_eq!(resolution.winner, Some(session.requested.id));
    assert!(rig.negotiator.store().get(&remote.id).is_none(), "loser removed");
    assert!(rig.negotiator.store().get(&session.requested.id).is_some(), "winner inserted");
}

#[test]
fn priority_keeps_holder_with_higher_token() {
    let rig = rig();
    let mut remote = hive_core::test_support::lock_fixture("alice", "auth/jwt.go", 10, 50, 0, u64::MAX);
    remote.fencing_token = u64::MAX;
    rig.negotiator.handle_remote_acquired(remote.clone());

    let _ = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();
    let session = rig.negotiator.open_sessions().remove(0);

    let resolution = rig.negotiator.negotiate(&session.id, Proposal::Priority).unwrap();
    assert_eq!(resolution.winner, Some(remote.id));
    assert!(rig.negotiator.store().get(&remote.id).is_some());
    assert_eq!(rig.negotiator.session(&session.id).unwrap().state, SessionState::Rejected);
}

/// Escalation: permanent error, human-needed resolution, callback fired
/// exactly once.
#[test]
fn escalate_hands_off_to_humans() {
    let rig = rig();
    let escalations = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&escalations);
    rig.negotiator.set_on_escalate(Box::new(move |session| {
        assert_eq!(session.state, SessionState::Escalated);
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    acquire(&rig, "alice", range("auth/jwt.go", 10, 50));
    let _ = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();
    let session = rig.negotiator.open_sessions().remove(0);

    let err = rig
        .negotiator
        .negotiate(&session.id, Proposal::Escalate { reason: "ambiguous intent".into() })
        .unwrap_err();
    assert_eq!(err.category(), ErrorCategory::Permanent);
    assert!(err.message().contains("human intervention required"));
    assert_eq!(escalations.load(Ordering::SeqCst), 1);

    let resolved = rig.negotiator.session(&session.id).unwrap();
    assert_eq!(resolved.state, SessionState::Escalated);
    let resolution = resolved.resolution.unwrap();
    assert_eq!(resolution.kind, ResolutionKind::HumanNeeded);
    assert_eq!(resolution.detail, "ambiguous intent");

    // Proposals on a resolved session are rejected, callback not re-fired.
    let err = rig.negotiator.negotiate(&session.id, Proposal::Priority).unwrap_err();
    assert_eq!(err.code(), "session_resolved");
    assert_eq!(escalations.load(Ordering::SeqCst), 1);
}

#[test]
fn vote_quorum_transfers_on_majority() {
    let mut config = NegotiatorConfig::default();
    config.required_votes = 3;
    let rig = rig_with(config);
    let alice_lock = acquire(&rig, "alice", range("auth/jwt.go", 10, 50));
    let _ = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();
    let session = rig.negotiator.open_sessions().remove(0);

    let vote = |voter: &str, approve: bool| Vote {
        voter_id: AgentId::new(voter),
        voter_name: voter.into(),
        approve,
        reason: String::new(),
        timestamp_ms: rig.clock.epoch_ms(),
    };

    assert_eq!(rig.negotiator.vote(&session.id, vote("carol", true)).unwrap(), None);
    assert_eq!(
        rig.negotiator.session(&session.id).unwrap().state,
        SessionState::WaitingVotes,
        "first vote moves the session out of intent_announced"
    );
    assert_eq!(rig.negotiator.vote(&session.id, vote("dave", false)).unwrap(), None);
    let resolution = rig.negotiator.vote(&session.id, vote("erin", true)).unwrap().unwrap();

    assert_eq!(resolution.kind, ResolutionKind::Approved);
    assert!(rig.negotiator.store().get(&alice_lock.id).is_none());
    assert!(rig.negotiator.store().get(&session.requested.id).is_some());

    let err = rig.negotiator.vote(&session.id, vote("frank", true)).unwrap_err();
    assert_eq!(err.code(), "session_resolved");
}

#[test]
fn vote_majority_against_rejects() {
    let mut config = NegotiatorConfig::default();
    config.required_votes = 2;
    let rig = rig_with(config);
    let alice_lock = acquire(&rig, "alice", range("auth/jwt.go", 10, 50));
    let _ = rig
        .negotiator
        .announce_intent(range("auth/jwt.go", 30, 70), AgentId::new("bob"), None, "hotfix".into())
        .unwrap_err();
    let session = rig.negotiator.open_sessions().remove(0);

    let vote = |voter: &str, approve: bool| Vote {
        voter_id: AgentId::new(voter),
        voter_name: voter.into(),
        approve,
        reason: String::new(),
        timestamp_ms: 0,
    };
    rig.negotiator.vote(&session.id, vote("carol", false)).unwrap();
    let resolution = rig.negotiator.vote(&session.id, vote("dave", false)).unwrap().unwrap();

    assert_eq!(resolution.kind, ResolutionKind::Rejected);
    assert!(rig.negotiator.store().get(&alice_lock.id).is_some(), "holder keeps the lock");
    assert_eq!(rig.negotiator.session(&session.id).unwrap().state, SessionState::Rejected);
}

#[test]
fn cleanup_expires_intents_and_times_out_sessions() {
    let rig = rig();
    let escalations = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&escalations);
    rig.negotiator.set_on_escalate(Box::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    announce(&rig, "alice", range("a.rs", 1, 10));
    acquire(&rig, "bob", range("b.rs", 1, 10));
    let _ = rig
        .negotiator
        .announce_intent(range("b.rs", 5, 20), AgentId::new("carol"), None, "x".into())
        .unwrap_err();

    rig.clock.advance(Duration::from_millis(30_001));
    let (intents, timeouts, _) = rig.negotiator.cleanup();
    assert_eq!(intents, 1);
    assert_eq!(timeouts, 1);
    assert_eq!(escalations.load(Ordering::SeqCst), 1);

    let session = rig.negotiator.open_sessions();
    assert!(session.is_empty(), "timed-out session is resolved");

    // Past retention the resolved session is dropped entirely.
    rig.clock.advance(Duration::from_millis(60 * 60 * 1000 + 1));
    let (_, _, dropped) = rig.negotiator.cleanup();
    assert_eq!(dropped, 1);
}

#[test]
fn remote_mirroring_round_trip() {
    let rig = rig();
    let remote = hive_core::test_support::lock_fixture("zoe", "z.rs", 1, 10, 5, u64::MAX);
    rig.negotiator.handle_remote_acquired(remote.clone());
    assert!(rig.negotiator.store().get(&remote.id).is_some());

    rig.negotiator.handle_remote_released(&remote.id);
    assert!(rig.negotiator.store().get(&remote.id).is_none());
}

#[test]
fn remote_acquired_conflict_fires_callback_not_error() {
    let rig = rig();
    let conflicts_seen = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&conflicts_seen);
    rig.negotiator.set_on_conflict(Box::new(move |_| {
        seen.fetch_add(1, Ordering::SeqCst);
    }));

    let local = acquire(&rig, "alice", range("a.rs", 1, 10));
    let remote = hive_core::test_support::lock_fixture("zoe", "a.rs", 5, 15, 99, u64::MAX);
    rig.negotiator.handle_remote_acquired(remote.clone());

    assert_eq!(conflicts_seen.load(Ordering::SeqCst), 1);
    assert!(rig.negotiator.store().get(&local.id).is_some(), "local lock stands");
    assert!(rig.negotiator.store().get(&remote.id).is_none(), "conflicting mirror not inserted");
}

#[test]
fn remote_intent_expires_via_cleanup() {
    let rig = rig();
    let lock = hive_core::test_support::lock_fixture("zoe", "z.rs", 1, 10, 5, u64::MAX);
    let now = rig.clock.epoch_ms();
    rig.negotiator.handle_remote_intent(lock.clone(), now, now + 5_000);
    assert!(rig.negotiator.intent(&lock.id).is_some());

    rig.clock.advance(Duration::from_millis(5_001));
    rig.negotiator.cleanup();
    assert!(rig.negotiator.intent(&lock.id).is_none());
}

#[test]
fn file_wide_target_blocks_any_range() {
    let rig = rig();
    acquire(&rig, "alice", SemanticTarget::file("a.rs"));
    let err = rig
        .negotiator
        .announce_intent(range("a.rs", 90, 99), AgentId::new("bob"), None, "x".into())
        .unwrap_err();
    assert_eq!(err.code(), "lock_conflict");
    let target = rig.negotiator.open_sessions()[0].conflicting.target.clone();
    assert_eq!(target.kind, TargetKind::File);
}
