// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::clock::FakeClock;
use crate::test_support::{file_lock_fixture, lock_fixture};
use std::time::Duration;

const FAR: u64 = u64::MAX;

fn store() -> (FakeClock, LockStore<FakeClock>) {
    let clock = FakeClock::new();
    (clock.clone(), LockStore::with_clock(clock))
}

#[test]
fn add_then_get() {
    let (_, store) = store();
    let lock = lock_fixture("alice", "a.rs", 10, 50, 1, FAR);
    store.add(lock.clone()).unwrap();
    assert_eq!(store.get(&lock.id), Some(lock));
    assert_eq!(store.len(), 1);
}

#[test]
fn add_rejects_overlap() {
    let (_, store) = store();
    store.add(lock_fixture("alice", "a.rs", 10, 50, 1, FAR)).unwrap();
    let err = store.add(lock_fixture("bob", "a.rs", 30, 70, 2, FAR)).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.code(), "lock_conflict");
    assert_eq!(err.file_path(), Some("a.rs"));
    assert_eq!(store.len(), 1);
}

#[test]
fn disjoint_ranges_coexist() {
    let (_, store) = store();
    store.add(lock_fixture("alice", "a.rs", 10, 20, 1, FAR)).unwrap();
    store.add(lock_fixture("bob", "a.rs", 21, 30, 2, FAR)).unwrap();
    store.add(lock_fixture("carol", "b.rs", 10, 20, 3, FAR)).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.list_by_file("a.rs").len(), 2);
}

#[test]
fn no_two_active_locks_overlap() {
    // Invariant check across a mixed history.
    let (_, store) = store();
    store.add(file_lock_fixture("alice", "a.rs", 1, FAR)).unwrap();
    assert!(store.add(lock_fixture("bob", "a.rs", 1, 2, 2, FAR)).is_err());
    store.add(lock_fixture("bob", "b.rs", 1, 2, 3, FAR)).unwrap();
    let all = store.list_all();
    for (i, a) in all.iter().enumerate() {
        for b in &all[i + 1..] {
            assert!(!a.target.conflicts_with(&b.target));
        }
    }
}

#[test]
fn remove_clears_indices() {
    let (_, store) = store();
    let lock = lock_fixture("alice", "a.rs", 10, 50, 1, FAR);
    store.add(lock.clone()).unwrap();
    let removed = store.remove(&lock.id).unwrap();
    assert_eq!(removed.id, lock.id);
    assert!(store.get(&lock.id).is_none());
    assert!(store.list_by_holder(&AgentId::new("alice")).is_empty());
    assert!(store.list_by_file("a.rs").is_empty());
    // Freed range can be relocked.
    store.add(lock_fixture("bob", "a.rs", 10, 50, 2, FAR)).unwrap();
}

#[test]
fn acquire_release_round_trip_leaves_store_unchanged() {
    let (_, store) = store();
    store.add(lock_fixture("carol", "other.rs", 1, 5, 1, FAR)).unwrap();
    let before = store.list_all();

    let lock = lock_fixture("alice", "a.rs", 10, 50, 2, FAR);
    store.add(lock.clone()).unwrap();
    store.remove(&lock.id);

    assert_eq!(store.list_all(), before);
}

#[test]
fn expired_locks_are_invisible_and_reaped() {
    let (clock, store) = store();
    let deadline = clock.epoch_ms() + 1_000;
    let lock = lock_fixture("alice", "a.rs", 10, 50, 1, deadline);
    store.add(lock.clone()).unwrap();

    clock.advance(Duration::from_millis(1_001));
    assert!(store.get(&lock.id).is_none());
    assert!(store.find_conflicts(&lock.target).is_empty());
    assert_eq!(store.len(), 0);

    // Expired holder no longer blocks a new acquisition.
    store.add(lock_fixture("bob", "a.rs", 10, 50, 2, FAR)).unwrap();

    assert_eq!(store.reap_expired(), 1);
    assert_eq!(store.list_by_file("a.rs").len(), 1);
}

#[test]
fn find_conflicts_returns_only_overlapping() {
    let (_, store) = store();
    store.add(lock_fixture("alice", "a.rs", 10, 20, 1, FAR)).unwrap();
    store.add(lock_fixture("bob", "a.rs", 40, 50, 2, FAR)).unwrap();
    let target = crate::target::SemanticTarget::line_range("a.rs", 15, 45);
    let conflicts = store.find_conflicts(&target);
    assert_eq!(conflicts.len(), 2);
    let narrow = crate::target::SemanticTarget::line_range("a.rs", 22, 30);
    assert!(store.find_conflicts(&narrow).is_empty());
}

#[test]
fn list_by_holder_groups() {
    let (_, store) = store();
    store.add(lock_fixture("alice", "a.rs", 1, 5, 1, FAR)).unwrap();
    store.add(lock_fixture("alice", "b.rs", 1, 5, 2, FAR)).unwrap();
    store.add(lock_fixture("bob", "c.rs", 1, 5, 3, FAR)).unwrap();
    assert_eq!(store.list_by_holder(&AgentId::new("alice")).len(), 2);
    assert_eq!(store.list_by_holder(&AgentId::new("bob")).len(), 1);
    assert!(store.list_by_holder(&AgentId::new("nobody")).is_empty());
}

#[test]
fn update_mutates_under_writer_lock() {
    let (_, store) = store();
    let lock = lock_fixture("alice", "a.rs", 1, 5, 1, FAR);
    store.add(lock.clone()).unwrap();
    let (updated, ()) = store
        .update(&lock.id, |l| {
            l.intention = "new plan".into();
        })
        .unwrap();
    assert_eq!(updated.intention, "new plan");
    assert_eq!(store.get(&lock.id).unwrap().intention, "new plan");
    assert!(store.update(&LockId::new(), |_| ()).is_none());
}
