// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fencing token source.
//!
//! One strictly monotonic 64-bit counter per daemon process. Every lock
//! minted by this daemon carries a token greater than every token issued
//! before it, so a downstream consumer can reject stale holders by numeric
//! comparison alone. Tokens are only unique per daemon; cross-daemon ties
//! are broken by the `(token, node_id)` ordering in [`fence_order`].

use std::sync::atomic::{AtomicU64, Ordering};

use crate::agent::NodeId;

/// Strictly monotonic token counter for a single daemon process.
#[derive(Debug, Default)]
pub struct FencingTokenSource {
    next: AtomicU64,
}

impl FencingTokenSource {
    pub fn new() -> Self {
        Self { next: AtomicU64::new(0) }
    }

    /// Resume counting above tokens observed from a previous holder.
    pub fn starting_at(first: u64) -> Self {
        Self { next: AtomicU64::new(first.saturating_sub(1)) }
    }

    /// Mint the next token. Each call returns a value strictly greater
    /// than every previous return from this source.
    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The most recently minted token, 0 if none yet.
    pub fn last(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

/// Total order over `(fencing_token, node_id)` pairs used to break ties
/// between locks minted by different daemons. Greater wins a priority
/// negotiation.
pub fn fence_order(a: (u64, &NodeId), b: (u64, &NodeId)) -> std::cmp::Ordering {
    a.0.cmp(&b.0).then_with(|| a.1.as_str().cmp(b.1.as_str()))
}

#[cfg(test)]
#[path = "fence_tests.rs"]
mod tests;
