// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-peer token-bucket admission control.
//!
//! Buckets refill lazily on each call; nothing ever blocks. A peer's first
//! call creates its bucket already debited, so burst capacity counts the
//! admitting call itself.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::CoordError;

/// Token-bucket tuning.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Tokens added per second.
    pub rate: f64,
    /// Bucket capacity.
    pub burst: f64,
    /// Buckets untouched this long are dropped by [`RateLimiter::cleanup`].
    pub idle: std::time::Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { rate: 10.0, burst: 20.0, idle: std::time::Duration::from_secs(300) }
    }
}

/// Point-in-time limiter stats.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct RateLimiterStats {
    pub active_peers: usize,
    pub rate: f64,
    pub burst: f64,
}

struct Bucket {
    tokens: f64,
    last: std::time::Instant,
}

/// Lazy-refill token buckets keyed by peer ID.
pub struct RateLimiter<C: Clock = SystemClock> {
    config: RateLimiterConfig,
    clock: C,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter<SystemClock> {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> Self {
        Self { config, clock, buckets: Mutex::new(HashMap::new()) }
    }

    /// Admit one request from `peer` if a token is available.
    pub fn allow(&self, peer: &str) -> bool {
        self.allow_n(peer, 1.0).unwrap_or(false)
    }

    /// Admit a request costing `n` tokens.
    ///
    /// Errs retryable only when `n` exceeds the bucket capacity — such a
    /// request could never be admitted.
    pub fn allow_n(&self, peer: &str, n: f64) -> Result<bool, CoordError> {
        if n > self.config.burst {
            return Err(CoordError::retryable(
                "rate_limited",
                format!("requested {n} tokens exceeds burst {}", self.config.burst),
            ));
        }
        let now = self.clock.now();
        let mut buckets = self.buckets.lock();
        match buckets.get_mut(peer) {
            Some(bucket) => {
                let elapsed = now.duration_since(bucket.last).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.config.rate).min(self.config.burst);
                bucket.last = now;
                if bucket.tokens >= n {
                    bucket.tokens -= n;
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            None => {
                buckets.insert(
                    peer.to_string(),
                    Bucket { tokens: self.config.burst - n, last: now },
                );
                Ok(true)
            }
        }
    }

    /// Drop buckets idle past the configured interval.
    /// Returns how many were dropped.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let mut buckets = self.buckets.lock();
        let before = buckets.len();
        buckets.retain(|_, b| now.duration_since(b.last) < self.config.idle);
        before - buckets.len()
    }

    pub fn stats(&self) -> RateLimiterStats {
        RateLimiterStats {
            active_peers: self.buckets.lock().len(),
            rate: self.config.rate,
            burst: self.config.burst,
        }
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
