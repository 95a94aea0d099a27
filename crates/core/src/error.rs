// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Categorized coordination errors.
//!
//! Callers branch on [`ErrorCategory`] alone to decide retry/backoff;
//! `code` is a stable token for diagnostics and log grepping, never for
//! control flow. Enrichment helpers return copies so an error built deep
//! in a store can gain lock/file context on the way out.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lock::LockId;

/// How a caller should treat a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad input; retrying the same call can never succeed.
    Validation,
    /// Transport-level failure; the local operation still took effect.
    Network,
    /// Transient contention (conflict, rate limit, expiry); retry with backoff.
    Retryable,
    /// The operation cannot succeed without a different input.
    Permanent,
    /// Invariant violation inside the daemon; opaque to callers.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Validation => "validation",
            ErrorCategory::Network => "network",
            ErrorCategory::Retryable => "retryable",
            ErrorCategory::Permanent => "permanent",
            ErrorCategory::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

/// A categorized coordination error with optional lock/file context.
#[derive(Debug)]
pub struct CoordError {
    code: &'static str,
    message: String,
    category: ErrorCategory,
    lock_id: Option<LockId>,
    file_path: Option<String>,
    cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl CoordError {
    pub fn new(category: ErrorCategory, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            category,
            lock_id: None,
            file_path: None,
            cause: None,
        }
    }

    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Validation, code, message)
    }

    pub fn retryable(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Retryable, code, message)
    }

    pub fn permanent(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Permanent, code, message)
    }

    pub fn network(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Network, code, message)
    }

    pub fn internal(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(ErrorCategory::Internal, code, message)
    }

    /// Enriched copy carrying the lock the failure concerns.
    pub fn with_lock_id(mut self, id: LockId) -> Self {
        self.lock_id = Some(id);
        self
    }

    /// Enriched copy carrying the file path the failure concerns.
    pub fn with_file_path(mut self, path: impl Into<String>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Enriched copy wrapping an underlying cause.
    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn lock_id(&self) -> Option<&LockId> {
        self.lock_id.as_ref()
    }

    pub fn file_path(&self) -> Option<&str> {
        self.file_path.as_deref()
    }

    pub fn is_retryable(&self) -> bool {
        self.category == ErrorCategory::Retryable
    }

    pub fn is_validation(&self) -> bool {
        self.category == ErrorCategory::Validation
    }

    pub fn is_network(&self) -> bool {
        self.category == ErrorCategory::Network
    }
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(id) = &self.lock_id {
            write!(f, " lock={id}")?;
        }
        if let Some(path) = &self.file_path {
            write!(f, " path={path}")?;
        }
        Ok(())
    }
}

impl StdError for CoordError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|cause| &**cause as &(dyn StdError + 'static))
    }
}

/// Walk the wrap chain looking for a [`CoordError`]; apply `pred` to the
/// first one found.
fn chain_category(err: &(dyn StdError + 'static), pred: fn(ErrorCategory) -> bool) -> bool {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(coord) = e.downcast_ref::<CoordError>() {
            return pred(coord.category());
        }
        current = e.source();
    }
    false
}

/// True if any error in the wrap chain is a retryable [`CoordError`].
pub fn is_retryable(err: &(dyn StdError + 'static)) -> bool {
    chain_category(err, |c| c == ErrorCategory::Retryable)
}

/// True if any error in the wrap chain is a validation [`CoordError`].
pub fn is_validation(err: &(dyn StdError + 'static)) -> bool {
    chain_category(err, |c| c == ErrorCategory::Validation)
}

/// True if any error in the wrap chain is a network [`CoordError`].
pub fn is_network(err: &(dyn StdError + 'static)) -> bool {
    chain_category(err, |c| c == ErrorCategory::Network)
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
