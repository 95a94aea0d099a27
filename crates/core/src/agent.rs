// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent and node identifier types.
//!
//! An [`AgentId`] names a coding agent (an LLM worker) as presented by its
//! client; the format is opaque to the daemon. A [`NodeId`] names a daemon
//! process in the mesh and is minted once at startup.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::define_id;

/// Unique identifier for a coding agent.
///
/// Holder IDs on locks and source IDs on events are AgentIds. Clients pick
/// their own; the daemon only requires them to be non-empty where a holder
/// is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    /// Create a new AgentId from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the string value of this AgentId.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl PartialEq<str> for AgentId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for AgentId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl Borrow<str> for AgentId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

define_id! {
    /// Identity of a daemon process in the mesh.
    pub struct NodeId("node-");
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
