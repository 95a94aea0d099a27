// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment intake.
//!
//! `AGENT_NAME` names the local agent (source/holder default);
//! `AGENT_COLLAB_INTERESTS` is a comma-separated glob list registered as
//! one Direct-level interest at startup. Both are read once.

use hive_core::{AgentId, Interest, InterestId, InterestLevel};

pub const AGENT_NAME_VAR: &str = "AGENT_NAME";
pub const INTERESTS_VAR: &str = "AGENT_COLLAB_INTERESTS";

/// The local agent's display name, "unknown" when unset or blank.
pub fn agent_name() -> String {
    match std::env::var(AGENT_NAME_VAR) {
        Ok(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => "unknown".to_string(),
    }
}

/// Glob patterns from `AGENT_COLLAB_INTERESTS`, blanks dropped.
pub fn interest_patterns() -> Vec<String> {
    match std::env::var(INTERESTS_VAR) {
        Ok(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// The startup interest from the environment, if any patterns are set.
///
/// Registered at Direct level with the manager's default TTL (expiry
/// left at zero for the manager to fill in).
pub fn initial_interest(agent_name: &str) -> Option<Interest> {
    let patterns = interest_patterns();
    if patterns.is_empty() {
        return None;
    }
    Some(Interest {
        id: InterestId::from_string(""),
        agent_id: AgentId::new(agent_name),
        agent_name: agent_name.to_string(),
        patterns,
        track_dependencies: false,
        level: InterestLevel::Direct,
        created_at_ms: 0,
        expires_at_ms: 0,
        metadata: Default::default(),
        remote: false,
        node_id: None,
    })
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
