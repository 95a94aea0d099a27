// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Invite tokens for joining a mesh.
//!
//! A token is url-safe base64 over canonical JSON: addresses to dial, the
//! project name, creator identity, and validity window, with an optional
//! VPN bootstrap block. The daemon validates expiry on decode; transports
//! treat the token as an opaque string.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use hive_core::NodeId;

/// Errors from token decode/validation
#[derive(Debug, Error)]
pub enum InviteError {
    #[error("not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("not a valid token payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("token expired at {expired_at_ms}")]
    Expired { expired_at_ms: u64 },
}

/// Optional VPN bootstrap carried for meshes behind an overlay network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VpnBootstrap {
    pub endpoint: String,
    pub public_key: String,
}

/// Decoded invite token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InviteToken {
    pub project: String,
    pub creator: NodeId,
    /// Multiaddr-style strings the joining daemon should dial.
    pub addresses: Vec<String>,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpn: Option<VpnBootstrap>,
}

impl InviteToken {
    /// Default validity window: 24 hours.
    pub const DEFAULT_VALIDITY_MS: u64 = 24 * 60 * 60 * 1000;

    pub fn new(
        project: impl Into<String>,
        creator: NodeId,
        addresses: Vec<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            project: project.into(),
            creator,
            addresses,
            created_at_ms: now_ms,
            expires_at_ms: now_ms + Self::DEFAULT_VALIDITY_MS,
            vpn: None,
        }
    }

    /// Encode to the opaque string handed to humans.
    pub fn encode(&self) -> Result<String, InviteError> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode and validate against `now_ms`.
    pub fn decode(token: &str, now_ms: u64) -> Result<Self, InviteError> {
        let json = URL_SAFE_NO_PAD.decode(token.trim())?;
        let decoded: Self = serde_json::from_slice(&json)?;
        if now_ms >= decoded.expires_at_ms {
            return Err(InviteError::Expired { expired_at_ms: decoded.expires_at_ms });
        }
        Ok(decoded)
    }
}

#[cfg(test)]
#[path = "invite_tests.rs"]
mod tests;
