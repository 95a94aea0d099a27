// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hive-wire: message formats at the daemon's two edges.
//!
//! Client edge: length-prefixed JSON requests/responses over the unix
//! socket (4-byte big-endian prefix). Mesh edge: the [`PeerMessage`]
//! envelope carried by whatever transport the daemon is wired to, plus
//! base64 invite tokens for joining a mesh.

mod invite;
mod mesh;
mod request;
mod response;
mod wire;

pub use invite::{InviteError, InviteToken, VpnBootstrap};
pub use mesh::PeerMessage;
pub use request::{InterestSpec, Request};
pub use response::{DaemonStatus, LockGrant, Response};
pub use wire::{
    decode, encode, read_message, write_message, ProtocolError, MAX_MESSAGE_SIZE,
    PROTOCOL_VERSION,
};
pub use wire::{read_request, write_response};
