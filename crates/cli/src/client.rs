// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket client: one request, one response.

use std::fmt;
use std::path::Path;

use tokio::net::UnixStream;

use hive_wire::{decode, encode, read_message, write_message, ProtocolError, Request, Response};

/// Errors surfaced to the terminal.
#[derive(Debug)]
pub enum ClientError {
    /// The daemon is not running or its socket is gone.
    NotRunning,
    Protocol(ProtocolError),
    /// The daemon answered with an error response.
    Daemon { category: String, code: String, message: String },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::NotRunning => {
                write!(f, "hived is not running (start it with `hived`)")
            }
            ClientError::Protocol(e) => write!(f, "protocol error: {e}"),
            ClientError::Daemon { category, code, message } => {
                write!(f, "{message} ({code}, {category})")
            }
        }
    }
}

impl std::error::Error for ClientError {}

impl From<ProtocolError> for ClientError {
    fn from(e: ProtocolError) -> Self {
        ClientError::Protocol(e)
    }
}

/// Send one request to the daemon and return its response.
///
/// `Response::Error` is lifted into `ClientError::Daemon` so callers
/// only ever match success variants.
pub async fn request(socket_path: &Path, request: &Request) -> Result<Response, ClientError> {
    let mut stream =
        UnixStream::connect(socket_path).await.map_err(|_| ClientError::NotRunning)?;
    let bytes = encode(request)?;
    write_message(&mut stream, &bytes).await?;
    let response: Response = decode(&read_message(&mut stream).await?)?;
    match response {
        Response::Error { category, code, message } => Err(ClientError::Daemon {
            category: category.to_string(),
            code,
            message,
        }),
        other => Ok(other),
    }
}
