// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors from handing a frame to the transport
#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("transport unavailable: {0}")]
    Unavailable(String),
}

/// Hook from the engine to the mesh transport.
///
/// Receives opaque framed messages. Implementations must return without
/// waiting for remote acknowledgement; the engine treats a failure as a
/// network condition to log, never as an operation failure.
pub trait Broadcaster: Send + Sync + 'static {
    fn broadcast(&self, payload: &[u8]) -> Result<(), BroadcastError>;
}

/// Discards every frame. Used before a mesh is joined.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn broadcast(&self, _payload: &[u8]) -> Result<(), BroadcastError> {
        Ok(())
    }
}

/// Queue-backed broadcaster feeding an in-process consumer.
///
/// The daemon's mesh task drains the receiver and pushes frames onto the
/// transport; tests drain it directly. Sends never block: when the queue
/// is full the frame is dropped and counted.
pub struct ChannelBroadcaster {
    tx: mpsc::Sender<Vec<u8>>,
    dropped: Mutex<u64>,
}

impl ChannelBroadcaster {
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new() -> (Self, mpsc::Receiver<Vec<u8>>) {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx, dropped: Mutex::new(0) }, rx)
    }

    /// Frames dropped because the queue was full.
    pub fn dropped(&self) -> u64 {
        *self.dropped.lock()
    }
}

impl Broadcaster for ChannelBroadcaster {
    fn broadcast(&self, payload: &[u8]) -> Result<(), BroadcastError> {
        match self.tx.try_send(payload.to_vec()) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let mut dropped = self.dropped.lock();
                *dropped += 1;
                tracing::warn!(total_dropped = *dropped, "broadcast queue full, frame dropped");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(BroadcastError::Unavailable("mesh consumer gone".into()))
            }
        }
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
