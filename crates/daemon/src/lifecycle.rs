// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: configuration, startup, shutdown wiring.

use std::fs::File;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use hive_adapters::{ChannelBroadcaster, DesktopNotifier};
use hive_engine::{spawn_maintenance, MaintenanceConfig};

use crate::coord::Coord;
use crate::env;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/hive)
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
}

impl Config {
    /// Load configuration for the user-level daemon.
    ///
    /// Uses fixed paths under `~/.local/state/hive/` (or
    /// `$XDG_STATE_HOME/hive/`). One daemon serves all projects for a user.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        Ok(Self {
            socket_path: state_dir.join("hived.sock"),
            lock_path: state_dir.join("hived.pid"),
            log_path: state_dir.join("hived.log"),
            state_dir,
        })
    }

    /// Config rooted at an explicit directory (tests, sandboxes).
    pub fn rooted_at(state_dir: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("hived.sock"),
            lock_path: state_dir.join("hived.pid"),
            log_path: state_dir.join("hived.log"),
            state_dir,
        }
    }
}

fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("XDG_STATE_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir).join("hive"));
        }
    }
    dirs::home_dir()
        .map(|home| home.join(".local").join("state").join("hive"))
        .ok_or(LifecycleError::NoHome)
}

/// Errors from daemon startup
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("cannot determine home directory")]
    NoHome,

    #[error("another daemon already holds {0}")]
    LockFailed(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Running daemon state handed to `main`.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub coord: Arc<Coord>,
    pub listener: UnixListener,
    pub cancel: CancellationToken,
    pub maintenance: Vec<JoinHandle<()>>,
    /// Outbound mesh frames for the transport to drain.
    pub mesh_frames: tokio::sync::mpsc::Receiver<Vec<u8>>,
}

impl std::fmt::Debug for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonState")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Bring the daemon up: pid lock, socket, engine, env interests,
/// maintenance loops.
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Open without truncating: a running daemon's pid must survive a
    // failed second start.
    let mut lock_file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&config.lock_path)?;
    if lock_file.try_lock_exclusive().is_err() {
        return Err(LifecycleError::LockFailed(config.lock_path.clone()));
    }
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    // A previous unclean exit can leave the socket file behind; the pid
    // lock above proves nobody is listening on it.
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)?;

    let agent_name = env::agent_name();
    let coord = Coord::new(agent_name.clone());
    info!(node = %coord.node_id, agent = %agent_name, "engine up");

    let (broadcaster, mesh_frames) = ChannelBroadcaster::new();
    coord.set_broadcaster(Arc::new(broadcaster));
    coord.notifications.add_notifier(Arc::new(DesktopNotifier::new()));

    if let Some(interest) = env::initial_interest(&agent_name) {
        match coord.router.register_interest(interest) {
            Ok(interest) => info!(id = %interest.id, "environment interest registered"),
            Err(err) => tracing::warn!(%err, "environment interest rejected"),
        }
    }

    let cancel = CancellationToken::new();
    let maintenance = spawn_maintenance(
        Arc::clone(&coord.log),
        Arc::clone(&coord.store),
        Arc::clone(&coord.negotiator),
        Arc::clone(&coord.notifications),
        Arc::clone(&coord.limiter),
        MaintenanceConfig::default(),
        cancel.clone(),
    );

    Ok(DaemonState {
        config: config.clone(),
        lock_file,
        coord,
        listener,
        cancel,
        maintenance,
        mesh_frames,
    })
}

/// Remove the socket and pid files on clean shutdown.
pub fn cleanup(config: &Config) {
    let _ = std::fs::remove_file(&config.socket_path);
    let _ = std::fs::remove_file(&config.lock_path);
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
