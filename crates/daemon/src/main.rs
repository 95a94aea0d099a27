// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hive daemon (hived)
//!
//! Background process coordinating autonomous coding agents over a peer
//! mesh: semantic locks, interest-routed events, human escalation.
//!
//! Architecture:
//! - Listener task: spawned task handling socket I/O, one engine call per request
//! - Maintenance tasks: compaction and cleanup loops under one cancellation token
//! - Mesh pump: drains outbound frames for the transport

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{error, info};

use hive_daemon::lifecycle::{self, Config, LifecycleError};
use hive_daemon::listener::{ListenCtx, Listener};
use hive_daemon::{mesh, Coord};
use hive_engine::run_leave;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("hived {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("hived {}", env!("CARGO_PKG_VERSION"));
                println!("Hive daemon - peer coordination for autonomous coding agents");
                println!();
                println!("USAGE:");
                println!("    hived");
                println!();
                println!("The daemon is typically started by the `hive` CLI and should not");
                println!("be invoked directly. It listens on a Unix socket for commands");
                println!("from `hive`.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: hived [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;
    let _log_guard = setup_logging(&config)?;

    info!("starting hive daemon");
    let state = match lifecycle::startup(&config).await {
        Ok(state) => state,
        Err(LifecycleError::LockFailed(path)) => {
            eprintln!("another hived is already running (lock: {})", path.display());
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let shutdown = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx { coord: Arc::clone(&state.coord), shutdown: Arc::clone(&shutdown) });
    let listener_task = tokio::spawn(Listener::new(state.listener, ctx).run());
    let pump_task = tokio::spawn(mesh::run_outbound_pump(state.mesh_frames));

    wait_for_shutdown(&shutdown).await;
    info!("shutdown requested");

    depart(&state.coord).await;

    state.cancel.cancel();
    for handle in state.maintenance {
        if let Err(e) = handle.await {
            error!("maintenance task panicked: {e}");
        }
    }
    listener_task.abort();
    pump_task.abort();
    lifecycle::cleanup(&config);
    info!("bye");
    Ok(())
}

/// Block until a Shutdown request or a termination signal arrives.
async fn wait_for_shutdown(shutdown: &Notify) {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("cannot install SIGTERM handler: {e}");
            shutdown.notified().await;
            return;
        }
    };
    tokio::select! {
        _ = shutdown.notified() => {}
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

/// Best-effort graceful departure before the process exits.
async fn depart(coord: &Arc<Coord>) {
    let broadcaster = coord.broadcaster.read().clone();
    let result = run_leave(
        &coord.leave,
        &coord.negotiator,
        &coord.router,
        broadcaster,
        &coord.agent_name,
        "daemon shutdown",
        &coord.clock,
    )
    .await;
    if let Err(e) = result {
        error!("departure failed: {e}");
    }
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.state_dir)?;
    let file_appender = tracing_appender::rolling::never(
        &config.state_dir,
        config
            .log_path
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("hived.log")),
    );
    let (writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(guard)
}
