// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hive CLI (hive)
//!
//! Thin client over the daemon's unix socket. Every subcommand maps to
//! one request; output is plain text or `--json`.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod output;

use std::collections::HashMap;

use clap::{Args, Parser, Subcommand};

use hive_core::{AgentId, EventFilter, InterestLevel, Proposal};
use hive_daemon::lifecycle::Config;
use hive_wire::{InterestSpec, Request, Response};

#[derive(Parser)]
#[command(name = "hive", version, about = "Peer coordination for autonomous coding agents")]
struct Cli {
    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the daemon is alive
    Ping,
    /// Create a mesh for a project and print the invite token
    Init {
        /// Project name
        project: String,
    },
    /// Join a mesh via invite token
    Join {
        /// Token printed by `hive init`
        token: String,
    },
    /// Semantic lock operations
    #[command(subcommand)]
    Lock(LockCommand),
    /// Register file-pattern interests for an agent
    Interest(InterestArgs),
    /// Share a context document with the mesh
    Context {
        /// File path the context concerns
        file: String,
        /// Document body
        #[arg(long)]
        content: String,
        /// Acting agent id (defaults to $AGENT_NAME)
        #[arg(long)]
        agent: Option<String>,
    },
    /// List events visible to an agent
    Events {
        /// Acting agent id (defaults to $AGENT_NAME)
        #[arg(long)]
        agent: Option<String>,
        /// Bypass interest matching
        #[arg(long)]
        all: bool,
        /// Cap the number of events
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Answer a pending notification
    Respond {
        /// Notification id
        notification: String,
        /// Chosen action id
        action: String,
    },
    /// Graceful departure
    Leave {
        /// Report the departure state instead of starting one
        #[arg(long)]
        status: bool,
    },
    /// Daemon status summary
    Status,
    /// Stop the daemon
    Shutdown,
}

#[derive(Subcommand)]
enum LockCommand {
    /// Acquire a lock on a file or line range
    Acquire {
        /// File path
        file: String,
        /// First line of the range (inclusive)
        #[arg(long)]
        start: Option<u32>,
        /// Last line of the range (inclusive)
        #[arg(long)]
        end: Option<u32>,
        /// Why the lock is needed
        #[arg(long, default_value = "")]
        intention: String,
        /// Acting agent id (defaults to $AGENT_NAME)
        #[arg(long)]
        agent: Option<String>,
    },
    /// Release a held lock
    Release {
        /// Lock id
        lock: String,
        /// Acting agent id (defaults to $AGENT_NAME)
        #[arg(long)]
        agent: Option<String>,
    },
    /// Renew a held lock's lease
    Renew {
        /// Lock id
        lock: String,
        /// Acting agent id (defaults to $AGENT_NAME)
        #[arg(long)]
        agent: Option<String>,
    },
    /// List active locks
    List,
    /// Offer a proposal on an open negotiation session
    Negotiate {
        /// Session id from the conflict error or `hive lock sessions`
        session: String,
        #[command(subcommand)]
        proposal: ProposalCommand,
    },
    /// List open negotiation sessions
    Sessions,
}

#[derive(Subcommand)]
enum ProposalCommand {
    /// The named holder's lock steps aside
    Yield {
        /// Agent giving up its claim
        agent: String,
    },
    /// Divide the contested range at a line
    Split {
        /// The held lock keeps lines before this; the requested lock
        /// starts here
        line: u32,
    },
    /// Higher fencing token wins, ties broken by node id
    Priority,
    /// Hand the conflict to a human
    Escalate {
        /// Why the conflict cannot be settled automatically
        reason: String,
    },
}

impl From<ProposalCommand> for Proposal {
    fn from(command: ProposalCommand) -> Self {
        match command {
            ProposalCommand::Yield { agent } => Proposal::Yield { yielder: AgentId::new(agent) },
            ProposalCommand::Split { line } => Proposal::Split { split_point: line },
            ProposalCommand::Priority => Proposal::Priority,
            ProposalCommand::Escalate { reason } => Proposal::Escalate { reason },
        }
    }
}

#[derive(Args)]
struct InterestArgs {
    /// Glob pattern; repeatable
    #[arg(long = "pattern", required = true)]
    patterns: Vec<String>,
    /// Delivery level
    #[arg(long, default_value = "direct", value_parser = parse_level)]
    level: InterestLevel,
    /// Also match files the interesting files depend on
    #[arg(long)]
    track_deps: bool,
    /// Override the default TTL, in seconds
    #[arg(long)]
    ttl: Option<u64>,
    /// Acting agent id (defaults to $AGENT_NAME)
    #[arg(long)]
    agent: Option<String>,
}

fn parse_level(s: &str) -> Result<InterestLevel, String> {
    match s {
        "all" => Ok(InterestLevel::All),
        "direct" => Ok(InterestLevel::Direct),
        "locks-only" | "locks_only" => Ok(InterestLevel::LocksOnly),
        "none" => Ok(InterestLevel::None),
        other => Err(format!("unknown level {other:?} (all, direct, locks-only, none)")),
    }
}

fn agent_or_env(agent: Option<String>) -> AgentId {
    match agent {
        Some(agent) => AgentId::new(agent),
        None => AgentId::new(hive_daemon::env::agent_name()),
    }
}

fn to_request(command: Command) -> Request {
    match command {
        Command::Ping => Request::Ping,
        Command::Init { project } => Request::Init { project },
        Command::Join { token } => Request::Join { token },
        Command::Lock(lock) => match lock {
            LockCommand::Acquire { file, start, end, intention, agent } => Request::LockAcquire {
                file_path: file,
                start_line: start,
                end_line: end,
                intention,
                holder_id: agent_or_env(agent),
                holder_name: None,
            },
            LockCommand::Release { lock, agent } => Request::LockRelease {
                lock_id: lock.as_str().into(),
                holder_id: agent_or_env(agent),
            },
            LockCommand::Renew { lock, agent } => Request::LockRenew {
                lock_id: lock.as_str().into(),
                holder_id: agent_or_env(agent),
            },
            LockCommand::List => Request::LockList,
            LockCommand::Negotiate { session, proposal } => Request::Negotiate {
                session_id: session.as_str().into(),
                proposal: proposal.into(),
            },
            LockCommand::Sessions => Request::SessionList,
        },
        Command::Interest(args) => {
            let agent_id = agent_or_env(args.agent);
            Request::InterestRegister {
                agent_name: agent_id.to_string(),
                agent_id,
                spec: InterestSpec {
                    patterns: args.patterns,
                    track_dependencies: args.track_deps,
                    level: args.level,
                    ttl_secs: args.ttl,
                    metadata: HashMap::new(),
                },
            }
        }
        Command::Context { file, content, agent } => Request::ContextShare {
            agent_id: agent_or_env(agent),
            file_path: file,
            content,
            metadata: HashMap::new(),
        },
        Command::Events { agent, all, limit } => Request::Events {
            agent_id: agent_or_env(agent),
            filter: EventFilter { include_all: all, limit: Some(limit), ..Default::default() },
        },
        Command::Respond { notification, action } => Request::NotifyRespond {
            notification_id: notification.as_str().into(),
            action_id: action,
            data: HashMap::new(),
        },
        Command::Leave { status: true } => Request::LeaveStatus,
        Command::Leave { status: false } => Request::LeaveStart,
        Command::Status => Request::Status,
        Command::Shutdown => Request::Shutdown,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json = cli.json;
    let request = to_request(cli.command);

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    match client::request(&config.socket_path, &request).await {
        Ok(response) => output::print(&response, json),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
