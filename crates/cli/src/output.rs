// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal rendering for daemon responses.

use hive_wire::Response;

/// Print a response: human-readable by default, raw JSON on request.
pub fn print(response: &Response, json: bool) {
    if json {
        match serde_json::to_string_pretty(response) {
            Ok(body) => println!("{body}"),
            Err(e) => eprintln!("error: cannot render response: {e}"),
        }
        return;
    }
    match response {
        Response::Pong => println!("pong"),
        Response::Hello { version } => println!("hived {version}"),
        Response::Ok => println!("ok"),
        Response::Error { category, code, message } => {
            println!("error: {message} ({code}, {category})")
        }
        Response::InitOk { project, node_id, token } => {
            println!("mesh '{project}' created (node {node_id})");
            println!("invite token:");
            println!("{token}");
        }
        Response::JoinOk { project, connected_peers } => {
            println!("joined '{project}' ({connected_peers} peer(s))");
        }
        Response::LockAcquired { grant } => {
            println!(
                "{}  token={}  expires_at_ms={}",
                grant.lock_id, grant.fencing_token, grant.expires_at_ms
            );
        }
        Response::Locks { locks } => {
            if locks.is_empty() {
                println!("no active locks");
                return;
            }
            for lock in locks {
                println!(
                    "{}  {}  holder={}  token={}  {:?}",
                    lock.id, lock.target, lock.holder_id, lock.fencing_token, lock.intention
                );
            }
        }
        Response::Negotiated { resolution } => {
            print!("{}", resolution.kind);
            if let Some(winner) = &resolution.winner {
                print!("  winner={winner}");
            }
            println!("  {}", resolution.detail);
        }
        Response::Sessions { sessions } => {
            if sessions.is_empty() {
                println!("no open sessions");
                return;
            }
            for session in sessions {
                println!(
                    "{}  {}  {} wants {} held by {}  votes={}/{}",
                    session.id,
                    session.state,
                    session.requested.holder_id,
                    session.requested.target,
                    session.conflicting.holder_id,
                    session.votes.len(),
                    session.required_votes
                );
            }
        }
        Response::InterestRegistered { interest } => {
            println!("{}  patterns={}", interest.id, interest.patterns.join(","));
        }
        Response::Events { events } => {
            if events.is_empty() {
                println!("no events");
                return;
            }
            for event in events {
                match &event.file_path {
                    Some(path) => {
                        println!("{}  {}  {}  {}", event.id, event.kind, event.source_id, path)
                    }
                    None => println!("{}  {}  {}", event.id, event.kind, event.source_id),
                }
            }
        }
        Response::LeaveStatus { status } => {
            print!("{}", status.phase);
            if let Some(duration_ms) = status.duration_ms {
                print!("  took={duration_ms}ms  released={}", status.locks_released);
            }
            if let Some(error) = &status.error {
                print!("  error={error}");
            }
            println!();
        }
        Response::Status { status } => {
            println!("hived {}  node={}", status.version, status.node_id);
            if let Some(project) = &status.project {
                println!("project: {project}");
            }
            println!(
                "locks={}  interests={}  pending={}  events={}  peers={}",
                status.active_locks,
                status.interests,
                status.pending_notifications,
                status.event_log_size,
                status.connected_peers
            );
        }
        Response::ShuttingDown => println!("shutting down"),
    }
}
