// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts unix-socket connections and serves length-prefixed JSON
//! requests, each dispatched onto one engine operation. Connections are
//! handled in spawned tasks so a slow client never blocks the accept
//! loop.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use hive_core::{AgentId, Clock, CoordError, Interest, InterestId, SemanticTarget};
use hive_engine::run_leave;
use hive_wire::{
    read_request, write_response, DaemonStatus, InterestSpec, InviteToken, LockGrant,
    ProtocolError, Request, Response, PROTOCOL_VERSION,
};

use crate::coord::Coord;

/// Shared context for all request handlers.
pub struct ListenCtx {
    pub coord: Arc<Coord>,
    pub shutdown: Arc<Notify>,
}

/// Listener task accepting socket connections.
pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Run the accept loop until the task is aborted, spawning a handler
    /// per connection.
    pub async fn run(self) {
        loop {
            match self.unix.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        let (reader, writer) = stream.into_split();
                        if let Err(e) = handle_connection(reader, writer, &ctx).await {
                            log_connection_error(e);
                        }
                    });
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

fn log_connection_error(err: ProtocolError) {
    match err {
        ProtocolError::ConnectionClosed => debug!("connection closed"),
        other => warn!("connection error: {}", other),
    }
}

/// Serve one connection: request, response, repeat until close.
pub async fn handle_connection<R, W>(
    mut reader: R,
    mut writer: W,
    ctx: &Arc<ListenCtx>,
) -> Result<(), ProtocolError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let request = match read_request(&mut reader).await {
            Ok(request) => request,
            Err(ProtocolError::ConnectionClosed) => return Ok(()),
            Err(e) => return Err(e),
        };
        let shutdown = matches!(request, Request::Shutdown);
        let response = dispatch(request, ctx).await;
        write_response(&mut writer, &response).await?;
        if shutdown {
            ctx.shutdown.notify_one();
            return Ok(());
        }
    }
}

/// Map one request onto the engine.
pub async fn dispatch(request: Request, ctx: &Arc<ListenCtx>) -> Response {
    let coord = &ctx.coord;
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            debug!(client_version = %version, "hello");
            Response::Hello { version: PROTOCOL_VERSION.to_string() }
        }

        Request::Init { project } => {
            *coord.project.write() = Some(project.clone());
            let token = InviteToken::new(
                project.clone(),
                coord.node_id,
                vec![format!("/p2p/{}", coord.node_id)],
                coord.clock.epoch_ms(),
            );
            match token.encode() {
                Ok(token) => {
                    info!(%project, "mesh initialized");
                    Response::InitOk { project, node_id: coord.node_id, token }
                }
                Err(err) => Response::Error {
                    category: hive_core::ErrorCategory::Internal,
                    code: "token_encode".into(),
                    message: err.to_string(),
                },
            }
        }

        Request::Join { token } => match InviteToken::decode(&token, coord.clock.epoch_ms()) {
            Ok(invite) => {
                *coord.project.write() = Some(invite.project.clone());
                coord.note_peer(invite.creator);
                let now_ms = coord.clock.epoch_ms();
                coord.router.publish(
                    hive_core::Event::new(
                        hive_core::EventKind::AgentJoined,
                        AgentId::new(coord.node_id.as_str()),
                        coord.agent_name.clone(),
                        hive_core::EventPayload::AgentJoined {
                            node_id: coord.node_id,
                            agent_name: coord.agent_name.clone(),
                        },
                        now_ms,
                    ),
                );
                info!(project = %invite.project, "mesh joined");
                Response::JoinOk {
                    project: invite.project,
                    connected_peers: coord.peer_count(),
                }
            }
            Err(err) => Response::Error {
                category: hive_core::ErrorCategory::Validation,
                code: "bad_token".into(),
                message: err.to_string(),
            },
        },

        Request::LockAcquire { file_path, start_line, end_line, intention, holder_id, holder_name } => {
            let target = match (start_line, end_line) {
                (Some(start), Some(end)) => SemanticTarget::line_range(file_path, start, end),
                _ => SemanticTarget::file(file_path),
            };
            let holder_name = holder_name.or_else(|| Some(coord.agent_name.clone()));
            let result = coord
                .negotiator
                .announce_intent(target, holder_id, holder_name, intention)
                .and_then(|intent| coord.negotiator.acquire(&intent.id()));
            match result {
                Ok(lock) => Response::LockAcquired {
                    grant: LockGrant {
                        lock_id: lock.id,
                        fencing_token: lock.fencing_token,
                        expires_at_ms: lock.expires_at_ms,
                    },
                },
                Err(err) => Response::from_error(&err),
            }
        }

        Request::LockRelease { lock_id, holder_id } => {
            match coord.negotiator.release(&lock_id, &holder_id) {
                Ok(_) => Response::Ok,
                Err(err) => Response::from_error(&err),
            }
        }

        Request::LockRenew { lock_id, holder_id } => {
            match coord.negotiator.renew(&lock_id, &holder_id) {
                Ok(lock) => Response::LockAcquired {
                    grant: LockGrant {
                        lock_id: lock.id,
                        fencing_token: lock.fencing_token,
                        expires_at_ms: lock.expires_at_ms,
                    },
                },
                Err(err) => Response::from_error(&err),
            }
        }

        Request::LockList => Response::Locks { locks: coord.negotiator.locks() },

        Request::Negotiate { session_id, proposal } => {
            match coord.negotiator.negotiate(&session_id, proposal) {
                Ok(resolution) => Response::Negotiated { resolution },
                Err(err) => Response::from_error(&err),
            }
        }

        Request::SessionList => Response::Sessions { sessions: coord.negotiator.open_sessions() },

        Request::InterestRegister { agent_id, agent_name, spec } => {
            match coord.router.register_interest(interest_from_spec(coord, agent_id, agent_name, spec)) {
                Ok(interest) => Response::InterestRegistered { interest },
                Err(err) => Response::from_error(&err),
            }
        }

        Request::ContextShare { agent_id, file_path, content, metadata } => {
            match coord.share_context(agent_id, file_path, content, metadata).await {
                Ok(()) => Response::Ok,
                Err(err) => {
                    // The event is already published; a sink failure is a
                    // network condition, not an operation failure.
                    warn!(%err, "context sink failed");
                    Response::Ok
                }
            }
        }

        Request::Events { agent_id, filter } => {
            Response::Events { events: coord.router.get_events(&agent_id, &filter) }
        }

        Request::NotifyRespond { notification_id, action_id, data } => {
            match coord.notifications.respond(&notification_id, &action_id, data) {
                Ok(_) => Response::Ok,
                Err(err) => Response::from_error(&err),
            }
        }

        Request::LeaveStart => {
            match coord.leave.phase() {
                phase if !phase.is_terminal() && phase != hive_core::LeavePhase::Idle => {
                    Response::from_error(&CoordError::retryable(
                        "leave_in_progress",
                        format!("leave already in progress (phase {phase})"),
                    ))
                }
                _ => {
                    let coord = Arc::clone(coord);
                    tokio::spawn(async move {
                        let broadcaster = coord.broadcaster.read().clone();
                        let result = run_leave(
                            &coord.leave,
                            &coord.negotiator,
                            &coord.router,
                            broadcaster,
                            &coord.agent_name,
                            "graceful leave",
                            &coord.clock,
                        )
                        .await;
                        if let Err(err) = result {
                            warn!(%err, "departure failed");
                        }
                    });
                    Response::Ok
                }
            }
        }

        Request::LeaveStatus => Response::LeaveStatus { status: coord.leave.status() },

        Request::Status => Response::Status {
            status: DaemonStatus {
                version: PROTOCOL_VERSION.to_string(),
                node_id: coord.node_id,
                project: coord.project.read().clone(),
                uptime_ms: coord.start_time.elapsed().as_millis() as u64,
                active_locks: coord.store.len(),
                interests: coord.interests.list().len(),
                pending_notifications: coord.notifications.pending_count(),
                event_log_size: coord.log.size(),
                connected_peers: coord.peer_count(),
            },
        },

        Request::Shutdown => Response::ShuttingDown,
    }
}

fn interest_from_spec(
    coord: &Coord,
    agent_id: AgentId,
    agent_name: String,
    spec: InterestSpec,
) -> Interest {
    let expires_at_ms = spec
        .ttl_secs
        .map(|secs| coord.clock.epoch_ms() + secs * 1000)
        .unwrap_or(0);
    Interest {
        id: InterestId::from_string(""),
        agent_id,
        agent_name,
        patterns: spec.patterns,
        track_dependencies: spec.track_dependencies,
        level: spec.level,
        created_at_ms: 0,
        expires_at_ms,
        metadata: spec.metadata,
        remote: false,
        node_id: Some(coord.node_id),
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
