//! Command router.
//!
//! Dispatches parsed [`ClientCommand`]s against room state. Authorization
//! failures (wrong room, wrong role, host-only command from a non-host) are
//! silently dropped; only domain rejections the sender can act on come back
//! as notifications. All room mutation happens under the room's lock, so a
//! command and a clock tick never interleave.

use super::types::{ClientCommand, ServerEvent};
use crate::broadcast::Broadcaster;
use crate::connection::{ConnectionId, ConnectionManager};
use crate::error::{JoinError, ServerError};
use crate::room::{registry::RoomHandle, Role, RoomCode, RoomRegistry};
use crate::rules::{PieceKind, Side};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Routes client commands to room state and broadcasts the results.
pub struct EventRouter {
    registry: Arc<RoomRegistry>,
    connections: Arc<ConnectionManager>,
    broadcaster: Broadcaster,
    default_base_time: u64,
}

impl EventRouter {
    pub fn new(
        registry: Arc<RoomRegistry>,
        connections: Arc<ConnectionManager>,
        default_base_time: u64,
    ) -> Self {
        let broadcaster = Broadcaster::new(connections.clone());
        Self {
            registry,
            connections,
            broadcaster,
            default_base_time,
        }
    }

    /// Parses and dispatches one raw text frame from a connection.
    pub async fn route_client_command(
        &self,
        text: &str,
        connection_id: ConnectionId,
    ) -> Result<(), ServerError> {
        let command: ClientCommand = serde_json::from_str(text)
            .map_err(|e| ServerError::Network(format!("Invalid JSON: {e}")))?;
        self.dispatch(connection_id, command).await
    }

    /// Dispatches an already-parsed command.
    pub async fn dispatch(
        &self,
        connection_id: ConnectionId,
        command: ClientCommand,
    ) -> Result<(), ServerError> {
        match command {
            ClientCommand::HostRoom { base_time } => {
                self.handle_host_room(connection_id, base_time).await
            }
            ClientCommand::RequestJoin { room_id, spectator } => {
                self.handle_request_join(connection_id, &room_id, spectator)
                    .await
            }
            ClientCommand::ApproveJoin {
                room_id,
                requester_id,
            } => {
                self.handle_approve_join(connection_id, &room_id, requester_id)
                    .await
            }
            ClientCommand::DenyJoin {
                room_id,
                requester_id,
            } => {
                self.handle_deny_join(connection_id, &room_id, requester_id)
                    .await
            }
            ClientCommand::SetTime { room_id, base_time } => {
                self.handle_set_time(connection_id, &room_id, base_time)
                    .await
            }
            ClientCommand::StartGame { room_id } => {
                self.handle_start_game(connection_id, &room_id).await
            }
            ClientCommand::ResetGame { room_id } => {
                self.handle_reset_game(connection_id, &room_id).await
            }
            ClientCommand::MakeMove {
                room_id,
                from,
                to,
                promotion,
            } => {
                self.handle_make_move(connection_id, &room_id, &from, &to, promotion)
                    .await
            }
            ClientCommand::KickPlayer { room_id, side } => {
                self.handle_kick_player(connection_id, &room_id, side).await
            }
            ClientCommand::KickSpectator {
                room_id,
                spectator_id,
            } => {
                self.handle_kick_spectator(connection_id, &room_id, spectator_id)
                    .await
            }
            ClientCommand::KickSpectators { room_id } => {
                self.handle_kick_spectators(connection_id, &room_id).await
            }
        }
    }

    /// Resolves a raw room code to a live room. Malformed codes resolve the
    /// same way as unknown ones.
    async fn resolve(&self, room_id: &str) -> Option<(RoomCode, RoomHandle)> {
        let code = RoomCode::parse(room_id).ok()?;
        let room = self.registry.lookup(&code).await?;
        Some((code, room))
    }

    /// Resolves a room and checks that the sender is its host. Host-only
    /// commands from anyone else are dropped without a reply.
    async fn resolve_for_host(
        &self,
        room_id: &str,
        connection_id: ConnectionId,
    ) -> Option<(RoomCode, RoomHandle)> {
        let (code, room) = self.resolve(room_id).await?;
        if room.lock().await.host_id() != connection_id {
            debug!(
                "Ignoring host-only command from connection {} for room {}",
                connection_id, code
            );
            return None;
        }
        Some((code, room))
    }

    // --- room lifecycle ---------------------------------------------------

    async fn handle_host_room(
        &self,
        connection_id: ConnectionId,
        base_time: u64,
    ) -> Result<(), ServerError> {
        let base_time = if base_time == 0 {
            self.default_base_time
        } else {
            base_time
        };
        let (code, room) = self.registry.create_room(connection_id, base_time).await;
        let room = room.lock().await;
        self.broadcaster
            .send(
                connection_id,
                &ServerEvent::RoomCreated {
                    room_id: code,
                    role: Role::White,
                    state: room.snapshot(),
                },
            )
            .await?;
        self.broadcaster.presence(&room).await
    }

    async fn handle_request_join(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        spectator: bool,
    ) -> Result<(), ServerError> {
        let Some((code, room)) = self.resolve(room_id).await else {
            return self
                .broadcaster
                .send(
                    connection_id,
                    &ServerEvent::JoinDenied {
                        reason: JoinError::RoomNotFound.to_string(),
                    },
                )
                .await;
        };

        let host = {
            let mut room = room.lock().await;
            room.queue_request(connection_id, spectator);
            room.host_id()
        };
        info!(
            "Join request for room {} from connection {} (spectator: {})",
            code, connection_id, spectator
        );
        self.broadcaster
            .send(
                host,
                &ServerEvent::JoinRequest {
                    requester_id: connection_id,
                    spectator,
                },
            )
            .await
    }

    async fn handle_approve_join(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        requester_id: ConnectionId,
    ) -> Result<(), ServerError> {
        let Some((code, room)) = self.resolve_for_host(room_id, connection_id).await else {
            return Ok(());
        };

        let mut room = room.lock().await;
        let Some(request) = room.take_pending(requester_id) else {
            return Ok(());
        };
        // The requester may have disconnected while the host deliberated.
        if !self.connections.is_connected(requester_id).await {
            debug!(
                "Approved requester {} already disconnected from room {}",
                requester_id, code
            );
            return Ok(());
        }

        let role = if request.spectator {
            room.add_spectator(requester_id);
            Role::Spectator
        } else if room.seat_black(requester_id) {
            Role::Black
        } else {
            return self
                .broadcaster
                .send(
                    requester_id,
                    &ServerEvent::JoinDenied {
                        reason: JoinError::RoomFull.to_string(),
                    },
                )
                .await;
        };

        info!(
            "Connection {} joined room {} as {:?}",
            requester_id, code, role
        );
        self.broadcaster
            .send(
                requester_id,
                &ServerEvent::RoomJoined {
                    room_id: code,
                    role,
                    state: room.snapshot(),
                },
            )
            .await?;
        self.broadcaster.sync(&room).await
    }

    async fn handle_deny_join(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        requester_id: ConnectionId,
    ) -> Result<(), ServerError> {
        let Some((_, room)) = self.resolve_for_host(room_id, connection_id).await else {
            return Ok(());
        };
        // Notified whether or not a pending entry remained; a stale denial
        // still tells the requester where they stand.
        room.lock().await.take_pending(requester_id);
        self.broadcaster
            .send(
                requester_id,
                &ServerEvent::JoinDenied {
                    reason: JoinError::Denied.to_string(),
                },
            )
            .await
    }

    // --- game control -----------------------------------------------------

    async fn handle_set_time(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        base_time: u64,
    ) -> Result<(), ServerError> {
        let Some((_, room)) = self.resolve_for_host(room_id, connection_id).await else {
            return Ok(());
        };
        let mut room = room.lock().await;
        if room.is_running() {
            return self
                .broadcaster
                .send(
                    connection_id,
                    &ServerEvent::ErrorMessage {
                        message: "Cannot change the clock while the game is running.".into(),
                    },
                )
                .await;
        }
        let base_time = if base_time == 0 {
            self.default_base_time
        } else {
            base_time
        };
        room.set_base_time(base_time);
        self.broadcaster.sync(&room).await
    }

    async fn handle_start_game(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
    ) -> Result<(), ServerError> {
        let Some((code, room_handle)) = self.resolve_for_host(room_id, connection_id).await else {
            return Ok(());
        };
        let mut room = room_handle.lock().await;
        if room.has_ended() {
            return self
                .broadcaster
                .send(
                    connection_id,
                    &ServerEvent::ErrorMessage {
                        message: "Game is over. Reset the board to play again.".into(),
                    },
                )
                .await;
        }
        if !room.seats_filled() {
            return self
                .broadcaster
                .send(
                    connection_id,
                    &ServerEvent::ErrorMessage {
                        message: "Waiting for opponent to join.".into(),
                    },
                )
                .await;
        }
        if room.is_running() {
            return Ok(());
        }

        room.start();
        if !room.clock_running() {
            let handle =
                crate::room::clock::spawn(code.clone(), room_handle.clone(), self.broadcaster.clone());
            room.set_clock_handle(handle);
        }
        info!("🚀 Room {} started", code);
        self.broadcaster.sync(&room).await
    }

    async fn handle_reset_game(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
    ) -> Result<(), ServerError> {
        let Some((code, room)) = self.resolve_for_host(room_id, connection_id).await else {
            return Ok(());
        };
        let mut room = room.lock().await;
        if room.is_running() {
            return self
                .broadcaster
                .send(
                    connection_id,
                    &ServerEvent::ErrorMessage {
                        message: "Cannot reset while the game is running.".into(),
                    },
                )
                .await;
        }
        room.reset();
        info!("Room {} reset", code);
        self.broadcaster.sync(&room).await
    }

    async fn handle_make_move(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        from: &str,
        to: &str,
        promotion: Option<PieceKind>,
    ) -> Result<(), ServerError> {
        let Some((code, room)) = self.resolve(room_id).await else {
            return Ok(());
        };
        let mut room = room.lock().await;
        if !room.is_running() {
            return Ok(());
        }
        let Some(side) = room.role_of(connection_id).and_then(Role::side) else {
            return Ok(());
        };

        match room.try_move(side, from, to, promotion) {
            Err(e) => {
                // Rejection is private to the sender; nothing changed.
                self.broadcaster
                    .send(
                        connection_id,
                        &ServerEvent::ErrorMessage {
                            message: e.to_string(),
                        },
                    )
                    .await
            }
            Ok(record) => {
                debug!(
                    "Room {}: {} played {}{}",
                    code, record.side, record.from, record.to
                );
                self.broadcaster.sync(&room).await?;
                if let Some(reason) = room.terminal_state() {
                    room.end();
                    info!("Room {} ended: {}", code, reason);
                    self.broadcaster
                        .send_many(
                            &room.members(),
                            &ServerEvent::GameOver {
                                reason: reason.to_string(),
                            },
                        )
                        .await?;
                    self.broadcaster.room_state(&room).await?;
                }
                Ok(())
            }
        }
    }

    // --- host moderation --------------------------------------------------

    async fn handle_kick_player(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        side: Side,
    ) -> Result<(), ServerError> {
        let Some((code, room)) = self.resolve_for_host(room_id, connection_id).await else {
            return Ok(());
        };
        let mut room = room.lock().await;
        let Some(occupant) = room.seat(side).filter(|&id| id != room.host_id()) else {
            return Ok(());
        };
        room.vacate_seat(side);
        room.halt();
        info!(
            "Room {}: host kicked {} (connection {})",
            code, side, occupant
        );
        self.broadcaster
            .send(
                occupant,
                &ServerEvent::Kicked {
                    reason: "You were removed by the host.".into(),
                },
            )
            .await?;
        self.broadcaster.sync(&room).await
    }

    async fn handle_kick_spectator(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        spectator_id: ConnectionId,
    ) -> Result<(), ServerError> {
        let Some((code, room)) = self.resolve_for_host(room_id, connection_id).await else {
            return Ok(());
        };
        let mut room = room.lock().await;
        if !room.remove_spectator(spectator_id) {
            return Ok(());
        }
        info!("Room {}: host kicked spectator {}", code, spectator_id);
        self.broadcaster
            .send(
                spectator_id,
                &ServerEvent::Kicked {
                    reason: "Spectator removed by host.".into(),
                },
            )
            .await?;
        self.broadcaster.sync(&room).await
    }

    async fn handle_kick_spectators(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
    ) -> Result<(), ServerError> {
        let Some((code, room)) = self.resolve_for_host(room_id, connection_id).await else {
            return Ok(());
        };
        let mut room = room.lock().await;
        let evicted = room.clear_spectators();
        if evicted.is_empty() {
            return Ok(());
        }
        info!("Room {}: host kicked {} spectators", code, evicted.len());
        self.broadcaster
            .send_many(
                &evicted,
                &ServerEvent::Kicked {
                    reason: "Spectator removed by host.".into(),
                },
            )
            .await?;
        self.broadcaster.sync(&room).await
    }

    // --- disconnects ------------------------------------------------------

    /// Sweeps a departed connection out of every room it touched.
    ///
    /// A departing host tears its room down; a departing player halts the
    /// game; a departing spectator or pending requester is simply removed.
    pub async fn handle_disconnect(&self, connection_id: ConnectionId) -> Result<(), ServerError> {
        for (code, room_handle) in self.registry.entries().await {
            let host_left = {
                let mut room = room_handle.lock().await;
                if room.host_id() == connection_id {
                    true
                } else {
                    room.take_pending(connection_id);
                    // Any departing member halts a running game, spectators
                    // included; the host restarts once the room settles.
                    if room.vacate(connection_id).is_some() {
                        room.halt();
                        self.broadcaster.sync(&room).await?;
                    }
                    false
                }
            };

            if host_left {
                let members: Vec<_> = {
                    let room = room_handle.lock().await;
                    room.members()
                        .into_iter()
                        .filter(|&id| id != connection_id)
                        .collect()
                };
                warn!("Room {} closed: host disconnected", code);
                self.broadcaster
                    .send_many(&members, &ServerEvent::RoomClosed)
                    .await?;
                self.registry.destroy(&code).await;
            }
        }
        Ok(())
    }
}
