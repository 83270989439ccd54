//! Room-scoped event delivery.
//!
//! The broadcaster is the single place where [`ServerEvent`]s are encoded
//! and handed to the connection layer. Room state goes out in two views:
//! the public snapshot to every member, and a host-only presence view that
//! additionally carries spectator identities.

use crate::connection::{ConnectionId, ConnectionManager};
use crate::error::ServerError;
use crate::messaging::ServerEvent;
use crate::room::Room;
use std::sync::Arc;
use tracing::debug;

/// Encodes server events and delivers them to room members.
#[derive(Clone)]
pub struct Broadcaster {
    connections: Arc<ConnectionManager>,
}

impl Broadcaster {
    pub fn new(connections: Arc<ConnectionManager>) -> Self {
        Self { connections }
    }

    fn encode(event: &ServerEvent) -> Result<Vec<u8>, ServerError> {
        serde_json::to_vec(event)
            .map_err(|e| ServerError::Internal(format!("Failed to encode event: {e}")))
    }

    /// Unicasts an event to one connection.
    pub async fn send(
        &self,
        connection_id: ConnectionId,
        event: &ServerEvent,
    ) -> Result<(), ServerError> {
        let payload = Self::encode(event)?;
        self.connections
            .send_to_connection(connection_id, payload)
            .await;
        Ok(())
    }

    /// Multicasts an event to a set of connections.
    pub async fn send_many(
        &self,
        targets: &[ConnectionId],
        event: &ServerEvent,
    ) -> Result<(), ServerError> {
        let payload = Self::encode(event)?;
        self.connections.send_to_many(targets, payload).await;
        Ok(())
    }

    /// Broadcasts the public snapshot to every member of the room.
    pub async fn room_state(&self, room: &Room) -> Result<(), ServerError> {
        let members = room.members();
        debug!(
            "📡 Room {} state to {} members",
            room.code(),
            members.len()
        );
        self.send_many(
            &members,
            &ServerEvent::RoomState {
                state: room.snapshot(),
            },
        )
        .await
    }

    /// Sends the host its private presence view: the public snapshot plus
    /// spectator identities.
    pub async fn presence(&self, room: &Room) -> Result<(), ServerError> {
        self.send(
            room.host_id(),
            &ServerEvent::Presence {
                state: room.snapshot(),
                spectators: room.spectator_ids(),
            },
        )
        .await
    }

    /// Full synchronization after a membership or state change: public
    /// snapshot to everyone, then the presence view to the host.
    pub async fn sync(&self, room: &Room) -> Result<(), ServerError> {
        self.room_state(room).await?;
        self.presence(room).await
    }
}
