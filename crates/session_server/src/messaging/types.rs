//! Message type definitions for client-server communication.
//!
//! Both directions use internally-tagged JSON (`"type": "..."`) with
//! camelCase payload fields, e.g.:
//!
//! ```json
//! { "type": "request-join", "roomId": "PQ7XK", "spectator": true }
//! ```
//!
//! Commands name an existing room by its code except `host-room`, which
//! creates one. Missing optional fields default; a command that fails to
//! parse is dropped before any state mutation.

use crate::connection::ConnectionId;
use crate::room::{Role, RoomCode};
use crate::rules::{PieceKind, Side};
use crate::snapshot::RoomSnapshot;
use serde::{Deserialize, Serialize};

/// A command sent from a client to the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Create a room; the sender becomes host and takes the white seat.
    /// A zero allotment means "use the server default".
    HostRoom { base_time: u64 },

    /// Ask to join a room, either for the vacant seat or as a spectator.
    RequestJoin {
        room_id: String,
        #[serde(default)]
        spectator: bool,
    },

    /// Host-only: admit a pending requester.
    ApproveJoin {
        room_id: String,
        requester_id: ConnectionId,
    },

    /// Host-only: refuse a pending requester.
    DenyJoin {
        room_id: String,
        requester_id: ConnectionId,
    },

    /// Host-only, not while running: change the clock allotment.
    SetTime { room_id: String, base_time: u64 },

    /// Host-only: start the clock. Requires the black seat to be filled.
    StartGame { room_id: String },

    /// Host-only, not while running: restore the initial position.
    ResetGame { room_id: String },

    /// Seated players only, on their turn, while running.
    MakeMove {
        room_id: String,
        from: String,
        to: String,
        #[serde(default)]
        promotion: Option<PieceKind>,
    },

    /// Host-only: evict a seated player.
    KickPlayer { room_id: String, side: Side },

    /// Host-only: evict one spectator.
    KickSpectator {
        room_id: String,
        spectator_id: ConnectionId,
    },

    /// Host-only: evict every spectator.
    KickSpectators { room_id: String },
}

/// A notification sent from the coordinator to one or more connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Unicast to the creator of a new room.
    RoomCreated {
        room_id: RoomCode,
        role: Role,
        state: RoomSnapshot,
    },

    /// Unicast to an admitted requester.
    RoomJoined {
        room_id: RoomCode,
        role: Role,
        state: RoomSnapshot,
    },

    /// Room-wide public snapshot, sent after every state-affecting event.
    RoomState { state: RoomSnapshot },

    /// Host-only view: the public snapshot plus spectator identities.
    Presence {
        state: RoomSnapshot,
        spectators: Vec<ConnectionId>,
    },

    /// Host-only: a join request awaits approval.
    JoinRequest {
        requester_id: ConnectionId,
        spectator: bool,
    },

    /// Unicast to a refused requester.
    JoinDenied { reason: String },

    /// Unicast to the sender of a rejected command.
    ErrorMessage { message: String },

    /// Room-wide: the game reached a terminal state.
    GameOver { reason: String },

    /// Room-wide: the host disconnected and the room is gone.
    RoomClosed,

    /// Unicast to an evicted member.
    Kicked { reason: String },
}
