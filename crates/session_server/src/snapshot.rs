//! Public room snapshot.
//!
//! A snapshot is the serialized public view of a room, broadcast to every
//! member after each state-affecting event. It is a versioned structured
//! record rather than a free-form object: every field is enumerated here so
//! serialization is unambiguous across implementations. Spectator
//! identities are deliberately absent; only the host-only presence view
//! carries them.

use crate::rules::MoveRecord;
use serde::{Deserialize, Serialize};

/// Current snapshot schema version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Boolean-only seat occupancy.
///
/// Reveals whether each seat is filled without identifying the occupant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatOccupancy {
    pub white: bool,
    pub black: bool,
}

/// The public view of a room, safe to send to seats and spectators alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    /// Snapshot schema version, currently [`SNAPSHOT_VERSION`]
    pub version: u32,

    /// Opaque serialized board position, owned by the rules oracle
    pub position: String,

    /// White's remaining clock, in seconds
    pub white_time: u64,

    /// Black's remaining clock, in seconds
    pub black_time: u64,

    /// Whether the clock is ticking and moves are accepted
    pub running: bool,

    /// Most recent accepted move, if any
    pub last_move: Option<MoveRecord>,

    /// Configured clock allotment per side, in seconds
    pub base_time: u64,

    /// Which seats are occupied
    pub seats: SeatOccupancy,

    /// Number of spectators, without their identities
    pub spectator_count: usize,

    /// Full append-only move history
    pub moves: Vec<MoveRecord>,
}
