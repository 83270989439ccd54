//! Authoritative per-session room state.
//!
//! A [`Room`] is the single writer for everything one game session owns:
//! seats, spectators, pending join requests, the oracle-held position, the
//! move history, and the countdown clocks. Rooms are wrapped in
//! `Arc<Mutex<..>>` by the registry so command handling and clock ticks are
//! serialized per room while distinct rooms proceed in parallel.

pub mod clock;
pub mod code;
pub mod registry;

pub use code::RoomCode;
pub use registry::RoomRegistry;

use crate::connection::ConnectionId;
use crate::error::MoveError;
use crate::rules::{ChessOracle, MoveRecord, PieceKind, RulesOracle, Side};
use crate::snapshot::{RoomSnapshot, SeatOccupancy, SNAPSHOT_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::task::JoinHandle;

/// Role a connection holds inside a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    White,
    Black,
    Spectator,
}

impl Role {
    /// The playing side for a seated role, `None` for spectators.
    pub fn side(self) -> Option<Side> {
        match self {
            Role::White => Some(Side::White),
            Role::Black => Some(Side::Black),
            Role::Spectator => None,
        }
    }
}

/// Lifecycle phase of a room, derived from its flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Created, black seat still empty
    Lobby,
    /// Both seats filled, clock not running
    Ready,
    /// Clock ticking, moves accepted
    Running,
    /// Terminal until a host reset: checkmate, draw, or timeout
    Ended,
}

/// A queued join request awaiting host approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinRequest {
    /// Whether the requester asked for spectator status
    pub spectator: bool,
}

/// Why a game ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    Checkmate,
    Draw,
    /// The named side's clock reached zero
    Timeout(Side),
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::Checkmate => write!(f, "Checkmate."),
            EndReason::Draw => write!(f, "Draw."),
            EndReason::Timeout(side) => write!(f, "{side} ran out of time."),
        }
    }
}

/// Result of one clock tick.
#[derive(Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The room is not running; nothing was decremented
    Idle,
    /// A second was deducted and the game continues
    Running,
    /// The named side's clock reached zero; the room is now ended
    Expired(Side),
}

/// The authoritative state machine for one game session.
pub struct Room {
    code: RoomCode,
    host: ConnectionId,
    white_seat: Option<ConnectionId>,
    black_seat: Option<ConnectionId>,
    spectators: HashSet<ConnectionId>,
    pending: HashMap<ConnectionId, JoinRequest>,
    oracle: Box<dyn RulesOracle>,
    moves: Vec<MoveRecord>,
    last_move: Option<MoveRecord>,
    base_time: u64,
    white_time: u64,
    black_time: u64,
    running: bool,
    ended: bool,
    clock: Option<JoinHandle<()>>,
}

impl Room {
    /// Creates a room with the host seated as white and a fresh position.
    pub fn new(code: RoomCode, host: ConnectionId, base_time: u64) -> Self {
        Self::with_oracle(code, host, base_time, Box::new(ChessOracle::new()))
    }

    /// Creates a room over a caller-supplied oracle. Used by tests.
    pub fn with_oracle(
        code: RoomCode,
        host: ConnectionId,
        base_time: u64,
        oracle: Box<dyn RulesOracle>,
    ) -> Self {
        Self {
            code,
            host,
            white_seat: Some(host),
            black_seat: None,
            spectators: HashSet::new(),
            pending: HashMap::new(),
            oracle,
            moves: Vec::new(),
            last_move: None,
            base_time,
            white_time: base_time,
            black_time: base_time,
            running: false,
            ended: false,
            clock: None,
        }
    }

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn host_id(&self) -> ConnectionId {
        self.host
    }

    pub fn base_time(&self) -> u64 {
        self.base_time
    }

    pub fn remaining(&self, side: Side) -> u64 {
        match side {
            Side::White => self.white_time,
            Side::Black => self.black_time,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// Derived lifecycle phase, for logging and tests.
    pub fn phase(&self) -> RoomPhase {
        if self.ended {
            RoomPhase::Ended
        } else if self.running {
            RoomPhase::Running
        } else if self.black_seat.is_some() && self.white_seat.is_some() {
            RoomPhase::Ready
        } else {
            RoomPhase::Lobby
        }
    }

    /// Side to move, per the oracle.
    pub fn turn(&self) -> Side {
        self.oracle.turn()
    }

    // --- membership -------------------------------------------------------

    /// Resolves the role a connection holds in this room, if any.
    pub fn role_of(&self, connection_id: ConnectionId) -> Option<Role> {
        if self.white_seat == Some(connection_id) {
            Some(Role::White)
        } else if self.black_seat == Some(connection_id) {
            Some(Role::Black)
        } else if self.spectators.contains(&connection_id) {
            Some(Role::Spectator)
        } else {
            None
        }
    }

    /// Occupant of a seat.
    pub fn seat(&self, side: Side) -> Option<ConnectionId> {
        match side {
            Side::White => self.white_seat,
            Side::Black => self.black_seat,
        }
    }

    /// Whether both seats are occupied.
    pub fn seats_filled(&self) -> bool {
        self.white_seat.is_some() && self.black_seat.is_some()
    }

    /// Seats the connection as black. Returns `false` if the seat is taken.
    pub fn seat_black(&mut self, connection_id: ConnectionId) -> bool {
        if self.black_seat.is_some() {
            return false;
        }
        self.black_seat = Some(connection_id);
        true
    }

    /// Adds a spectator to the broadcast group.
    pub fn add_spectator(&mut self, connection_id: ConnectionId) {
        self.spectators.insert(connection_id);
    }

    /// Removes one spectator. Returns whether it was present.
    pub fn remove_spectator(&mut self, connection_id: ConnectionId) -> bool {
        self.spectators.remove(&connection_id)
    }

    /// Removes every spectator, returning the evicted identities.
    pub fn clear_spectators(&mut self) -> Vec<ConnectionId> {
        self.spectators.drain().collect()
    }

    pub fn has_spectator(&self, connection_id: ConnectionId) -> bool {
        self.spectators.contains(&connection_id)
    }

    /// Spectator identities, host-only information.
    pub fn spectator_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.spectators.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Every member of the broadcast group: host, seats, spectators.
    pub fn members(&self) -> Vec<ConnectionId> {
        let mut members = vec![self.host];
        for seat in [self.white_seat, self.black_seat].into_iter().flatten() {
            if !members.contains(&seat) {
                members.push(seat);
            }
        }
        for &spectator in &self.spectators {
            if !members.contains(&spectator) {
                members.push(spectator);
            }
        }
        members
    }

    /// Vacates whatever role the connection held. Pending requests are
    /// handled separately via [`Room::take_pending`].
    pub fn vacate(&mut self, connection_id: ConnectionId) -> Option<Role> {
        if self.white_seat == Some(connection_id) {
            self.white_seat = None;
            Some(Role::White)
        } else if self.black_seat == Some(connection_id) {
            self.black_seat = None;
            Some(Role::Black)
        } else if self.spectators.remove(&connection_id) {
            Some(Role::Spectator)
        } else {
            None
        }
    }

    /// Vacates a seat by side, used by host kicks.
    pub fn vacate_seat(&mut self, side: Side) -> Option<ConnectionId> {
        match side {
            Side::White => self.white_seat.take(),
            Side::Black => self.black_seat.take(),
        }
    }

    // --- join workflow ----------------------------------------------------

    /// Queues a join request, replacing any earlier one from the same
    /// connection. No timeout exists; the request persists until the host
    /// decides or the requester disconnects.
    pub fn queue_request(&mut self, connection_id: ConnectionId, spectator: bool) {
        self.pending.insert(connection_id, JoinRequest { spectator });
    }

    /// Consumes a pending request, if one exists.
    pub fn take_pending(&mut self, connection_id: ConnectionId) -> Option<JoinRequest> {
        self.pending.remove(&connection_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    // --- game lifecycle ---------------------------------------------------

    /// Enters the running state. Preconditions (host authority, both seats
    /// filled, not ended) are enforced by the router.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Forces the room out of the running state and stops the clock.
    /// Safe to call from any state.
    pub fn halt(&mut self) {
        self.running = false;
        self.stop_clock();
    }

    /// Marks the game over and stops the clock.
    pub fn end(&mut self) {
        self.running = false;
        self.ended = true;
        self.stop_clock();
    }

    /// Restores the initial position, clears history, refills both clocks,
    /// and returns to the lobby/ready state. The router rejects resets
    /// while running, so the clock is never live here; stopping it anyway
    /// keeps the invariant local.
    pub fn reset(&mut self) {
        self.oracle.reset();
        self.moves.clear();
        self.last_move = None;
        self.white_time = self.base_time;
        self.black_time = self.base_time;
        self.running = false;
        self.ended = false;
        self.stop_clock();
    }

    /// Updates the allotment and refills both clocks. Only valid while not
    /// running; enforced by the router.
    pub fn set_base_time(&mut self, base_time: u64) {
        self.base_time = base_time;
        self.white_time = base_time;
        self.black_time = base_time;
    }

    /// Attempts a move on behalf of a seated side.
    ///
    /// On acceptance the record is appended to the history and becomes the
    /// room's last move.
    pub fn try_move(
        &mut self,
        side: Side,
        from: &str,
        to: &str,
        promotion: Option<PieceKind>,
    ) -> Result<MoveRecord, MoveError> {
        if self.oracle.turn() != side {
            return Err(MoveError::OutOfTurn);
        }
        let record = self
            .oracle
            .attempt_move(from, to, promotion)
            .ok_or(MoveError::Illegal)?;
        self.moves.push(record.clone());
        self.last_move = Some(record.clone());
        Ok(record)
    }

    /// Checks the oracle for a terminal condition after a move.
    pub fn terminal_state(&self) -> Option<EndReason> {
        if self.oracle.is_checkmate() {
            Some(EndReason::Checkmate)
        } else if self.oracle.is_draw() {
            Some(EndReason::Draw)
        } else {
            None
        }
    }

    /// Applies one clock tick: deducts a second from the side to move and
    /// ends the game if a clock reaches zero. Ticking a non-running room is
    /// a no-op; the scheduler should already have been stopped.
    pub fn tick(&mut self) -> TickOutcome {
        if !self.running {
            return TickOutcome::Idle;
        }
        match self.oracle.turn() {
            Side::White => self.white_time = self.white_time.saturating_sub(1),
            Side::Black => self.black_time = self.black_time.saturating_sub(1),
        }
        if self.white_time == 0 || self.black_time == 0 {
            let loser = if self.white_time == 0 {
                Side::White
            } else {
                Side::Black
            };
            self.running = false;
            self.ended = true;
            // The scheduler task observes Expired and exits on its own;
            // dropping the handle here detaches it without aborting.
            drop(self.clock.take());
            return TickOutcome::Expired(loser);
        }
        TickOutcome::Running
    }

    // --- clock handle -----------------------------------------------------

    /// Whether a scheduler task currently owns this room's clock.
    pub fn clock_running(&self) -> bool {
        self.clock.is_some()
    }

    /// Takes ownership of a scheduler task handle. Callers must check
    /// [`Room::clock_running`] first; starting twice is a bug.
    pub fn set_clock_handle(&mut self, handle: JoinHandle<()>) {
        debug_assert!(self.clock.is_none(), "clock started twice");
        self.clock = Some(handle);
    }

    /// Cancels the scheduler task, if any. Idempotent; must be invoked on
    /// every path out of the running state.
    pub fn stop_clock(&mut self) {
        if let Some(handle) = self.clock.take() {
            handle.abort();
        }
    }

    // --- views ------------------------------------------------------------

    /// Builds the public snapshot broadcast to every member.
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            version: SNAPSHOT_VERSION,
            position: self.oracle.serialize_position(),
            white_time: self.white_time,
            black_time: self.black_time,
            running: self.running,
            last_move: self.last_move.clone(),
            base_time: self.base_time,
            seats: SeatOccupancy {
                white: self.white_seat.is_some(),
                black: self.black_seat.is_some(),
            },
            spectator_count: self.spectators.len(),
            moves: self.moves.clone(),
        }
    }
}

impl fmt::Debug for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Room")
            .field("code", &self.code)
            .field("host", &self.host)
            .field("phase", &self.phase())
            .field("white_time", &self.white_time)
            .field("black_time", &self.black_time)
            .field("spectators", &self.spectators.len())
            .field("moves", &self.moves.len())
            .finish()
    }
}
