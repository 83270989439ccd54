//! Client-side snapshot reconciler.
//!
//! Clients never apply moves optimistically; they replace their mirrored
//! position wholesale from each authoritative [`RoomSnapshot`]. The
//! reconciler keeps a local oracle in step with the stream of snapshots,
//! detects when a snapshot carries a move the client has not yet seen, and
//! derives a display status from the reconciled state. Snapshots are
//! idempotent: applying the same one twice reports no new move.

use crate::rules::{ChessOracle, MoveRecord, PieceKind, PositionError, RulesOracle, Side};
use crate::snapshot::RoomSnapshot;
use std::fmt;

/// Identity of a move for duplicate detection across snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
struct MoveKey {
    from: String,
    to: String,
    piece: PieceKind,
    captured: Option<PieceKind>,
}

impl From<&MoveRecord> for MoveKey {
    fn from(record: &MoveRecord) -> Self {
        Self {
            from: record.from.clone(),
            to: record.to.clone(),
            piece: record.piece,
            captured: record.captured,
        }
    }
}

/// Display status derived from a reconciled snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    /// The black seat is still empty
    WaitingForOpponent,
    /// Both seats filled, clock not running
    WaitingToStart,
    /// The named side delivered checkmate
    Checkmate { winner: Side },
    Draw,
    /// The named side is to move and in check
    Check { side: Side },
    /// The named side is to move
    TurnOf { side: Side },
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::WaitingForOpponent => write!(f, "Waiting for opponent to join."),
            GameStatus::WaitingToStart => write!(f, "Waiting for the game to start."),
            GameStatus::Checkmate { winner } => write!(f, "Checkmate. {winner} wins."),
            GameStatus::Draw => write!(f, "Draw."),
            GameStatus::Check { side } => write!(f, "{side} is in check."),
            GameStatus::TurnOf { side } => write!(f, "{side} to move."),
        }
    }
}

/// What one snapshot application yielded.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileUpdate {
    /// The snapshot's last move, if the client had not yet seen it
    pub arrived_move: Option<MoveRecord>,
    /// Display status derived from the reconciled position
    pub status: GameStatus,
}

/// Mirrors authoritative snapshots into a local position.
pub struct ClientReconciler {
    mirror: Box<dyn RulesOracle>,
    last_key: Option<MoveKey>,
}

impl ClientReconciler {
    pub fn new() -> Self {
        Self::with_oracle(Box::new(ChessOracle::new()))
    }

    /// Builds a reconciler over a caller-supplied mirror oracle.
    pub fn with_oracle(mirror: Box<dyn RulesOracle>) -> Self {
        Self {
            mirror,
            last_key: None,
        }
    }

    /// Applies one authoritative snapshot.
    ///
    /// The mirrored position is replaced wholesale; no local move replay is
    /// attempted. A move is reported as arrived only the first time a
    /// snapshot carries it.
    pub fn apply(&mut self, snapshot: &RoomSnapshot) -> Result<ReconcileUpdate, PositionError> {
        self.mirror.load_position(&snapshot.position)?;

        let arrived_move = match &snapshot.last_move {
            Some(record) => {
                let key = MoveKey::from(record);
                if self.last_key.as_ref() == Some(&key) {
                    None
                } else {
                    self.last_key = Some(key);
                    Some(record.clone())
                }
            }
            None => {
                self.last_key = None;
                None
            }
        };

        Ok(ReconcileUpdate {
            arrived_move,
            status: self.derive_status(snapshot),
        })
    }

    fn derive_status(&self, snapshot: &RoomSnapshot) -> GameStatus {
        if !(snapshot.seats.white && snapshot.seats.black) {
            return GameStatus::WaitingForOpponent;
        }
        if self.mirror.is_checkmate() {
            // The side to move is the one that got mated.
            return GameStatus::Checkmate {
                winner: self.mirror.turn().opponent(),
            };
        }
        if self.mirror.is_draw() {
            return GameStatus::Draw;
        }
        if !snapshot.running {
            return GameStatus::WaitingToStart;
        }
        let side = self.mirror.turn();
        if self.mirror.in_check() {
            GameStatus::Check { side }
        } else {
            GameStatus::TurnOf { side }
        }
    }
}

impl Default for ClientReconciler {
    fn default() -> Self {
        Self::new()
    }
}
