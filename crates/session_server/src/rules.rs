//! Rules oracle adapter.
//!
//! The coordinator never inspects board state directly: legality, turn
//! order, and terminal conditions are delegated to an opaque oracle behind
//! the [`RulesOracle`] trait. The production implementation wraps the
//! `chess` crate; tests may substitute their own oracle.

use chess::{Board, BoardStatus, ChessMove, Color, Game, Piece, Rank, Square};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the two playing sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl Side {
    /// The opposing side.
    pub fn opponent(self) -> Side {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::White => write!(f, "White"),
            Side::Black => write!(f, "Black"),
        }
    }
}

impl From<Color> for Side {
    fn from(color: Color) -> Self {
        match color {
            Color::White => Side::White,
            Color::Black => Side::Black,
        }
    }
}

impl From<Side> for Color {
    fn from(side: Side) -> Self {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

/// Kind of a piece, serialized as the standard single-letter code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PieceKind {
    #[serde(rename = "p")]
    Pawn,
    #[serde(rename = "n")]
    Knight,
    #[serde(rename = "b")]
    Bishop,
    #[serde(rename = "r")]
    Rook,
    #[serde(rename = "q")]
    Queen,
    #[serde(rename = "k")]
    King,
}

impl From<Piece> for PieceKind {
    fn from(piece: Piece) -> Self {
        match piece {
            Piece::Pawn => PieceKind::Pawn,
            Piece::Knight => PieceKind::Knight,
            Piece::Bishop => PieceKind::Bishop,
            Piece::Rook => PieceKind::Rook,
            Piece::Queen => PieceKind::Queen,
            Piece::King => PieceKind::King,
        }
    }
}

impl From<PieceKind> for Piece {
    fn from(kind: PieceKind) -> Self {
        match kind {
            PieceKind::Pawn => Piece::Pawn,
            PieceKind::Knight => Piece::Knight,
            PieceKind::Bishop => Piece::Bishop,
            PieceKind::Rook => Piece::Rook,
            PieceKind::Queen => Piece::Queen,
            PieceKind::King => Piece::King,
        }
    }
}

/// An accepted move, immutable once appended to a room's history.
///
/// Used both for replay/audit and for captured-piece bookkeeping on the
/// client side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    /// Origin square in coordinate notation, e.g. `e2`
    pub from: String,
    /// Destination square in coordinate notation, e.g. `e4`
    pub to: String,
    /// Kind of the moving piece
    pub piece: PieceKind,
    /// Kind of the captured piece, if the move captured one
    pub captured: Option<PieceKind>,
    /// Side that made the move
    pub side: Side,
}

/// Error returned when an opaque position string cannot be loaded.
#[derive(Debug, thiserror::Error)]
#[error("invalid position: {0}")]
pub struct PositionError(pub String);

/// The opaque legality engine consumed by the coordinator.
///
/// Implementations own the authoritative position; the coordinator only
/// ever reads it through this interface or as an opaque serialized string.
/// Rooms are shared across handler and clock tasks, so implementations
/// must be `Send + Sync`.
pub trait RulesOracle: Send + Sync {
    /// Side whose turn it is to move.
    fn turn(&self) -> Side;

    /// Whether the side to move is in check.
    fn in_check(&self) -> bool;

    /// Whether the side to move is checkmated.
    fn is_checkmate(&self) -> bool;

    /// Whether the position is drawn.
    fn is_draw(&self) -> bool;

    /// Attempts a move for the side to move.
    ///
    /// Returns the resulting [`MoveRecord`] if the move was legal and has
    /// been applied, or `None` if the oracle rejected it (position
    /// unchanged).
    fn attempt_move(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<PieceKind>,
    ) -> Option<MoveRecord>;

    /// Serializes the current position to an opaque string.
    fn serialize_position(&self) -> String;

    /// Replaces the current position wholesale from an opaque string.
    fn load_position(&mut self, position: &str) -> Result<(), PositionError>;

    /// Restores the initial layout.
    fn reset(&mut self);
}

/// [`RulesOracle`] implementation backed by the `chess` crate.
///
/// The opaque position format is FEN. Draw detection covers stalemate plus
/// the claimable conditions the engine tracks (threefold repetition,
/// fifty-move rule).
pub struct ChessOracle {
    game: Game,
}

impl ChessOracle {
    pub fn new() -> Self {
        Self { game: Game::new() }
    }

    fn board(&self) -> Board {
        self.game.current_position()
    }
}

impl Default for ChessOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl RulesOracle for ChessOracle {
    fn turn(&self) -> Side {
        self.game.side_to_move().into()
    }

    fn in_check(&self) -> bool {
        self.board().checkers().popcnt() > 0
    }

    fn is_checkmate(&self) -> bool {
        self.board().status() == BoardStatus::Checkmate
    }

    fn is_draw(&self) -> bool {
        self.board().status() == BoardStatus::Stalemate || self.game.can_declare_draw()
    }

    fn attempt_move(
        &mut self,
        from: &str,
        to: &str,
        promotion: Option<PieceKind>,
    ) -> Option<MoveRecord> {
        let from_sq = Square::from_str(from).ok()?;
        let to_sq = Square::from_str(to).ok()?;
        let board = self.board();
        let piece = board.piece_on(from_sq)?;
        let side: Side = board.side_to_move().into();

        // A promotion hint is only meaningful when a pawn reaches the back
        // rank; clients routinely send one on every move. Default to queen,
        // as the original client does.
        let promotes = piece == Piece::Pawn
            && (to_sq.get_rank() == Rank::Eighth || to_sq.get_rank() == Rank::First);
        let promotion_piece = if promotes {
            Some(promotion.unwrap_or(PieceKind::Queen).into())
        } else {
            None
        };

        // Capture bookkeeping before the move mutates the board. A pawn
        // landing diagonally on an empty square is an en-passant capture.
        let captured = board
            .piece_on(to_sq)
            .map(PieceKind::from)
            .or_else(|| {
                let diagonal = from_sq.get_file() != to_sq.get_file();
                (piece == Piece::Pawn && diagonal).then_some(PieceKind::Pawn)
            });

        let mv = ChessMove::new(from_sq, to_sq, promotion_piece);
        if !self.game.make_move(mv) {
            return None;
        }

        Some(MoveRecord {
            from: from.to_string(),
            to: to.to_string(),
            piece: piece.into(),
            captured,
            side,
        })
    }

    fn serialize_position(&self) -> String {
        self.board().to_string()
    }

    fn load_position(&mut self, position: &str) -> Result<(), PositionError> {
        let board = Board::from_str(position).map_err(|e| PositionError(e.to_string()))?;
        self.game = Game::new_with_board(board);
        Ok(())
    }

    fn reset(&mut self) {
        self.game = Game::new();
    }
}
