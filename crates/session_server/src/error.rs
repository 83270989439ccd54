//! Error types and handling for the session server.
//!
//! Infrastructure failures use [`ServerError`]. Domain rejections that are
//! surfaced to a single connection carry their wire reason string as their
//! `Display` output, so routing code can forward them verbatim.

/// Enumeration of possible server errors.
///
/// Categorizes errors into network-related and internal server errors
/// to help with debugging and error handling.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures or connection issues
    #[error("Network error: {0}")]
    Network(String),

    /// Internal server errors including routing and serialization issues
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Reasons a join request is refused.
///
/// Non-fatal; surfaced to the requester as a `join-denied` notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinError {
    /// The requested room code does not resolve to a live room
    #[error("Room not found.")]
    RoomNotFound,

    /// Both seats are occupied and the requester did not ask to spectate
    #[error("Players are full. Try spectating.")]
    RoomFull,

    /// The host explicitly denied the request
    #[error("Host denied the request.")]
    Denied,
}

/// Reasons a move command is refused.
///
/// Non-fatal; surfaced to the acting connection only, with no state change
/// and no broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    /// The acting seat's side does not match the side to move
    #[error("Not your turn.")]
    OutOfTurn,

    /// The rules oracle rejected the move
    #[error("Illegal move.")]
    Illegal,
}
