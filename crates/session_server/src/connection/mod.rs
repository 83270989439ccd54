//! Connection management for client connections.
//!
//! This module handles the lifecycle of client connections, including
//! connection tracking, message delivery, and room-scoped multicast.

pub mod client;
pub mod manager;

pub use manager::ConnectionManager;

/// Type alias for connection identifiers.
///
/// Connection IDs are used to uniquely identify client connections
/// throughout their lifecycle on the server. They double as the member
/// identity inside rooms: a seat holder, a spectator, and a pending join
/// requester are all named by their connection ID.
pub type ConnectionId = usize;
