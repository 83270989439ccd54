//! # Session Server - Live Game Session Coordination
//!
//! A server-side coordinator for live two-player turn-based sessions over
//! WebSockets. It owns everything two clients must agree on: who occupies
//! which seat, whose turn it is, how much time each side has left, and what
//! the authoritative position looks like.
//!
//! ## Design Philosophy
//!
//! The coordinator contains **no rules knowledge** - move legality, turn
//! order, and terminal conditions live behind each room's [`rules::RulesOracle`]:
//!
//! * **WebSocket connection management** - connection lifecycle and message
//!   delivery through a broadcast channel filtered per handler
//! * **Room registry** - live rooms addressed by short human-typable codes
//! * **Join-approval workflow** - every join is mediated by the room's host
//! * **Authoritative clock** - one scheduler task per running room, ticking
//!   once per second under the room's lock
//! * **Snapshot broadcast** - clients replace their state wholesale from
//!   versioned snapshots; the [`reconcile`] module implements the client side
//!
//! ## Message Flow
//!
//! 1. Client sends a WebSocket text frame with a `{"type": ...}` command
//! 2. The router parses and validates the command format
//! 3. The command is dispatched against the addressed room, under its lock
//! 4. Resulting notifications are queued per target connection
//! 5. Each connection handler forwards the messages addressed to it
//!
//! ## Error Handling
//!
//! Infrastructure failures use structured [`ServerError`] variants; domain
//! rejections (bad joins, bad moves) are notifications to the offending
//! connection, never errors.
//!
//! ## Thread Safety
//!
//! * Connection management uses `Arc<RwLock<HashMap>>` for shared state
//! * Each room is wrapped in `Arc<Mutex<..>>`, serializing commands and
//!   clock ticks per room while distinct rooms proceed in parallel

// Re-export core types and functions for easy access
pub use config::ServerConfig;
pub use error::ServerError;
pub use server::SessionServer;
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod broadcast;
pub mod config;
pub mod connection;
pub mod error;
pub mod messaging;
pub mod reconcile;
pub mod room;
pub mod rules;
pub mod server;
pub mod snapshot;
pub mod utils;

#[cfg(test)]
mod tests;
