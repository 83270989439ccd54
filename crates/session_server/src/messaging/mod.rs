//! Inbound command parsing and routing.
//!
//! Wire messages are internally-tagged JSON enums; the router resolves
//! (connection → role → room) before any room method is invoked, so
//! transport callbacks never reach into game state directly.

pub mod router;
pub mod types;

pub use router::EventRouter;
pub use types::{ClientCommand, ServerEvent};
