//! Server orchestration and connection handling.

pub mod core;
pub mod handlers;

pub use core::SessionServer;
