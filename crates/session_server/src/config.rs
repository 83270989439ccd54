//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize and customize the session server behavior.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Default clock allotment per side, in seconds.
pub const DEFAULT_BASE_TIME_SECS: u64 = 300;

/// Configuration structure for the session server.
///
/// Contains all necessary parameters to configure server behavior including
/// network settings, connection limits, and the default clock allotment used
/// when a host does not supply one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Clock allotment per side, in seconds, used when a `host-room` or
    /// `set-time` command carries a zero allotment
    pub default_base_time: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080"
                .parse()
                .expect("Invalid default bind address"),
            max_connections: 1000,
            default_base_time: DEFAULT_BASE_TIME_SECS,
        }
    }
}
