//! Utility functions and helper methods for the session server.
//!
//! This module provides convenient factory functions and utilities
//! for creating server instances with different configurations.

use crate::{config::ServerConfig, server::SessionServer};

/// Creates a new session server with default configuration.
///
/// This is a convenience function for quickly setting up a server
/// with sensible defaults for development and testing.
///
/// # Example
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use session_server::create_server;
///
/// let server = create_server();
/// # }
/// ```
pub fn create_server() -> SessionServer {
    SessionServer::new(ServerConfig::default())
}

/// Creates a new session server with custom configuration.
///
/// # Example
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use session_server::{create_server_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// # }
/// ```
pub fn create_server_with_config(config: ServerConfig) -> SessionServer {
    SessionServer::new(config)
}
