//! Core session server implementation.
//!
//! This module contains the main `SessionServer` struct and its
//! implementation, providing the central orchestration of all server
//! components: the connection manager, the room registry, and the command
//! router.

use crate::{
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    messaging::EventRouter,
    room::RoomRegistry,
    server::handlers::handle_connection,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// The core session server structure.
///
/// `SessionServer` orchestrates all server components: WebSocket connection
/// lifecycle, room state, and command routing. The server core contains no
/// rules knowledge; legality lives behind each room's oracle.
///
/// # Architecture
///
/// * **Connection Management**: WebSocket connection lifecycle and delivery
/// * **Room Registry**: live rooms keyed by their join codes
/// * **Command Routing**: parsed client commands dispatched to room state
pub struct SessionServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Manager for client connections and messaging
    connection_manager: Arc<ConnectionManager>,

    /// Live rooms keyed by code
    registry: Arc<RoomRegistry>,

    /// Dispatches parsed commands against room state
    router: Arc<EventRouter>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl SessionServer {
    /// Creates a new session server with the specified configuration.
    ///
    /// Initializes the connection manager, room registry, and command
    /// router. The server is ready to start after construction.
    pub fn new(config: ServerConfig) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let registry = Arc::new(RoomRegistry::new());
        let router = Arc::new(EventRouter::new(
            registry.clone(),
            connection_manager.clone(),
            config.default_base_time,
        ));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            connection_manager,
            registry,
            router,
            shutdown_sender,
        }
    }

    /// Starts the session server and begins accepting connections.
    ///
    /// Binds the configured address and runs the accept loop until an
    /// internal shutdown signal is received. Each accepted connection gets
    /// its own handler task.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the server started and stopped cleanly, or a
    /// `ServerError` if binding or accepting failed.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting session server on {}", self.config.bind_address);

        let listener = tokio::net::TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind: {e}")))?;

        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if self.connection_manager.connection_count().await
                                >= self.config.max_connections
                            {
                                warn!("Connection limit reached, refusing {}", addr);
                                drop(stream);
                                continue;
                            }
                            let connection_manager = self.connection_manager.clone();
                            let router = self.router.clone();
                            tokio::spawn(async move {
                                if let Err(e) =
                                    handle_connection(stream, addr, connection_manager, router)
                                        .await
                                {
                                    error!("Connection error: {:?}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            break;
                        }
                    }
                }
                _ = shutdown_receiver.recv() => {
                    info!("Internal shutdown signal received");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Initiates server shutdown.
    ///
    /// Signals the accept loop to stop. Active connection handlers finish
    /// on their own as clients disconnect.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Gets the connection manager.
    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }

    /// Gets the room registry.
    pub fn registry(&self) -> Arc<RoomRegistry> {
        self.registry.clone()
    }

    /// Gets the command router.
    pub fn router(&self) -> Arc<EventRouter> {
        self.router.clone()
    }

    /// Gets the configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
