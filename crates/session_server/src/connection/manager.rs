//! Connection manager for tracking and managing client connections.
//!
//! This module provides the central management system for all client
//! connections, handling connection lifecycle, identifier assignment, and
//! message delivery. Delivery is fire-and-forget and at-most-once: messages
//! are queued on a broadcast channel and each connection handler forwards
//! the ones addressed to it.

use super::{client::ClientConnection, ConnectionId};
use futures_util::sink::SinkExt;
use futures_util::stream::SplitSink;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, RwLock};
use tokio_tungstenite::{tungstenite::Message, WebSocketStream};
use tracing::info;

/// Shared handle to the write half of a connection's WebSocket stream.
pub type WsSink = Arc<tokio::sync::Mutex<SplitSink<WebSocketStream<TcpStream>, Message>>>;

/// Central manager for all client connections.
///
/// The `ConnectionManager` tracks active connections, assigns unique IDs,
/// and provides unicast and room-scoped multicast delivery. It uses
/// async-safe data structures to handle concurrent access from multiple
/// connection handlers.
///
/// # Architecture
///
/// * Uses `RwLock<HashMap>` for thread-safe connection storage
/// * Implements atomic connection ID generation
/// * Provides a broadcast channel for outgoing messages, filtered per
///   connection by the handler tasks
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information
    connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,

    /// Write halves of the WebSocket streams, for close frames
    ws_senders: Arc<RwLock<HashMap<ConnectionId, WsSink>>>,

    /// Atomic counter for generating unique connection IDs
    next_id: Arc<std::sync::atomic::AtomicUsize>,

    /// Broadcast sender for outgoing messages to specific connections
    sender: broadcast::Sender<(ConnectionId, Vec<u8>)>,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    ///
    /// Initializes the internal data structures and broadcast channel
    /// with a reasonable buffer size for message queuing.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            ws_senders: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(std::sync::atomic::AtomicUsize::new(1)),
            sender,
        }
    }

    /// Adds a new connection and returns its unique ID.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - The network address of the connecting client
    pub async fn add_connection(&self, remote_addr: SocketAddr) -> ConnectionId {
        let connection_id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let connection = ClientConnection::new(remote_addr);
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, connection);
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        connection_id
    }

    /// Removes a connection from the manager.
    ///
    /// Cleans up the connection entry and logs the disconnection. This
    /// should be called when a client disconnects.
    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(&connection_id) {
            info!(
                "❌ Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
    }

    /// Register the WebSocket sender for a connection.
    pub async fn register_ws_sender(&self, connection_id: ConnectionId, ws_sender: WsSink) {
        let mut senders = self.ws_senders.write().await;
        senders.insert(connection_id, ws_sender);
    }

    /// Remove the WebSocket sender for a connection.
    pub async fn remove_ws_sender(&self, connection_id: ConnectionId) {
        let mut senders = self.ws_senders.write().await;
        senders.remove(&connection_id);
    }

    /// Checks whether a connection is currently registered.
    ///
    /// Used by the join-approval workflow: approving a requester that has
    /// already disconnected is a silent no-op.
    pub async fn is_connected(&self, connection_id: ConnectionId) -> bool {
        let connections = self.connections.read().await;
        connections.contains_key(&connection_id)
    }

    /// Returns the number of currently registered connections.
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Sends a message to a specific connection.
    ///
    /// Queues a message for delivery to the specified connection through
    /// the internal broadcast channel. Delivery is at-most-once; if the
    /// connection has no active handler the message is dropped.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, message: Vec<u8>) {
        if let Err(e) = self.sender.send((connection_id, message)) {
            tracing::debug!(
                "Dropped message for connection {} (no active receivers): {:?}",
                connection_id,
                e
            );
        }
    }

    /// Sends the same message to a set of connections.
    ///
    /// This is the room-scoped multicast primitive: the message is cloned
    /// and queued once per target connection.
    ///
    /// # Returns
    ///
    /// The number of connections the message was queued for.
    pub async fn send_to_many(&self, targets: &[ConnectionId], message: Vec<u8>) -> usize {
        for &connection_id in targets {
            if let Err(e) = self.sender.send((connection_id, message.clone())) {
                tracing::debug!(
                    "Dropped multicast message for connection {}: {:?}",
                    connection_id,
                    e
                );
            }
        }
        tracing::trace!("📡 Multicast message queued for {} connections", targets.len());
        targets.len()
    }

    /// Sends a close frame to a connection's WebSocket, if it is registered.
    ///
    /// Membership bookkeeping is the caller's responsibility; this only
    /// terminates the transport.
    pub async fn close_connection(&self, connection_id: ConnectionId, reason: Option<String>) {
        let senders = self.ws_senders.read().await;
        if let Some(ws_sender) = senders.get(&connection_id) {
            let mut ws_sender = ws_sender.lock().await;
            use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
            let close_msg =
                Message::Close(Some(tokio_tungstenite::tungstenite::protocol::CloseFrame {
                    code: CloseCode::Normal,
                    reason: reason.unwrap_or_else(|| "Closed by server".into()).into(),
                }));
            let _ = ws_sender.send(close_msg).await;
        }
    }

    /// Creates a new receiver for outgoing messages.
    ///
    /// Each connection handler should call this to get a receiver for
    /// messages targeted to their specific connection.
    pub fn subscribe(&self) -> broadcast::Receiver<(ConnectionId, Vec<u8>)> {
        self.sender.subscribe()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
