//! Connection handling logic for WebSocket clients.
//!
//! This module contains the core connection handling logic that manages
//! the lifecycle of individual client connections, including WebSocket
//! handshaking, message processing, and cleanup.

use crate::{connection::ConnectionManager, error::ServerError, messaging::EventRouter};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, trace};

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake
/// 2. Register the connection with the connection manager
/// 3. Start message handling tasks (incoming and outgoing)
/// 4. On termination, sweep the connection out of any rooms it touched
///
/// # Message Handling
///
/// Two concurrent tasks run until the connection closes or errors:
///
/// * **Incoming Task**: parses text frames and routes them as commands
/// * **Outgoing Task**: forwards queued messages addressed to this connection
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    connection_manager: Arc<ConnectionManager>,
    router: Arc<EventRouter>,
) -> Result<(), ServerError> {
    let ws_stream = accept_async(stream)
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));
    let connection_id = connection_manager.add_connection(addr).await;
    connection_manager
        .register_ws_sender(connection_id, ws_sender.clone())
        .await;

    let mut message_receiver = connection_manager.subscribe();
    let ws_sender_incoming = ws_sender.clone();
    let ws_sender_outgoing = ws_sender.clone();

    // Incoming message task - parses frames into commands
    let incoming_task = {
        let router = router.clone();
        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Err(e) = router.route_client_command(&text, connection_id).await {
                            trace!("❌ Command routing error: {}", e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", connection_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let mut ws_sender = ws_sender_incoming.lock().await;
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Err(e) => {
                        error!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    // Outgoing message task
    let outgoing_task = {
        let ws_sender = ws_sender_outgoing;
        async move {
            while let Ok((target_connection_id, message)) = message_receiver.recv().await {
                if target_connection_id == connection_id {
                    let message_text = String::from_utf8_lossy(&message);
                    let mut ws_sender = ws_sender.lock().await;
                    if let Err(e) = ws_sender
                        .send(Message::Text(message_text.to_string().into()))
                        .await
                    {
                        error!("Failed to send message: {}", e);
                        break;
                    }
                }
            }
        }
    };

    // Run both tasks concurrently until one completes
    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    // Room bookkeeping before the transport entry goes away, so room
    // notifications about the departure are not misaddressed.
    if let Err(e) = router.handle_disconnect(connection_id).await {
        error!(
            "Disconnect sweep failed for connection {}: {}",
            connection_id, e
        );
    }

    connection_manager.remove_connection(connection_id).await;
    connection_manager.remove_ws_sender(connection_id).await;
    Ok(())
}
