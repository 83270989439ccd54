//! Registry of live rooms.
//!
//! An explicit keyed store with create/lookup/destroy operations; its
//! lifetime is tied to the server that owns it. Each entry wraps its room
//! in `Arc<Mutex<..>>` so exactly one logical actor mutates a room at a
//! time while distinct rooms are processed in parallel.

use super::{code::RoomCode, Room};
use crate::connection::ConnectionId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

/// Shared handle to one room's serialized state.
pub type RoomHandle = Arc<Mutex<Room>>;

/// Owns the mapping from room code to live room.
#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<RoomCode, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room for the given host, retrying code generation until
    /// it does not collide with a live room. The host takes the white seat.
    pub async fn create_room(
        &self,
        host: ConnectionId,
        base_time: u64,
    ) -> (RoomCode, RoomHandle) {
        let mut rooms = self.rooms.write().await;
        let code = loop {
            let candidate = RoomCode::generate();
            if !rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        let room = Arc::new(Mutex::new(Room::new(code.clone(), host, base_time)));
        rooms.insert(code.clone(), room.clone());
        info!("🏠 Room {} created by connection {}", code, host);
        (code, room)
    }

    /// Resolves a room code to its live room, if any.
    pub async fn lookup(&self, code: &RoomCode) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(code).cloned()
    }

    /// Removes a room and cancels its clock, if one is active.
    ///
    /// # Returns
    ///
    /// `true` if a room with that code existed.
    pub async fn destroy(&self, code: &RoomCode) -> bool {
        let removed = {
            let mut rooms = self.rooms.write().await;
            rooms.remove(code)
        };
        match removed {
            Some(room) => {
                room.lock().await.halt();
                info!("🗑️ Room {} destroyed", code);
                true
            }
            None => false,
        }
    }

    /// Snapshot of every live entry, used by disconnect handling to sweep
    /// a departing connection out of whichever room holds it.
    pub async fn entries(&self) -> Vec<(RoomCode, RoomHandle)> {
        let rooms = self.rooms.read().await;
        rooms
            .iter()
            .map(|(code, room)| (code.clone(), room.clone()))
            .collect()
    }

    pub async fn len(&self) -> usize {
        let rooms = self.rooms.read().await;
        rooms.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
