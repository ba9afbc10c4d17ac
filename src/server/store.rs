//! In-memory registry of rooms.
//!
//! The registry lock is only held to look up, insert or remove an entry.
//! Room state itself is guarded by a per-room lock so rooms never contend
//! with each other. Lock order: a room lock may be held while taking the
//! registry lock, never the reverse.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::ActionError;

use super::room::Room;

/// A room behind its own lock.
pub type SharedRoom = Arc<Mutex<Room>>;

/// Owns every room, keyed by normalized room id.
pub struct SessionStore {
    rooms: Mutex<HashMap<String, SharedRoom>>,
    max_rooms: usize,
    max_participants: usize,
}

impl SessionStore {
    pub fn new(max_rooms: usize, max_participants: usize) -> Self {
        Self {
            rooms: Mutex::new(HashMap::new()),
            max_rooms,
            max_participants,
        }
    }

    /// Return the room for `room_id`, creating an empty one if needed.
    ///
    /// `room_id` must already be normalized.
    pub async fn get_or_create_room(&self, room_id: &str) -> Result<SharedRoom, ActionError> {
        let mut rooms = self.rooms.lock().await;

        if let Some(room) = rooms.get(room_id) {
            return Ok(Arc::clone(room));
        }

        if rooms.len() >= self.max_rooms {
            return Err(ActionError::TooManyRooms);
        }

        let room = Arc::new(Mutex::new(Room::new(room_id, self.max_participants)));
        rooms.insert(room_id.to_string(), Arc::clone(&room));
        info!(room_id, open_rooms = rooms.len(), "Room created");
        Ok(room)
    }

    pub async fn get_room(&self, room_id: &str) -> Option<SharedRoom> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    /// Drop the room if it has no participants left.
    ///
    /// The room is marked closed and unregistered while its own lock is
    /// held, so a concurrent join that already holds a handle to it fails
    /// with `RoomNotFound` and retries against a fresh room. Returns whether
    /// it was removed.
    pub async fn remove_room_if_empty(&self, room_id: &str) -> bool {
        let Some(room) = self.get_room(room_id).await else {
            return false;
        };

        let mut guard = room.lock().await;
        if !guard.is_empty() || guard.is_closed() {
            return false;
        }
        guard.close();

        let mut rooms = self.rooms.lock().await;
        // Only remove the entry we closed, not a successor with the same id.
        if rooms.get(room_id).is_some_and(|r| Arc::ptr_eq(r, &room)) {
            rooms.remove(room_id);
            info!(room_id, open_rooms = rooms.len(), "Room removed");
            true
        } else {
            debug!(room_id, "Room already replaced");
            false
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    /// Handles to every open room.
    pub async fn rooms(&self) -> Vec<SharedRoom> {
        self.rooms.lock().await.values().cloned().collect()
    }
}
