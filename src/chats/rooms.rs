use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use crate::chats::cache::BoundedCache;
use crate::error::{ApiError, ApiResult};

const ROOM_CHANNEL_CAPACITY: usize = 64;
const NAME_CACHE_CAPACITY: usize = 256;

/// Process-wide registry of live chat rooms. Each room is one broadcast
/// channel shared by every connection that joined it; rooms disappear once
/// their last receiver is gone. Also owns the room-name cache, since names
/// are recomputed for every message otherwise.
#[derive(Clone)]
pub struct RoomHub {
    rooms: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
    names: Arc<Mutex<BoundedCache<(String, String), String>>>,
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomHub {
    pub fn new() -> Self {
        RoomHub {
            rooms: Arc::new(Mutex::new(HashMap::new())),
            names: Arc::new(Mutex::new(BoundedCache::new(NAME_CACHE_CAPACITY))),
        }
    }

    /// Deterministic room name for two usernames: trimmed, sorted
    /// lexicographically and joined with an underscore, so both participants
    /// derive the same name no matter who asks first.
    pub fn room_name(&self, username1: &str, username2: &str) -> ApiResult<String> {
        let first = username1.trim();
        let second = username2.trim();
        if first == second {
            return Err(ApiError::Validation(
                "Cannot open a room between a user and themselves".to_owned(),
            ));
        }
        let key = if first < second {
            (first.to_owned(), second.to_owned())
        } else {
            (second.to_owned(), first.to_owned())
        };
        let cached = self.names.lock().unwrap().get(&key);
        if let Some(name) = cached {
            return Ok(name);
        }
        let name = format!("{}_{}", key.0, key.1);
        self.names.lock().unwrap().insert(key, name.clone());
        Ok(name)
    }

    /// Adds a subscription to the room's broadcast group, creating the room
    /// on first join.
    pub fn join(&self, room: &str) -> broadcast::Receiver<String> {
        let mut rooms = self.rooms.lock().unwrap();
        rooms
            .entry(room.to_owned())
            .or_insert_with(|| broadcast::channel(ROOM_CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Sends to everyone currently in the room, the sender's own
    /// subscription included. Nobody listening is not an error.
    pub fn broadcast(&self, room: &str, payload: String) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(sender) = rooms.get(room) {
            if sender.send(payload).is_err() {
                rooms.remove(room);
            }
        }
    }

    /// Drops the room once no subscriptions remain.
    pub fn prune(&self, room: &str) {
        let mut rooms = self.rooms.lock().unwrap();
        if let Some(sender) = rooms.get(room) {
            if sender.receiver_count() == 0 {
                rooms.remove(room);
            }
        }
    }
}
