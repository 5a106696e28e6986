//! Room manager - owns the room-name to document mapping

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::room::Room;

/// Owns every room for the lifetime of the process. Rooms are created
/// lazily on first use and never evicted; a room's document survives even
/// after its last connection closes.
pub struct RoomManager {
    rooms: DashMap<String, Arc<Room>>,
}

impl RoomManager {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
        }
    }

    /// Get the room for `name`, creating an empty one on first call.
    /// Repeated calls with the same name return the identical instance.
    pub fn get_or_create(&self, name: &str) -> Arc<Room> {
        self.rooms
            .entry(name.to_string())
            .or_insert_with(|| {
                info!(room = %name, "Room created");
                Arc::new(Room::new(name))
            })
            .value()
            .clone()
    }

    /// Look up an existing room without creating one.
    pub fn get(&self, name: &str) -> Option<Arc<Room>> {
        self.rooms.get(name).map(|r| r.value().clone())
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_returns_identical_instance() {
        let manager = RoomManager::new();
        let a = manager.get_or_create("doc1");
        let b = manager.get_or_create("doc1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.room_count(), 1);
    }

    #[test]
    fn test_distinct_names_get_distinct_rooms() {
        let manager = RoomManager::new();
        let a = manager.get_or_create("doc1");
        let b = manager.get_or_create("doc2");
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(manager.room_count(), 2);
    }

    #[test]
    fn test_get_does_not_create() {
        let manager = RoomManager::new();
        assert!(manager.get("doc1").is_none());
        manager.get_or_create("doc1");
        assert!(manager.get("doc1").is_some());
    }
}
