//! Connection registry - room-indexed connection bookkeeping

use std::fmt;
use std::time::SystemTime;

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

/// Opaque connection identifier, assigned at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The raw id, used as the awareness origin handle.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-connection metadata
#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub room: String,
    /// Fire-and-forget outbound capability; a failed send means the peer
    /// is gone and must never abort a fan-out loop.
    pub sender: UnboundedSender<Vec<u8>>,
    pub joined_at: SystemTime,
}

/// Owns all live connections, indexed by id.
pub struct ConnectionRegistry {
    conns: DashMap<ConnId, ConnectionRecord>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: DashMap::new(),
        }
    }

    pub fn register(&self, room: impl Into<String>, sender: UnboundedSender<Vec<u8>>) -> ConnId {
        let id = ConnId::new();
        self.conns.insert(
            id,
            ConnectionRecord {
                room: room.into(),
                sender,
                joined_at: SystemTime::now(),
            },
        );
        id
    }

    pub fn get(&self, id: ConnId) -> Option<ConnectionRecord> {
        self.conns.get(&id).map(|r| r.value().clone())
    }

    /// Visit every connection currently in `room`.
    pub fn for_each_in_room(&self, room: &str, mut f: impl FnMut(ConnId, &ConnectionRecord)) {
        for entry in self.conns.iter() {
            if entry.value().room == room {
                f(*entry.key(), entry.value());
            }
        }
    }

    /// Remove a connection. Performs no document cleanup.
    pub fn remove(&self, id: ConnId) -> Option<ConnectionRecord> {
        self.conns.remove(&id).map(|(_, rec)| rec)
    }

    pub fn room_occupancy(&self, room: &str) -> usize {
        self.conns.iter().filter(|e| e.value().room == room).count()
    }

    /// Names of rooms with at least one live connection.
    pub fn active_rooms(&self) -> Vec<String> {
        let mut rooms: Vec<String> = self.conns.iter().map(|e| e.value().room.clone()).collect();
        rooms.sort();
        rooms.dedup();
        rooms
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
