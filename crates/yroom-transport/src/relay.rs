//! Sync and awareness relay engine
//!
//! One `ConnectionHandler` per live connection drives both protocol
//! relays. A sync-step-1 probe gets an answer back to the probing
//! connection only; the raw inbound bytes of every valid sync or awareness
//! message are additionally broadcast, unmodified, to every other
//! connection in the room. The relay never derives peer-specific diffs for
//! broadcast - each peer applies the verbatim bytes through its own
//! document engine.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};
use yroom_core::{Room, RoomManager};
use yroom_protocol::{Message, SyncMessage};

use crate::registry::{ConnId, ConnectionRegistry};

/// Process-wide server state: the room map and the connection map,
/// constructed once at startup and passed to every handler.
pub struct ServerContext {
    pub rooms: RoomManager,
    pub registry: ConnectionRegistry,
}

impl ServerContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: RoomManager::new(),
            registry: ConnectionRegistry::new(),
        })
    }
}

/// Per-connection protocol driver.
pub struct ConnectionHandler {
    conn_id: ConnId,
    room_name: String,
    room: Arc<Room>,
    ctx: Arc<ServerContext>,
}

impl ConnectionHandler {
    /// Register a connection in its room and send the join bootstrap: a
    /// sync-step-1 probe built from the room document, then the current
    /// presence set when the room's awareness registry is non-empty.
    pub fn attach(
        ctx: Arc<ServerContext>,
        room_name: &str,
        sender: UnboundedSender<Vec<u8>>,
    ) -> Self {
        let room = ctx.rooms.get_or_create(room_name);
        let conn_id = ctx.registry.register(room_name, sender.clone());

        let step1 = Message::Sync(SyncMessage::SyncStep1(room.state_vector())).encode();
        let _ = sender.send(step1);
        debug!(conn = %conn_id, room = %room_name, "Sync step 1 sent");

        let bootstrap = {
            let awareness = room.awareness();
            if awareness.is_empty() {
                None
            } else {
                Some(awareness.encode_update(&awareness.client_ids()))
            }
        };
        if let Some(update) = bootstrap {
            let _ = sender.send(Message::Awareness(update).encode());
            debug!(conn = %conn_id, room = %room_name, "Presence bootstrap sent");
        }

        Self {
            conn_id,
            room_name: room_name.to_string(),
            room,
            ctx,
        }
    }

    pub fn conn_id(&self) -> ConnId {
        self.conn_id
    }

    pub fn room_name(&self) -> &str {
        &self.room_name
    }

    /// Process one inbound binary frame to completion. Malformed frames
    /// are dropped: the error is logged, the connection stays open, and
    /// nothing is relayed or sent back.
    pub fn handle_message(&self, data: &[u8]) {
        match Message::decode(data) {
            Ok(Message::Sync(sync)) => self.handle_sync(sync, data),
            Ok(Message::Awareness(payload)) => self.handle_awareness(&payload, data),
            Err(e) => {
                warn!(conn = %self.conn_id, room = %self.room_name, error = %e, "Dropping malformed message");
            }
        }
    }

    /// Answer sync probes and fold updates into the room document.
    fn handle_sync(&self, sync: SyncMessage, raw: &[u8]) {
        let reply = match sync {
            SyncMessage::SyncStep1(sv) => match self.room.diff(&sv) {
                Ok(diff) => Some(Message::Sync(SyncMessage::SyncStep2(diff)).encode()),
                Err(e) => {
                    warn!(conn = %self.conn_id, room = %self.room_name, error = %e, "Dropping sync probe");
                    return;
                }
            },
            SyncMessage::SyncStep2(update) | SyncMessage::Update(update) => {
                if let Err(e) = self.room.apply_update(&update) {
                    warn!(conn = %self.conn_id, room = %self.room_name, error = %e, "Dropping sync update");
                    return;
                }
                None
            }
        };

        // The reply resolves a probe the sender itself initiated, so it
        // goes to the sender only.
        if let Some(reply) = reply {
            self.push_to_self(reply);
        }

        // Peers always get the verbatim inbound bytes, whether or not a
        // reply was produced.
        let peers = self.broadcast(raw);
        debug!(conn = %self.conn_id, room = %self.room_name, peers, "Sync message relayed");
    }

    /// Fold a presence update into the room's awareness registry and
    /// relay it to the room.
    fn handle_awareness(&self, payload: &[u8], raw: &[u8]) {
        let changed = {
            let mut awareness = self.room.awareness();
            match awareness.apply_update(payload, self.conn_id.as_uuid()) {
                Ok(changed) => changed,
                Err(e) => {
                    warn!(conn = %self.conn_id, room = %self.room_name, error = %e, "Dropping awareness update");
                    return;
                }
            }
        };

        let peers = self.broadcast(raw);
        debug!(
            conn = %self.conn_id,
            room = %self.room_name,
            changed = changed.len(),
            peers,
            "Awareness update relayed"
        );

        self.log_presence();
    }

    /// Presence summary for diagnostics. Absent optional fields degrade to
    /// placeholders; this never affects the relay itself.
    fn log_presence(&self) {
        let awareness = self.room.awareness();
        let users: Vec<String> = awareness
            .iter()
            .map(|(client, state)| {
                let name = state
                    .get("user")
                    .and_then(|u| u.get("name"))
                    .and_then(|n| n.as_str())
                    .unwrap_or("Anonymous");
                format!("{}:{}", client, name)
            })
            .collect();
        debug!(
            room = %self.room_name,
            states = awareness.len(),
            users = ?users,
            "Presence update"
        );
    }

    /// Send `bytes` to every other connection currently in this room.
    /// Sends are fire-and-forget; a closed peer never aborts the loop.
    fn broadcast(&self, bytes: &[u8]) -> usize {
        let mut count = 0;
        self.ctx
            .registry
            .for_each_in_room(&self.room_name, |id, rec| {
                if id != self.conn_id && rec.sender.send(bytes.to_vec()).is_ok() {
                    count += 1;
                }
            });
        count
    }

    fn push_to_self(&self, bytes: Vec<u8>) {
        if let Some(rec) = self.ctx.registry.get(self.conn_id) {
            let _ = rec.sender.send(bytes);
        }
    }

    /// Tear down after the socket closed: drop the registry entry and
    /// retire this connection's awareness states. The room document is
    /// kept regardless of remaining occupancy.
    pub fn cleanup(&self) {
        self.ctx.registry.remove(self.conn_id);
        let retired = self.room.awareness().remove_origin(self.conn_id.as_uuid());

        let remaining = self.ctx.registry.room_occupancy(&self.room_name);
        info!(
            conn = %self.conn_id,
            room = %self.room_name,
            retired_states = retired.len(),
            remaining,
            "Connection closed"
        );

        if remaining == 0 {
            info!(
                room = %self.room_name,
                size_bytes = self.room.size(),
                "Document retained for reconnections"
            );
        }
    }
}
