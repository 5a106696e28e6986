//! Server-side room replica
//!
//! One `Room` per room name: a Y.js document plus the room's shared
//! awareness registry. The document engine surface is deliberately small:
//! state-vector probes, diffs against a peer's state vector, and update
//! application. Everything else about the CRDT is `yrs`'s business.

use parking_lot::{Mutex, MutexGuard};
use yrs::updates::decoder::Decode;
use yrs::updates::encoder::Encode;
use yrs::{Doc, ReadTxn, StateVector, Transact, Update};

use crate::awareness::Awareness;
use crate::error::{Error, Result};

pub struct Room {
    name: String,
    /// Y.js document for CRDT operations
    ydoc: Doc,
    awareness: Mutex<Awareness>,
}

impl Room {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ydoc: Doc::new(),
            awareness: Mutex::new(Awareness::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Encoded state vector, the body of a sync-step-1 probe.
    pub fn state_vector(&self) -> Vec<u8> {
        let txn = self.ydoc.transact();
        txn.state_vector().encode_v1()
    }

    /// Encode the updates a peer with the given state vector is missing;
    /// the body of a sync-step-2 reply.
    pub fn diff(&self, state_vector: &[u8]) -> Result<Vec<u8>> {
        let sv = StateVector::decode_v1(state_vector)
            .map_err(|e| Error::StateVector(e.to_string()))?;
        let txn = self.ydoc.transact();
        Ok(txn.encode_state_as_update_v1(&sv))
    }

    /// Apply a Y.js update from a peer.
    pub fn apply_update(&self, update: &[u8]) -> Result<()> {
        let decoded = Update::decode_v1(update).map_err(|e| Error::Update(e.to_string()))?;
        let mut txn = self.ydoc.transact_mut();
        txn.apply_update(decoded);
        Ok(())
    }

    /// The full document state as a single update.
    pub fn encode_full_state(&self) -> Vec<u8> {
        let txn = self.ydoc.transact();
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    /// Encoded document size in bytes, for diagnostics.
    pub fn size(&self) -> usize {
        self.encode_full_state().len()
    }

    /// The room's shared awareness registry.
    pub fn awareness(&self) -> MutexGuard<'_, Awareness> {
        self.awareness.lock()
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yrs::{GetString, Text};

    fn client_update(text: &str) -> Vec<u8> {
        let doc = Doc::new();
        let ytext = doc.get_or_insert_text("content");
        let mut txn = doc.transact_mut();
        ytext.insert(&mut txn, 0, text);
        txn.encode_state_as_update_v1(&StateVector::default())
    }

    #[test]
    fn test_apply_then_diff_converges() {
        let room = Room::new("doc1");
        room.apply_update(&client_update("hello")).unwrap();

        // A fresh peer probes with an empty state vector and gets the
        // full accumulated state back.
        let empty_sv = StateVector::default().encode_v1();
        let diff = room.diff(&empty_sv).unwrap();

        let peer = Doc::new();
        let update = Update::decode_v1(&diff).unwrap();
        peer.transact_mut().apply_update(update);

        let ytext = peer.get_or_insert_text("content");
        let txn = peer.transact();
        assert_eq!(ytext.get_string(&txn), "hello");
    }

    #[test]
    fn test_diff_rejects_garbage_state_vector() {
        let room = Room::new("doc1");
        assert!(matches!(
            room.diff(&[0xde, 0xad, 0xbe, 0xef]),
            Err(Error::StateVector(_))
        ));
    }

    #[test]
    fn test_apply_rejects_garbage_update() {
        let room = Room::new("doc1");
        assert!(matches!(
            room.apply_update(&[0xff, 0x00, 0x12]),
            Err(Error::Update(_))
        ));
    }

    #[test]
    fn test_size_grows_with_content() {
        let room = Room::new("doc1");
        let before = room.size();
        room.apply_update(&client_update("some collaborative text"))
            .unwrap();
        assert!(room.size() > before);
    }
}
