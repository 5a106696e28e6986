//! Per-room presence registry
//!
//! Tracks one `(clock, state)` pair per client id, following the
//! y-protocols awareness semantics: an incoming entry wins when its clock
//! is newer, a `null` state retires the client. Every applied entry is
//! tagged with the connection that delivered it so a disconnect can retire
//! exactly the states that connection contributed.

use std::collections::HashMap;

use uuid::Uuid;
use yroom_protocol::{Decoder, Encoder};

use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct Entry {
    clock: u64,
    /// `None` once the client has been retired; the clock is kept so a
    /// stale re-announcement cannot resurrect the state.
    state: Option<serde_json::Value>,
    origin: Option<Uuid>,
}

/// Room-scoped awareness registry, shared by all connections in the room.
#[derive(Debug, Default)]
pub struct Awareness {
    entries: HashMap<u64, Entry>,
}

impl Awareness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an encoded awareness update, attributing accepted entries to
    /// `origin`. Returns the client ids whose state changed.
    pub fn apply_update(&mut self, update: &[u8], origin: Uuid) -> Result<Vec<u64>> {
        let mut dec = Decoder::new(update);
        let count = dec.read_var_uint()?;
        let mut changed = Vec::new();

        for _ in 0..count {
            let client = dec.read_var_uint()?;
            let clock = dec.read_var_uint()?;
            let json = dec.read_var_string()?;
            let state: serde_json::Value =
                serde_json::from_str(json).map_err(|e| Error::Awareness(e.to_string()))?;
            let state = if state.is_null() { None } else { Some(state) };

            let known_clock = self.entries.get(&client).map(|e| e.clock).unwrap_or(0);
            let is_removal_of_live = state.is_none()
                && self
                    .entries
                    .get(&client)
                    .map(|e| e.state.is_some())
                    .unwrap_or(false);

            if clock > known_clock || (clock == known_clock && is_removal_of_live) {
                let origin = state.is_some().then_some(origin);
                self.entries.insert(
                    client,
                    Entry {
                        clock,
                        state,
                        origin,
                    },
                );
                changed.push(client);
            }
        }

        Ok(changed)
    }

    /// Encode an update covering the given client ids. Unknown ids are
    /// skipped; retired ids are encoded as removals.
    pub fn encode_update(&self, clients: &[u64]) -> Vec<u8> {
        let known: Vec<(u64, &Entry)> = clients
            .iter()
            .filter_map(|c| self.entries.get(c).map(|e| (*c, e)))
            .collect();

        let mut enc = Encoder::new();
        enc.write_var_uint(known.len() as u64);
        for (client, entry) in known {
            enc.write_var_uint(client);
            enc.write_var_uint(entry.clock);
            match &entry.state {
                Some(state) => enc.write_var_string(&state.to_string()),
                None => enc.write_var_string("null"),
            }
        }
        enc.to_vec()
    }

    /// Client ids with a live state.
    pub fn client_ids(&self) -> Vec<u64> {
        self.entries
            .iter()
            .filter(|(_, e)| e.state.is_some())
            .map(|(c, _)| *c)
            .collect()
    }

    /// Live states, for diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &serde_json::Value)> {
        self.entries
            .iter()
            .filter_map(|(c, e)| e.state.as_ref().map(|s| (*c, s)))
    }

    /// Number of live states.
    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| e.state.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Retire every state contributed by `origin`, bumping its clock so
    /// stale updates cannot bring it back. Returns the retired client ids.
    pub fn remove_origin(&mut self, origin: Uuid) -> Vec<u64> {
        let mut retired = Vec::new();
        for (client, entry) in self.entries.iter_mut() {
            if entry.origin == Some(origin) && entry.state.is_some() {
                entry.clock += 1;
                entry.state = None;
                entry.origin = None;
                retired.push(*client);
            }
        }
        retired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update(entries: &[(u64, u64, &str)]) -> Vec<u8> {
        let mut enc = Encoder::new();
        enc.write_var_uint(entries.len() as u64);
        for (client, clock, state) in entries {
            enc.write_var_uint(*client);
            enc.write_var_uint(*clock);
            enc.write_var_string(state);
        }
        enc.to_vec()
    }

    #[test]
    fn test_apply_adds_state() {
        let mut aw = Awareness::new();
        let origin = Uuid::new_v4();

        let changed = aw
            .apply_update(&update(&[(7, 1, r#"{"user":{"name":"alice"}}"#)]), origin)
            .unwrap();

        assert_eq!(changed, vec![7]);
        assert_eq!(aw.client_ids(), vec![7]);
        assert_eq!(aw.len(), 1);
    }

    #[test]
    fn test_stale_clock_is_ignored() {
        let mut aw = Awareness::new();
        let origin = Uuid::new_v4();

        aw.apply_update(&update(&[(7, 3, r#"{"cursor":5}"#)]), origin)
            .unwrap();
        let changed = aw
            .apply_update(&update(&[(7, 2, r#"{"cursor":9}"#)]), origin)
            .unwrap();

        assert!(changed.is_empty());
        let (_, state) = aw.iter().next().unwrap();
        assert_eq!(state, &json!({"cursor": 5}));
    }

    #[test]
    fn test_null_state_retires_client() {
        let mut aw = Awareness::new();
        let origin = Uuid::new_v4();

        aw.apply_update(&update(&[(7, 1, r#"{"cursor":5}"#)]), origin)
            .unwrap();
        aw.apply_update(&update(&[(7, 2, "null")]), origin).unwrap();

        assert!(aw.is_empty());
        // Retired clock survives, so the old announcement stays dead
        let changed = aw
            .apply_update(&update(&[(7, 1, r#"{"cursor":5}"#)]), origin)
            .unwrap();
        assert!(changed.is_empty());
    }

    #[test]
    fn test_remove_origin_retires_only_its_states() {
        let mut aw = Awareness::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        aw.apply_update(&update(&[(1, 1, r#"{"u":"a"}"#)]), a).unwrap();
        aw.apply_update(&update(&[(2, 1, r#"{"u":"b"}"#)]), b).unwrap();

        let retired = aw.remove_origin(a);
        assert_eq!(retired, vec![1]);
        assert_eq!(aw.client_ids(), vec![2]);
    }

    #[test]
    fn test_bootstrap_encoding_applies_elsewhere() {
        let mut aw = Awareness::new();
        let origin = Uuid::new_v4();
        aw.apply_update(&update(&[(7, 4, r#"{"user":{"name":"alice"}}"#)]), origin)
            .unwrap();

        let encoded = aw.encode_update(&aw.client_ids());

        let mut other = Awareness::new();
        other.apply_update(&encoded, Uuid::new_v4()).unwrap();
        assert_eq!(other.client_ids(), vec![7]);
    }

    #[test]
    fn test_malformed_update_is_rejected() {
        let mut aw = Awareness::new();
        // count says 2 entries, payload holds none
        assert!(aw.apply_update(&[2], Uuid::new_v4()).is_err());
        // state is not JSON
        assert!(aw
            .apply_update(&update(&[(7, 1, "not json")]), Uuid::new_v4())
            .is_err());
    }
}
