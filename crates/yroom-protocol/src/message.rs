//! Tagged message framing

use crate::codec::{Decoder, Encoder};
use crate::error::{ProtocolError, ProtocolResult};

/// Top-level message discriminators
pub const MESSAGE_SYNC: u64 = 0;
pub const MESSAGE_AWARENESS: u64 = 1;

/// Sync sub-protocol discriminators
pub const SYNC_STEP_1: u64 = 0;
pub const SYNC_STEP_2: u64 = 1;
pub const SYNC_UPDATE: u64 = 2;

/// One framed unit on a room channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Sync-protocol exchange interpreted against the room document.
    Sync(SyncMessage),
    /// Presence delta interpreted by the awareness registry.
    Awareness(Vec<u8>),
}

/// Sync sub-protocol messages. The carried bytes are opaque to the
/// framing layer; the document engine decodes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMessage {
    /// State-vector probe asking the receiver for missing updates.
    SyncStep1(Vec<u8>),
    /// Update diff answering a step-1 probe.
    SyncStep2(Vec<u8>),
    /// Incremental document update.
    Update(Vec<u8>),
}

impl Message {
    /// Decode a complete binary frame.
    pub fn decode(data: &[u8]) -> ProtocolResult<Self> {
        let mut dec = Decoder::new(data);
        match dec.read_var_uint()? {
            MESSAGE_SYNC => Ok(Message::Sync(SyncMessage::decode(&mut dec)?)),
            MESSAGE_AWARENESS => Ok(Message::Awareness(dec.read_var_buf()?.to_vec())),
            other => Err(ProtocolError::UnknownMessageType(other)),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut enc = Encoder::new();
        match self {
            Message::Sync(sync) => {
                enc.write_var_uint(MESSAGE_SYNC);
                sync.encode_into(&mut enc);
            }
            Message::Awareness(payload) => {
                enc.write_var_uint(MESSAGE_AWARENESS);
                enc.write_var_buf(payload);
            }
        }
        enc.to_vec()
    }
}

impl SyncMessage {
    fn decode(dec: &mut Decoder<'_>) -> ProtocolResult<Self> {
        match dec.read_var_uint()? {
            SYNC_STEP_1 => Ok(SyncMessage::SyncStep1(dec.read_var_buf()?.to_vec())),
            SYNC_STEP_2 => Ok(SyncMessage::SyncStep2(dec.read_var_buf()?.to_vec())),
            SYNC_UPDATE => Ok(SyncMessage::Update(dec.read_var_buf()?.to_vec())),
            other => Err(ProtocolError::UnknownSyncType(other)),
        }
    }

    fn encode_into(&self, enc: &mut Encoder) {
        match self {
            SyncMessage::SyncStep1(sv) => {
                enc.write_var_uint(SYNC_STEP_1);
                enc.write_var_buf(sv);
            }
            SyncMessage::SyncStep2(update) => {
                enc.write_var_uint(SYNC_STEP_2);
                enc.write_var_buf(update);
            }
            SyncMessage::Update(update) => {
                enc.write_var_uint(SYNC_UPDATE);
                enc.write_var_buf(update);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_step1_frame_layout() {
        let frame = Message::Sync(SyncMessage::SyncStep1(vec![0])).encode();
        // discriminator, sub-tag, length, body
        assert_eq!(frame, vec![0, 0, 1, 0]);
    }

    #[test]
    fn test_awareness_frame_carries_blob() {
        let frame = Message::Awareness(vec![1, 7, 1, 4]).encode();
        match Message::decode(&frame).unwrap() {
            Message::Awareness(blob) => assert_eq!(blob, vec![1, 7, 1, 4]),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_discriminator() {
        assert!(matches!(
            Message::decode(&[9, 1, 2]),
            Err(ProtocolError::UnknownMessageType(9))
        ));
    }

    #[test]
    fn test_unknown_sync_sub_tag() {
        assert!(matches!(
            Message::decode(&[0, 7, 0]),
            Err(ProtocolError::UnknownSyncType(7))
        ));
    }

    #[test]
    fn test_truncated_sync_payload() {
        // Update claims 5 payload bytes, carries 1
        assert!(matches!(
            Message::decode(&[0, 2, 5, 1]),
            Err(ProtocolError::UnexpectedEof)
        ));
    }

    #[test]
    fn test_empty_frame() {
        assert!(matches!(
            Message::decode(&[]),
            Err(ProtocolError::UnexpectedEof)
        ));
    }
}
