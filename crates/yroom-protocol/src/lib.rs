//! Wire framing for the yroom relay.
//!
//! Every message exchanged over a room channel is a binary frame that
//! starts with a variable-length unsigned integer discriminator:
//!
//! ```text
//! 0 <sub-tag> <var-prefixed body>   # Sync (step 1 / step 2 / update)
//! 1 <var-prefixed blob>             # Awareness
//! ```
//!
//! Integers use the lib0 encoding (unsigned little-endian base-128), which
//! is what y-websocket clients put on the wire. The bodies themselves are
//! opaque here; the document and awareness engines interpret them.

pub mod codec;
pub mod error;
pub mod message;

pub use codec::{Decoder, Encoder};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{Message, SyncMessage};
