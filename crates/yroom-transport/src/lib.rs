//! yroom Transport Layer
//!
//! Network-facing half of the relay:
//! - WebSocket: binary room channels, room selection by request path
//! - Plain HTTP: static confirmation text for non-upgrade requests
//! - Registry: room-indexed connection bookkeeping
//! - Relay: the sync/awareness protocol drivers

pub mod registry;
pub mod relay;
pub mod websocket;

pub use registry::{ConnId, ConnectionRecord, ConnectionRegistry};
pub use relay::{ConnectionHandler, ServerContext};
pub use websocket::{WebSocketServer, DEFAULT_ROOM};
