//! yroom Core - room documents and presence
//!
//! This crate provides the state the relay routes around:
//! - One Y.js document replica per room name, created lazily, never evicted
//! - A room-scoped awareness registry with origin-tagged entries
//! - The room manager owning the name-to-room mapping

pub mod awareness;
pub mod error;
pub mod manager;
pub mod room;

pub use awareness::Awareness;
pub use error::{Error, Result};
pub use manager::RoomManager;
pub use room::Room;
