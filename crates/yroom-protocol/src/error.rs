//! Protocol error types

use thiserror::Error;

/// Framing-level errors
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Unknown message type: {0}")]
    UnknownMessageType(u64),

    #[error("Unknown sync message type: {0}")]
    UnknownSyncType(u64),

    #[error("Unexpected end of buffer")]
    UnexpectedEof,

    #[error("Variable-length integer exceeds 64 bits")]
    VarIntTooLarge,

    #[error("Invalid UTF-8 in string: {0}")]
    InvalidString(#[from] std::str::Utf8Error),
}

/// Result type for framing operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
