//! Error types for yroom core

use thiserror::Error;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Malformed state vector: {0}")]
    StateVector(String),

    #[error("Malformed document update: {0}")]
    Update(String),

    #[error("Malformed awareness update: {0}")]
    Awareness(String),
}

impl From<yroom_protocol::ProtocolError> for Error {
    fn from(e: yroom_protocol::ProtocolError) -> Self {
        Error::Awareness(e.to_string())
    }
}

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;
