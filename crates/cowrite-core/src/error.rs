//! Error types for cowrite

use thiserror::Error;

use crate::types::ParticipantId;

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// Event arrived for a connection that is not (or no longer) live
    #[error("Unknown participant: {0}")]
    UnknownParticipant(ParticipantId),

    /// Client frame that does not match any known message shape
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Error during JSON serialization/deserialization
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The hub task has stopped and no longer accepts commands
    #[error("Relay hub is closed")]
    HubClosed,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// General I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using RelayError
pub type RelayResult<T> = Result<T, RelayError>;
