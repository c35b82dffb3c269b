//! Core types for cowrite

use rand::RngCore;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind a participant id
const PARTICIPANT_ID_BYTES: usize = 16;

/// Opaque identifier for one live connection
///
/// Assigned by the server when a connection is accepted and valid only for
/// that connection's lifetime. A reconnecting client always gets a new one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Create a new random ParticipantId
    pub fn new() -> Self {
        let mut bytes = [0u8; PARTICIPANT_ID_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(bs58::encode(bytes).into_string())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for log output
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(8)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Raw cursor coordinates reported by a client
///
/// These are screen/editor coordinates, not offsets into the text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CursorPosition {
    pub x: f64,
    pub y: f64,
}

impl CursorPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A participant's cursor joined with their display name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CursorState {
    pub id: ParticipantId,
    pub x: f64,
    pub y: f64,
    /// Absent until the participant registers a name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl CursorState {
    pub fn new(id: ParticipantId, position: CursorPosition, name: Option<String>) -> Self {
        Self {
            id,
            x: position.x,
            y: position.y,
            name,
        }
    }

    pub fn position(&self) -> CursorPosition {
        CursorPosition::new(self.x, self.y)
    }
}

/// A registered display name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredName {
    pub id: ParticipantId,
    pub name: String,
}
