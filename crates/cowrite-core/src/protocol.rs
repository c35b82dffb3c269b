//! Wire protocol between participants and the relay
//!
//! Every WebSocket text frame carries one JSON object of the form
//! `{"event": <name>, "data": <payload>}`.
//!
//! ## Message Flow
//!
//! ```text
//! Client A                 Relay                  Client B
//!   |                        |                        |
//!   |                        |<------- (connect) -----|
//!   |                        |--- textSnapshot ------>|
//!   |                        |--- cursorSnapshot ---->|
//!   |                        |                        |
//!   |--- textChange -------->|                        |
//!   |                        |--- textUpdated ------->|
//!   |                        |                        |
//!   |                        |<------ cursorMove -----|
//!   |<-- cursorUpdated ------|                        |
//!   |                        |                        |
//!   |                        |<---- (disconnect) -----|
//!   |<-- cursorRemoved ------|                        |
//! ```
//!
//! Client frames are validated here: anything that does not decode into a
//! [`ClientMessage`] is rejected before it can reach shared state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{RelayError, RelayResult};
use crate::types::{CursorPosition, CursorState, ParticipantId, RegisteredName};

/// Messages a participant sends to the relay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Register (or replace) this participant's display name
    RegisterName(String),

    /// Full document contents after a local edit
    TextChange(String),

    /// New cursor coordinates
    CursorMove(CursorPosition),
}

impl ClientMessage {
    /// Decode a client frame, rejecting anything that does not match a known event
    pub fn decode(frame: &str) -> RelayResult<Self> {
        serde_json::from_str(frame).map_err(|e| RelayError::InvalidMessage(e.to_string()))
    }

    /// Encode to a JSON frame
    pub fn encode(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Event name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::RegisterName(_) => "registerName",
            ClientMessage::TextChange(_) => "textChange",
            ClientMessage::CursorMove(_) => "cursorMove",
        }
    }
}

/// Messages the relay sends to participants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Current document text, sent once on connect
    TextSnapshot(String),

    /// Every tracked cursor joined with its name, sent once on connect
    CursorSnapshot(BTreeMap<ParticipantId, CursorState>),

    /// A participant registered a name (broadcast, or replayed to a new registrant)
    ParticipantRegistered(RegisteredName),

    /// Another participant replaced the document text
    TextUpdated(String),

    /// Another participant moved their cursor
    CursorUpdated(CursorState),

    /// A participant disconnected
    CursorRemoved(ParticipantId),

    /// The sender's last frame was rejected
    Error {
        message: String,
    },
}

impl ServerMessage {
    /// Encode to a JSON frame
    pub fn encode(&self) -> RelayResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a server frame (used by clients and tests)
    pub fn decode(frame: &str) -> RelayResult<Self> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Event name, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::TextSnapshot(_) => "textSnapshot",
            ServerMessage::CursorSnapshot(_) => "cursorSnapshot",
            ServerMessage::ParticipantRegistered(_) => "participantRegistered",
            ServerMessage::TextUpdated(_) => "textUpdated",
            ServerMessage::CursorUpdated(_) => "cursorUpdated",
            ServerMessage::CursorRemoved(_) => "cursorRemoved",
            ServerMessage::Error { .. } => "error",
        }
    }
}
