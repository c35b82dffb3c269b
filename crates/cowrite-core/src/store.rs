//! Shared session state
//!
//! The store holds the single document string plus the per-participant cursor
//! and name maps. It has no behavior beyond storage and lookup: every
//! operation is synchronous and infallible. Serializing access is the job of
//! whoever owns it (see [`crate::relay`]).

use std::collections::{BTreeMap, HashMap};

use indexmap::IndexMap;

use crate::types::{CursorPosition, CursorState, ParticipantId, RegisteredName};

/// Shared text, cursor positions and display names for one session
#[derive(Debug, Default, Clone)]
pub struct SessionStore {
    text: String,
    cursors: HashMap<ParticipantId, CursorPosition>,
    /// Registration order is preserved; re-registering keeps the original slot
    names: IndexMap<ParticipantId, String>,
}

impl SessionStore {
    /// Create an empty store (empty text, nobody tracked)
    pub fn new() -> Self {
        Self::default()
    }

    /// Current document text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replace the document text unconditionally
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Insert or replace a participant's cursor
    pub fn set_cursor(&mut self, id: ParticipantId, position: CursorPosition) {
        self.cursors.insert(id, position);
    }

    /// Remove a participant's cursor, returning it if there was one
    pub fn remove_cursor(&mut self, id: &ParticipantId) -> Option<CursorPosition> {
        self.cursors.remove(id)
    }

    /// Insert or replace a participant's display name
    pub fn set_name(&mut self, id: ParticipantId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    /// Remove a participant's display name, returning it if there was one
    pub fn remove_name(&mut self, id: &ParticipantId) -> Option<String> {
        self.names.shift_remove(id)
    }

    /// Drop every trace of a participant (cursor and name together)
    pub fn remove_participant(&mut self, id: &ParticipantId) {
        self.cursors.remove(id);
        self.names.shift_remove(id);
    }

    pub fn cursor(&self, id: &ParticipantId) -> Option<CursorPosition> {
        self.cursors.get(id).copied()
    }

    pub fn name(&self, id: &ParticipantId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    pub fn cursor_count(&self) -> usize {
        self.cursors.len()
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Point-in-time copy of every tracked cursor joined with its name
    ///
    /// Only participants that have reported a cursor appear. A participant
    /// without a registered name gets `name: None`.
    pub fn snapshot_cursors(&self) -> BTreeMap<ParticipantId, CursorState> {
        self.cursors
            .iter()
            .map(|(id, position)| {
                let name = self.names.get(id).cloned();
                (id.clone(), CursorState::new(id.clone(), *position, name))
            })
            .collect()
    }

    /// Every registered name except `excluding`, in registration order
    pub fn snapshot_names(&self, excluding: &ParticipantId) -> Vec<RegisteredName> {
        self.names
            .iter()
            .filter(|(id, _)| *id != excluding)
            .map(|(id, name)| RegisteredName {
                id: id.clone(),
                name: name.clone(),
            })
            .collect()
    }
}
