//! Connection manager: per-connection state and broadcast routing
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  RelayHandle (cloneable, one per socket task)                   │
//! │  └── commands: mpsc::UnboundedSender<Command>                   │
//! │                                                                 │
//! │  hub task (single consumer, run-to-completion per command)      │
//! │  └── Relay                                                      │
//! │      ├── store: SessionStore (text, cursors, names)             │
//! │      └── connections: ParticipantId -> Connection               │
//! │          ├── outbox: Sender<ServerMessage> (bounded)            │
//! │          └── state: Unnamed | Named                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`Relay`] is plain synchronous state; the hub task is the only thing that
//! touches it in a running server, which makes each handler atomic with
//! respect to every other handler without any locking.
//!
//! Outboxes are bounded. A connection whose outbox is full when a message is
//! due has stopped reading; it is dropped through the regular disconnect path
//! once the current event has been fanned out, so the others still see its
//! `cursorRemoved`.

pub mod hub;

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace, warn};

use crate::error::{RelayError, RelayResult};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::store::SessionStore;
use crate::types::{CursorPosition, CursorState, ParticipantId, RegisteredName};

pub use hub::{RelayHandle, RelayStats};

/// Messages a connection may have queued before it counts as stalled
pub const OUTBOX_CAPACITY: usize = 256;

/// Outbound message channel for one connection
///
/// Sends never block; the socket's writer task drains the other end. Create
/// with [`outbox`] or any `mpsc::channel` holding at least the two snapshots.
pub type Outbox = mpsc::Sender<ServerMessage>;

/// New outbox of [`OUTBOX_CAPACITY`] with its receiving end
pub fn outbox() -> (Outbox, mpsc::Receiver<ServerMessage>) {
    mpsc::channel(OUTBOX_CAPACITY)
}

/// Lifecycle state of a live connection
///
/// A disconnected participant is simply no longer known to the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connected, no display name registered yet
    Unnamed,
    /// Connected with a registered display name
    Named,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Unnamed => write!(f, "Unnamed"),
            ConnectionState::Named => write!(f, "Named"),
        }
    }
}

struct Connection {
    outbox: Outbox,
    state: ConnectionState,
}

/// The connection manager
///
/// Owns the [`SessionStore`] and the outbox of every live connection.
#[derive(Default)]
pub struct Relay {
    store: SessionStore,
    connections: HashMap<ParticipantId, Connection>,
    /// Connections whose outbox overflowed during the current step
    stalled: Vec<ParticipantId>,
}

impl Relay {
    /// Create a relay over an empty session
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a relay over an existing session store
    pub fn with_store(store: SessionStore) -> Self {
        Self {
            store,
            ..Self::default()
        }
    }

    /// Read access to the shared state
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Number of live connections
    pub fn participant_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of live connections with a registered name
    pub fn named_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.state == ConnectionState::Named)
            .count()
    }

    /// State of a connection, `None` once it has disconnected
    pub fn state(&self, id: &ParticipantId) -> Option<ConnectionState> {
        self.connections.get(id).map(|c| c.state)
    }

    pub fn is_connected(&self, id: &ParticipantId) -> bool {
        self.connections.contains_key(id)
    }

    /// Accept a new connection
    ///
    /// Assigns a fresh id and queues the text snapshot followed by the cursor
    /// snapshot on `outbox` before the connection can receive anything else.
    pub fn connect(&mut self, outbox: Outbox) -> ParticipantId {
        let mut id = ParticipantId::new();
        while self.connections.contains_key(&id) {
            id = ParticipantId::new();
        }

        let text = ServerMessage::TextSnapshot(self.store.text().to_string());
        let cursors = ServerMessage::CursorSnapshot(self.store.snapshot_cursors());
        if !(deliver(&id, &outbox, text) && deliver(&id, &outbox, cursors)) {
            self.stalled.push(id.clone());
        }

        self.connections.insert(
            id.clone(),
            Connection {
                outbox,
                state: ConnectionState::Unnamed,
            },
        );

        info!(participant = %id.short(), total = self.connections.len(), "Participant connected");
        self.drop_stalled();
        id
    }

    /// Apply one client event from a live connection
    pub fn handle(&mut self, id: &ParticipantId, message: ClientMessage) -> RelayResult<()> {
        if !self.connections.contains_key(id) {
            return Err(RelayError::UnknownParticipant(id.clone()));
        }

        trace!(participant = %id.short(), event = message.kind(), "Handling event");

        match message {
            ClientMessage::RegisterName(name) => self.register_name(id, name),
            ClientMessage::TextChange(text) => self.change_text(id, text),
            ClientMessage::CursorMove(position) => self.move_cursor(id, position),
        }

        self.drop_stalled();
        Ok(())
    }

    /// Tear down a connection
    ///
    /// Removes its cursor and name and tells every remaining connection.
    /// Returns `false` if the id was not live (repeat disconnects are no-ops).
    pub fn disconnect(&mut self, id: &ParticipantId) -> bool {
        let removed = self.remove_connection(id);
        self.drop_stalled();
        removed
    }

    fn remove_connection(&mut self, id: &ParticipantId) -> bool {
        if self.connections.remove(id).is_none() {
            return false;
        }

        self.store.remove_participant(id);
        self.broadcast_all(ServerMessage::CursorRemoved(id.clone()));

        info!(participant = %id.short(), total = self.connections.len(), "Participant disconnected");
        true
    }

    /// Disconnect every connection that overflowed, including any that
    /// overflow on the resulting `cursorRemoved` broadcasts
    fn drop_stalled(&mut self) {
        while let Some(id) = self.stalled.pop() {
            if self.connections.contains_key(&id) {
                warn!(participant = %id.short(), "Outbox full, dropping stalled participant");
                self.remove_connection(&id);
            }
        }
    }

    fn queue(&mut self, id: &ParticipantId, message: ServerMessage) {
        if let Some(conn) = self.connections.get(id) {
            if !deliver(id, &conn.outbox, message) {
                self.stalled.push(id.clone());
            }
        }
    }

    fn register_name(&mut self, id: &ParticipantId, name: String) {
        self.store.set_name(id.clone(), name.clone());
        if let Some(conn) = self.connections.get_mut(id) {
            conn.state = ConnectionState::Named;
        }

        debug!(participant = %id.short(), %name, "Name registered");

        self.broadcast_except(
            id,
            ServerMessage::ParticipantRegistered(RegisteredName {
                id: id.clone(),
                name,
            }),
        );

        for existing in self.store.snapshot_names(id) {
            self.queue(id, ServerMessage::ParticipantRegistered(existing));
        }
    }

    fn change_text(&mut self, id: &ParticipantId, text: String) {
        self.store.set_text(text.clone());
        debug!(participant = %id.short(), len = text.len(), "Text replaced");
        self.broadcast_except(id, ServerMessage::TextUpdated(text));
    }

    fn move_cursor(&mut self, id: &ParticipantId, position: CursorPosition) {
        self.store.set_cursor(id.clone(), position);
        let name = self.store.name(id).map(str::to_string);
        self.broadcast_except(
            id,
            ServerMessage::CursorUpdated(CursorState::new(id.clone(), position, name)),
        );
    }

    /// Fan out to every live connection other than `sender`
    fn broadcast_except(&mut self, sender: &ParticipantId, message: ServerMessage) {
        for (id, conn) in self.connections.iter().filter(|(id, _)| *id != sender) {
            if !deliver(id, &conn.outbox, message.clone()) {
                self.stalled.push(id.clone());
            }
        }
    }

    /// Fan out to every live connection
    fn broadcast_all(&mut self, message: ServerMessage) {
        for (id, conn) in &self.connections {
            if !deliver(id, &conn.outbox, message.clone()) {
                self.stalled.push(id.clone());
            }
        }
    }
}

/// Queue without waiting; `false` means the outbox is full
fn deliver(id: &ParticipantId, outbox: &Outbox, message: ServerMessage) -> bool {
    let kind = message.kind();
    match outbox.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            debug!(participant = %id.short(), event = kind, "Outbox full");
            false
        }
        Err(TrySendError::Closed(_)) => {
            // Socket task already gone; its disconnect is on the way
            debug!(participant = %id.short(), event = kind, "Outbox closed, dropping message");
            true
        }
    }
}
