//! Hub task that owns the [`Relay`]
//!
//! All socket tasks talk to the relay through a [`RelayHandle`]. Commands
//! land on one unbounded channel and the hub applies them one at a time, so
//! a connect snapshot can never interleave with an edit, and each
//! connection's events are applied in the order that connection sent them.

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Outbox, Relay};
use crate::error::{RelayError, RelayResult};
use crate::protocol::ClientMessage;
use crate::types::ParticipantId;

enum Command {
    Connect {
        outbox: Outbox,
        reply: oneshot::Sender<ParticipantId>,
    },
    Message {
        id: ParticipantId,
        message: ClientMessage,
    },
    Disconnect {
        id: ParticipantId,
    },
    Stats {
        reply: oneshot::Sender<RelayStats>,
    },
}

/// Point-in-time counters for the health endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayStats {
    /// Live connections
    pub participants: usize,
    /// Live connections with a registered name
    pub named: usize,
    /// Participants that have reported a cursor
    pub cursors: usize,
    /// Current document length in bytes
    pub text_length: usize,
}

impl RelayStats {
    fn collect(relay: &Relay) -> Self {
        Self {
            participants: relay.participant_count(),
            named: relay.named_count(),
            cursors: relay.store().cursor_count(),
            text_length: relay.store().text().len(),
        }
    }
}

/// Cloneable handle to a running hub
///
/// The hub stops once every handle has been dropped.
#[derive(Clone)]
pub struct RelayHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl RelayHandle {
    /// Spawn the hub task around `relay`
    ///
    /// The join handle yields the relay back when the hub stops, which lets
    /// callers inspect final state.
    pub fn spawn(relay: Relay) -> (Self, JoinHandle<Relay>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_hub(relay, rx));
        (Self { commands }, task)
    }

    /// Register a new connection and get its id
    ///
    /// The snapshots are already queued on `outbox` when this returns.
    pub async fn connect(&self, outbox: Outbox) -> RelayResult<ParticipantId> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect { outbox, reply })?;
        rx.await.map_err(|_| RelayError::HubClosed)
    }

    /// Queue a client event; fire-and-forget
    pub fn submit(&self, id: &ParticipantId, message: ClientMessage) -> RelayResult<()> {
        self.send(Command::Message {
            id: id.clone(),
            message,
        })
    }

    /// Queue the disconnect of a connection; fire-and-forget
    pub fn disconnect(&self, id: &ParticipantId) -> RelayResult<()> {
        self.send(Command::Disconnect { id: id.clone() })
    }

    /// Current counters
    pub async fn stats(&self) -> RelayResult<RelayStats> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Stats { reply })?;
        rx.await.map_err(|_| RelayError::HubClosed)
    }

    fn send(&self, command: Command) -> RelayResult<()> {
        self.commands.send(command).map_err(|_| RelayError::HubClosed)
    }
}

async fn run_hub(mut relay: Relay, mut commands: mpsc::UnboundedReceiver<Command>) -> Relay {
    info!("Relay hub started");

    while let Some(command) = commands.recv().await {
        match command {
            Command::Connect { outbox, reply } => {
                let id = relay.connect(outbox);
                if reply.send(id.clone()).is_err() {
                    // Caller went away before learning its id
                    relay.disconnect(&id);
                }
            }
            Command::Message { id, message } => {
                if let Err(e) = relay.handle(&id, message) {
                    warn!(participant = %id.short(), error = %e, "Dropping event");
                }
            }
            Command::Disconnect { id } => {
                if !relay.disconnect(&id) {
                    debug!(participant = %id.short(), "Disconnect for unknown participant");
                }
            }
            Command::Stats { reply } => {
                let _ = reply.send(RelayStats::collect(&relay));
            }
        }
    }

    info!(participants = relay.participant_count(), "Relay hub stopped");
    relay
}
