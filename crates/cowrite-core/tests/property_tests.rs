//! Property-based tests for the broadcast protocol
//!
//! Random sequences of connects, edits, cursor moves, registrations and
//! disconnects are applied to a [`Relay`] and to a tiny reference model; a
//! participant joining afterwards must see exactly what the model predicts.

use std::collections::{BTreeMap, HashMap};

use cowrite_core::{outbox, ClientMessage, CursorPosition, ParticipantId, Relay, ServerMessage};
use proptest::prelude::*;
use tokio::sync::mpsc::Receiver;

// ============================================================================
// Strategy Generators
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Connect,
    Disconnect(usize),
    Text(usize, String),
    Move(usize, i32, i32),
    Name(usize, String),
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 \n]{0,40}").expect("valid regex")
}

fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z]{1,8}").expect("valid regex")
}

fn ops_strategy(max_ops: usize) -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(
        prop_oneof![
            2 => Just(Op::Connect),
            1 => (0..8usize).prop_map(Op::Disconnect),
            3 => (0..8usize, text_strategy()).prop_map(|(i, t)| Op::Text(i, t)),
            3 => (0..8usize, -500..500i32, -500..500i32).prop_map(|(i, x, y)| Op::Move(i, x, y)),
            2 => (0..8usize, name_strategy()).prop_map(|(i, n)| Op::Name(i, n)),
        ],
        0..max_ops,
    )
}

// ============================================================================
// Reference model
// ============================================================================

#[derive(Default)]
struct Model {
    text: String,
    cursors: HashMap<ParticipantId, (f64, f64)>,
    names: HashMap<ParticipantId, String>,
}

struct Harness {
    relay: Relay,
    model: Model,
    live: Vec<(ParticipantId, Receiver<ServerMessage>)>,
}

impl Harness {
    fn new() -> Self {
        Self {
            relay: Relay::new(),
            model: Model::default(),
            live: Vec::new(),
        }
    }

    fn pick(&self, index: usize) -> Option<ParticipantId> {
        if self.live.is_empty() {
            None
        } else {
            Some(self.live[index % self.live.len()].0.clone())
        }
    }

    fn apply(&mut self, op: Op) {
        match op {
            Op::Connect => {
                let (tx, rx) = outbox();
                let id = self.relay.connect(tx);
                self.live.push((id, rx));
            }
            Op::Disconnect(i) => {
                if let Some(id) = self.pick(i) {
                    self.relay.disconnect(&id);
                    self.live.retain(|(live, _)| *live != id);
                    self.model.cursors.remove(&id);
                    self.model.names.remove(&id);
                }
            }
            Op::Text(i, text) => {
                if let Some(id) = self.pick(i) {
                    self.relay
                        .handle(&id, ClientMessage::TextChange(text.clone()))
                        .unwrap();
                    self.model.text = text;
                }
            }
            Op::Move(i, x, y) => {
                if let Some(id) = self.pick(i) {
                    let position = CursorPosition::new(x as f64, y as f64);
                    self.relay
                        .handle(&id, ClientMessage::CursorMove(position))
                        .unwrap();
                    self.model.cursors.insert(id, (x as f64, y as f64));
                }
            }
            Op::Name(i, name) => {
                if let Some(id) = self.pick(i) {
                    self.relay
                        .handle(&id, ClientMessage::RegisterName(name.clone()))
                        .unwrap();
                    self.model.names.insert(id, name);
                }
            }
        }
    }

    fn drain(&mut self, id: &ParticipantId) -> Vec<ServerMessage> {
        let mut out = Vec::new();
        if let Some((_, rx)) = self.live.iter_mut().find(|(live, _)| live == id) {
            while let Ok(msg) = rx.try_recv() {
                out.push(msg);
            }
        }
        out
    }

    /// Join a fresh participant and return its two snapshot messages
    fn join_snapshot(&mut self) -> (ServerMessage, ServerMessage) {
        let (tx, mut rx) = outbox();
        self.relay.connect(tx);
        let text = rx.try_recv().unwrap();
        let cursors = rx.try_recv().unwrap();
        assert!(rx.try_recv().is_err());
        (text, cursors)
    }
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// A new joiner's text snapshot is the last text written
    #[test]
    fn text_snapshot_is_last_write(ops in ops_strategy(40)) {
        let mut h = Harness::new();
        for op in ops {
            h.apply(op);
        }
        let (text, _) = h.join_snapshot();
        prop_assert_eq!(text, ServerMessage::TextSnapshot(h.model.text.clone()));
    }

    /// The cursor snapshot lists exactly the live participants with cursors
    #[test]
    fn cursor_snapshot_matches_model(ops in ops_strategy(40)) {
        let mut h = Harness::new();
        for op in ops {
            h.apply(op);
        }
        let (_, cursors) = h.join_snapshot();
        let ServerMessage::CursorSnapshot(cursors) = cursors else {
            panic!("second message must be the cursor snapshot");
        };

        let expected: BTreeMap<_, _> = h
            .model
            .cursors
            .iter()
            .map(|(id, (x, y))| (id.clone(), (*x, *y, h.model.names.get(id).cloned())))
            .collect();
        let actual: BTreeMap<_, _> = cursors
            .into_iter()
            .map(|(id, s)| (id, (s.x, s.y, s.name)))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    /// Nobody ever receives their own edit or cursor move
    #[test]
    fn no_self_echo(ops in ops_strategy(40)) {
        let mut h = Harness::new();
        for op in ops {
            let sender = match &op {
                Op::Text(i, _) | Op::Move(i, _, _) => h.pick(*i),
                _ => None,
            };
            if let Some(id) = &sender {
                h.drain(id);
            }
            h.apply(op);
            if let Some(id) = &sender {
                prop_assert!(h.drain(id).is_empty());
            }
        }
    }

    /// Store maps only ever reference live connections
    #[test]
    fn store_tracks_only_live_participants(ops in ops_strategy(40)) {
        let mut h = Harness::new();
        for op in ops {
            h.apply(op);
        }
        prop_assert_eq!(h.relay.participant_count(), h.live.len());
        prop_assert_eq!(h.relay.store().cursor_count(), h.model.cursors.len());
        prop_assert_eq!(h.relay.store().name_count(), h.model.names.len());
        for id in h.model.cursors.keys().chain(h.model.names.keys()) {
            prop_assert!(h.relay.is_connected(id));
        }
    }
}
