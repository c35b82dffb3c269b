//! JSONL event log for relay instances.
//!
//! Console output goes through `tracing_subscriber::fmt`; this module adds an
//! optional machine-readable trail. Each relay instance appends to its own
//! file, one JSON object per tracing event:
//!
//! ```text
//! logs/
//! ├── 2026-10-18_relay-4000.jsonl
//! └── 2026-10-18_relay-4001.jsonl
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use cowrite_core::logging::JsonlLayer;
//! use tracing_subscriber::prelude::*;
//!
//! tracing_subscriber::registry()
//!     .with(tracing_subscriber::fmt::layer())
//!     .with(JsonlLayer::new("./logs", "relay-4000")?)
//!     .init();
//! ```
//!
//! ## Querying with jq
//!
//! ```bash
//! # Every disconnect
//! jq 'select(.msg == "Participant disconnected")' logs/*.jsonl
//!
//! # Rejected frames
//! jq 'select(.level == "warn")' logs/*.jsonl
//! ```

pub mod entry;
pub mod layer;
pub mod writer;

pub use entry::JsonLogEntry;
pub use layer::JsonlLayer;
pub use writer::{read_entries, InstanceLogWriter};
