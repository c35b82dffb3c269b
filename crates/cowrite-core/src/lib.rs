//! cowrite Core Library
//!
//! Real-time text collaboration relay: one shared document and a set of
//! participant cursors, broadcast to everyone connected.
//!
//! ## Overview
//!
//! Every participant holds a WebSocket connection. Edits always carry the
//! complete document text and the most recent write wins; there is no merge
//! or transform step. Cursor moves and display names are fanned out to the
//! other participants, and a late joiner receives a snapshot of the current
//! text and cursors before anything else.
//!
//! ## Components
//!
//! - [`SessionStore`]: the shared text, cursor map and name map
//! - [`Relay`]: per-connection state machine and broadcast routing
//! - [`RelayHandle`]: front door to the hub task that owns the relay
//! - [`server`]: axum router exposing `/ws` and `/health`
//!
//! ## Quick Start
//!
//! ```ignore
//! use cowrite_core::{server, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RelayConfig::from_env()?;
//!     server::run(config, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod protocol;
pub mod relay;
pub mod server;
pub mod store;
pub mod types;

// Re-exports
pub use config::{ConfigOverrides, RelayConfig};
pub use error::{RelayError, RelayResult};
pub use protocol::{ClientMessage, ServerMessage};
pub use relay::{outbox, ConnectionState, Outbox, Relay, RelayHandle, RelayStats, OUTBOX_CAPACITY};
pub use store::SessionStore;
pub use types::*;
