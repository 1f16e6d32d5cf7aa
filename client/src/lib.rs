//! # Scoreboard Client Library
//!
//! This library provides the client side of the scoreboard system: the
//! displays that show a game and the controllers that edit it. Both keep a
//! local copy of one game's state and follow the server's changes.
//!
//! ## Architecture Overview
//!
//! ### Full-State Handshake
//! On every (re)connect the client asks for the whole document before it
//! trusts anything. Partial updates are only applied on top of a state the
//! server has handed over in full.
//!
//! ### Optimistic Edits
//! A controller applies its own edits immediately and keeps them in a queue
//! until the server acknowledges them. The displayed state is always the
//! confirmed state plus the unacknowledged edits.
//!
//! ### Revision Tracking
//! Every server change carries a revision. A gap in revisions, an
//! unexpected ack or a heartbeat that disagrees with the local copy means a
//! message was missed; the client then drops its speculative edits and
//! requests the full state again.
//!
//! ## Module Organization
//!
//! ### Reconciler Module (`reconciler`)
//! The sync state machine:
//! - `Disconnected → Connecting → AwaitingFullState → Synced`
//! - Confirmed state, pending edits and the merged view
//! - Desync detection and resync requests
//!
//! ### Input Module (`input`)
//! Parses controller commands such as `home.score=2` or `clock=2:00` into
//! partial edits.
//!
//! ### Probe Module (`probe`)
//! Best-effort UDP round-trip measurements.
//!
//! ### Rendering Module (`rendering`)
//! Text scoreboard and sync status output.
//!
//! ### Network Module (`network`)
//! WebSocket session, reconnect with backoff and the client event loop.
//!
//! ## Usage Example
//!
//! ```rust
//! use client::reconciler::Reconciler;
//! use shared::{GameState, ServerEvent};
//!
//! let mut reconciler = Reconciler::new("default");
//! let handshake = reconciler.on_connected();
//! // send `handshake` to the server, then feed every server event back in:
//! # let state: GameState = serde_json::from_value(serde_json::json!({
//! #     "home": { "name": "Home", "color": "#f00", "score": 0 },
//! #     "away": { "name": "Away", "color": "#00f", "score": 0 },
//! #     "time": { "mode": "stopped", "time": 900.0, "period": { "type": "period", "number": 1 } }
//! # })).unwrap();
//! let reaction = reconciler.handle(ServerEvent::FullState {
//!     gid: "default".to_string(),
//!     revision: 0,
//!     state,
//! });
//! assert!(reaction.changed);
//! assert!(reconciler.is_synced());
//! # let _ = handshake;
//! ```

pub mod input;
pub mod network;
pub mod probe;
pub mod reconciler;
pub mod rendering;
