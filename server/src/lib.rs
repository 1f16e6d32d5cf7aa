//! # Scoreboard Server Library
//!
//! This library provides the authoritative server for live scoreboards. It
//! owns the canonical game state for every game id, applies edits sent by
//! controllers, and pushes the results to every display watching that game.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The server holds the one true document per game. Controllers send whole
//! documents or partial patches; the server merges them, validates the
//! result, bumps the game's revision and only then tells anyone about it.
//!
//! ### Channel Management
//! Each game id has a channel. Connections join a channel when they ask for
//! a game's state or create one, and leave it when they switch games or
//! disconnect. Broadcasts are scoped to a single channel.
//!
//! ### Convergence
//! Every change is stamped with a revision. Senders get an `ack`, everyone
//! else gets the patch, and a periodic `heartbeat` lets clients notice they
//! missed something and ask for a fresh copy.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Dispatch
//! Network tasks decode frames and forward them over a channel to one loop
//! that owns the repository and router. Events are applied strictly one at a
//! time, so no two edits ever interleave on the same game.
//!
//! ### WebSocket Sessions
//! Clients talk JSON over WebSocket. Each connection has its own outbound
//! queue drained by a writer task, so a connection sees events in the order
//! the dispatch loop produced them.
//!
//! ### Latency Probe
//! A UDP socket on the same port answers bincode ping packets. It never
//! touches game state and may drop packets freely.
//!
//! ## Module Organization
//!
//! ### Sports Module (`sports`)
//! Registry of default documents per sport (hockey, football).
//!
//! ### Repository Module (`repository`)
//! Game documents keyed by game id, with revisions:
//! - Lazy creation from the default sport
//! - Whole-document replace and partial merge
//! - Reset and delete
//!
//! ### Channels Module (`channels`)
//! Channel membership and scoped broadcast through the [`channels::Outbox`] trait.
//!
//! ### Client Manager Module (`client_manager`)
//! Connection ids, capacity and per-connection outbound queues.
//!
//! ### Gateway Module (`gateway`)
//! Turns one client event into repository changes and outgoing events.
//!
//! ### Network Module (`network`)
//! Sockets, spawned tasks and the dispatch loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new(ServerConfig {
//!         addr: "127.0.0.1:3000".to_string(),
//!         heartbeat_interval: Duration::from_secs(5),
//!         max_clients: 64,
//!         default_sport: "hockey".to_string(),
//!     })
//!     .await?;
//!
//!     // Accepts connections, answers probes and applies edits until shut down
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod channels;
pub mod client_manager;
pub mod gateway;
pub mod network;
pub mod repository;
pub mod sports;
