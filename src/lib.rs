//! Crossword State Library
//!
//! Shared state model and sync protocol for a multiplayer crossword game.
//!
//! # Overview
//!
//! - **State** - Boards built from puzzles, with cells, words, selection and
//!   keyboard input; players with health and a ready flag; the game that
//!   ties them together.
//!
//! - **Protocol** - Every mutation can be announced through an
//!   [`Endpoint`](protocol::Endpoint). Inbound packets are parsed and their
//!   board, cell and player references resolved against the local game.
//!
//! - **Sessions** - A transport-free [`Server`] (the authority) and
//!   [`Client`] (a participant) driving the same game code.
//!
//! # Design Principles
//!
//! 1. **One model, two roles** - Server and client run the same `Game`; only
//!    the endpoint's role decides who grades words and drains health.
//!
//! 2. **No back-pointers** - Cells and words refer to each other by
//!    position and id. Game rules reach a board through an observer passed
//!    into each mutation.
//!
//! 3. **No networking** - The host owns the sockets and the clock.
//!
//! 4. **Serialization-ready** - Every change and snapshot is JSON on the wire.
//!
//! # Example
//!
//! ```rust
//! use crossword_state::{
//!     config::ServerConfig,
//!     session::{Client, Server},
//!     state::PuzzleBank,
//! };
//!
//! let mut server = Server::new(ServerConfig::default(), PuzzleBank::builtin());
//! let mut client = Client::default();
//!
//! client.on_open().unwrap();
//! let player_id = server.connect().unwrap();
//! for message in server.take_outgoing(&player_id) {
//!     client.on_message(&message.text).unwrap();
//! }
//! assert_eq!(client.player_id(), Some(player_id.as_str()));
//!
//! client.toggle_ready().unwrap();
//! for packet in client.take_outgoing() {
//!     server.receive(&player_id, &packet.to_json().unwrap()).unwrap();
//! }
//! assert!(server.game().player(&player_id).unwrap().board().is_some());
//! ```

pub mod config;
pub mod error;
pub mod protocol;
pub mod session;
pub mod state;

pub use error::{CloseCode, CloseReason, Error, ErrorKind};
pub use session::{Client, Server};
