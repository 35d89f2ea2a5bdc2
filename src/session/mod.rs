//! Server and client sessions.
//!
//! Both sides are transport-free: the host owns the sockets and calls in
//! with open, message, close and tick events, then drains the queued
//! outbound text.
//!
//! - `connection` - Per-socket outbound queue and close state (server side)
//! - `server` - The authoritative game behind every connection
//! - `client` - One player's mirror of the server's game

pub mod client;
pub mod connection;
pub mod server;

pub use client::{Client, ClientConnection, ClientEndpoint, CLOSE_GOING_AWAY};
pub use connection::{Connection, ConnectionManager, ConnectionStatus, OutboundMessage};
pub use server::{Server, ServerEndpoint};
