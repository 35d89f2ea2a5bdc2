//! Change propagation between a game and its peers.
//!
//! - `endpoint` - The [`Endpoint`] trait and the announcements it carries
//! - `packet` - Wire packets in both directions
//! - `network` - Inbound parsing with reference resolution

pub mod endpoint;
pub mod network;
pub mod packet;

pub use endpoint::{Announce, Announcement, Endpoint, Role};
pub use network::{Network, ParsedClientPacket, ParsedServerPacket, Sender};
pub use packet::{ClientPacket, ServerPacket};

#[cfg(test)]
pub(crate) use endpoint::testing;
