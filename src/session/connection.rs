//! Connection state management.
//!
//! Tracks the server side of each player's socket: its outbound queue,
//! open/closed status, and which puzzle it was last dealt.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::error::CloseReason;

/// Connection state for a single player.
#[derive(Debug, Clone)]
pub struct Connection {
    /// Player id assigned on connect
    pub player_id: String,

    /// Current connection status
    pub status: ConnectionStatus,

    /// When this connection was established
    pub connected_at: DateTime<Utc>,

    /// Last activity timestamp
    pub last_activity: DateTime<Utc>,

    /// Sequence number of the last queued message
    pub send_seq: u64,

    /// Messages waiting for the transport
    pub outbox: Vec<OutboundMessage>,

    /// Index of the puzzle this player was last given
    pub puzzle_index: Option<usize>,
}

/// Connection status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Open,

    /// Closed by the server; the reason goes in the close frame
    Closed { reason: CloseReason },
}

impl ConnectionStatus {
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

/// A serialized packet queued for one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub seq: u64,
    pub text: String,
}

impl Connection {
    pub fn new(player_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            player_id: player_id.into(),
            status: ConnectionStatus::Open,
            connected_at: now,
            last_activity: now,
            send_seq: 0,
            outbox: Vec::new(),
            puzzle_index: None,
        }
    }

    /// Record activity (any message received).
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Queue a message. Returns its sequence number, or `None` if closed.
    pub fn send(&mut self, text: String) -> Option<u64> {
        if !self.status.is_open() {
            return None;
        }
        self.send_seq += 1;
        self.outbox.push(OutboundMessage {
            seq: self.send_seq,
            text,
        });
        Some(self.send_seq)
    }

    /// Drain queued messages, oldest first.
    pub fn take_outbox(&mut self) -> Vec<OutboundMessage> {
        std::mem::take(&mut self.outbox)
    }

    /// Close with `reason`. Already-queued messages stay deliverable.
    pub fn close(&mut self, reason: CloseReason) {
        if self.status.is_open() {
            self.status = ConnectionStatus::Closed { reason };
        }
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        match &self.status {
            ConnectionStatus::Closed { reason } => Some(*reason),
            ConnectionStatus::Open => None,
        }
    }
}

/// Connection manager - tracks all connections by player id.
#[derive(Debug, Default)]
pub struct ConnectionManager {
    connections: HashMap<String, Connection>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conn: Connection) {
        self.connections.insert(conn.player_id.clone(), conn);
    }

    pub fn get(&self, player_id: &str) -> Option<&Connection> {
        self.connections.get(player_id)
    }

    pub fn get_mut(&mut self, player_id: &str) -> Option<&mut Connection> {
        self.connections.get_mut(player_id)
    }

    pub fn remove(&mut self, player_id: &str) -> Option<Connection> {
        self.connections.remove(player_id)
    }

    /// Queue `text` on every open connection except `except`.
    pub fn broadcast(&mut self, text: &str, except: Option<&str>) {
        for (player_id, conn) in &mut self.connections {
            if Some(player_id.as_str()) != except {
                conn.send(text.to_string());
            }
        }
    }

    /// Close a connection with `reason`.
    pub fn close(&mut self, player_id: &str, reason: CloseReason) {
        if let Some(conn) = self.connections.get_mut(player_id) {
            conn.close(reason);
        }
    }

    pub fn open_count(&self) -> usize {
        self.connections
            .values()
            .filter(|c| c.status.is_open())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloseCode;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_connection_new() {
        let conn = Connection::new("p1");
        assert!(conn.status.is_open());
        assert_eq!(conn.send_seq, 0);
        assert_eq!(conn.puzzle_index, None);
    }

    #[test]
    fn test_sequence_numbers() {
        let mut conn = Connection::new("p1");

        assert_eq!(conn.send("a".into()), Some(1));
        assert_eq!(conn.send("b".into()), Some(2));
        assert_eq!(conn.send("c".into()), Some(3));

        let sent: Vec<u64> = conn.take_outbox().iter().map(|m| m.seq).collect();
        assert_eq!(sent, vec![1, 2, 3]);
        assert!(conn.outbox.is_empty());
    }

    #[test]
    fn test_closed_connection_drops_sends() {
        let mut conn = Connection::new("p1");
        conn.send("before".into());
        conn.close(CloseReason::new(CloseCode::InvalidPacket));

        assert_eq!(conn.send("after".into()), None);
        assert_eq!(conn.take_outbox().len(), 1);

        // First reason wins.
        conn.close(CloseReason::new(CloseCode::Unknown));
        assert_eq!(
            conn.close_reason(),
            Some(CloseReason::new(CloseCode::InvalidPacket))
        );
    }

    #[test]
    fn test_manager_broadcast() {
        let mut manager = ConnectionManager::new();
        manager.add(Connection::new("p1"));
        manager.add(Connection::new("p2"));
        manager.add(Connection::new("p3"));
        manager.close("p3", CloseReason::new(CloseCode::Unknown));

        manager.broadcast("hello", Some("p1"));
        assert!(manager.get("p1").unwrap().outbox.is_empty());
        assert_eq!(manager.get("p2").unwrap().outbox.len(), 1);
        assert!(manager.get("p3").unwrap().outbox.is_empty());

        assert_eq!(manager.open_count(), 2);
    }

    #[test]
    fn test_manager_remove() {
        let mut manager = ConnectionManager::new();
        manager.add(Connection::new("p1"));
        assert!(manager.remove("p1").is_some());
        assert!(manager.get("p1").is_none());
    }
}
