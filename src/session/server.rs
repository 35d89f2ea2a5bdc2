//! The authoritative game server, minus the socket.
//!
//! The host accepts sockets and feeds [`Server`] one event at a time:
//! [`Server::connect`], [`Server::receive`], [`Server::disconnect`] and
//! [`Server::tick`]. Outbound text for each player is queued on its
//! connection and drained with [`Server::take_outgoing`]. When a
//! connection has been closed by the server, [`Server::close_reason`] gives
//! the JSON to put in the close frame.

use chrono::{DateTime, Utc};

use super::connection::{Connection, ConnectionManager, OutboundMessage};
use crate::config::ServerConfig;
use crate::error::{CloseReason, Error};
use crate::protocol::{
    Announce, Announcement, Endpoint, Network, ParsedClientPacket, Role, Sender, ServerPacket,
};
use crate::state::{
    Allow, CellChangeOptions, Game, GameStatus, Player, PlayerChange, PlayerChangeOptions,
    PlayerField, Puzzle, PuzzleSource, SelectionOptions,
};

/// Authority endpoint: fans announcements out to connections and deals
/// puzzles.
pub struct ServerEndpoint {
    connections: ConnectionManager,
    puzzles: Box<dyn PuzzleSource>,
}

impl ServerEndpoint {
    pub fn new(puzzles: Box<dyn PuzzleSource>) -> Self {
        Self {
            connections: ConnectionManager::new(),
            puzzles,
        }
    }

    pub fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    fn send_to(&mut self, player_id: &str, packet: &ServerPacket) -> Result<(), Error> {
        let text = packet.to_json()?;
        if let Some(conn) = self.connections.get_mut(player_id) {
            conn.send(text);
        }
        Ok(())
    }

    fn broadcast(&mut self, packet: &ServerPacket, except: Option<&str>) -> Result<(), Error> {
        let text = packet.to_json()?;
        self.connections.broadcast(&text, except);
        Ok(())
    }
}

impl Endpoint for ServerEndpoint {
    fn role(&self) -> Role {
        Role::Authority
    }

    fn announce(
        &mut self,
        announcement: Announcement,
        except_player_id: Option<&str>,
    ) -> Result<(), Error> {
        let packet = ServerPacket::from(announcement);
        tracing::trace!(packet = packet.type_name(), except = ?except_player_id, "Announcing");
        self.broadcast(&packet, except_player_id)
    }

    /// Draws a puzzle other than the one this player was last given.
    fn assign_puzzle(&mut self, player_id: &str) -> Result<Puzzle, Error> {
        let previous = self
            .connections
            .get(player_id)
            .and_then(|conn| conn.puzzle_index);
        let (index, puzzle) = self.puzzles.next_puzzle(previous)?;
        if let Some(conn) = self.connections.get_mut(player_id) {
            conn.puzzle_index = Some(index);
        }
        tracing::debug!(player = player_id, index, ?previous, "Puzzle assigned");
        Ok(puzzle)
    }
}

pub struct Server {
    game: Game<ServerEndpoint>,
    network: Network,
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig, puzzles: impl PuzzleSource + 'static) -> Self {
        let endpoint = ServerEndpoint::new(Box::new(puzzles));
        let game = Game::new(endpoint, config.rules).with_tick_interval(config.tick_interval());
        Self {
            game,
            network: Network::new(),
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn game(&self) -> &Game<ServerEndpoint> {
        &self.game
    }

    pub fn game_mut(&mut self) -> &mut Game<ServerEndpoint> {
        &mut self.game
    }

    pub fn connection(&self, player_id: &str) -> Option<&Connection> {
        self.game.endpoint().connections().get(player_id)
    }

    /// Accept a new socket. Returns the new player's id.
    ///
    /// Refused with [`Error::GameNotInLobby`] once the game has started; the
    /// host should close the socket with that error's close reason.
    pub fn connect(&mut self) -> Result<String, Error> {
        if self.game.status() != GameStatus::Lobby {
            tracing::info!(
                status = self.game.status().as_str(),
                "Refusing connection, game is not in lobby"
            );
            return Err(Error::GameNotInLobby);
        }

        let player_id = uuid::Uuid::new_v4().to_string();
        let player = Player::with_max_health(player_id.as_str(), self.config.max_health);
        let player_state = player.player_state(false);

        self.game
            .endpoint_mut()
            .connections
            .add(Connection::new(player_id.as_str()));
        self.game.add_player(player);

        let init = ServerPacket::Init {
            player_id: player_id.clone(),
            game_state: self.game.game_state(false),
        };
        let endpoint = self.game.endpoint_mut();
        endpoint.send_to(&player_id, &init)?;
        endpoint.broadcast(&ServerPacket::PlayerJoin { player_state }, None)?;

        tracing::info!(
            player = %player_id,
            open = self.game.endpoint().connections.open_count(),
            "Player connected"
        );
        Ok(player_id)
    }

    /// Handle one message from `player_id`.
    ///
    /// Any error caused by the client closes its connection with the
    /// matching close reason. Server-side failures leave the connection
    /// open. The error is returned either way.
    pub fn receive(&mut self, player_id: &str, text: &str) -> Result<(), Error> {
        let Some(conn) = self.game.endpoint_mut().connections.get_mut(player_id) else {
            return Err(Error::UnknownPlayer(player_id.to_string()));
        };
        if !conn.status.is_open() {
            tracing::debug!(player = player_id, "Dropping message on closed connection");
            return Ok(());
        }
        conn.touch();

        let result = self.handle(player_id, text);
        match &result {
            Err(err) if err.is_client_fault() => {
                let reason = err.close_reason();
                tracing::warn!(
                    player = player_id,
                    error = %err,
                    reason = %reason,
                    "Closing connection"
                );
                self.game
                    .endpoint_mut()
                    .connections
                    .close(player_id, reason);
            }
            Err(err) => {
                tracing::error!(player = player_id, error = %err, "Failed to handle packet");
            }
            Ok(()) => {}
        }
        result
    }

    fn handle(&mut self, sender: &str, text: &str) -> Result<(), Error> {
        let packet = self
            .network
            .parse_client_packet(text, &self.game, Sender::Player(sender.to_string()))?;
        tracing::debug!(player = sender, packet = packet.type_name(), "Received packet");

        let echo = Announce::except(sender);
        match packet {
            ParsedClientPacket::PlayerChange {
                player_id,
                player_change,
            } => {
                check_same_player(sender, &player_id)?;
                self.game.change_player(
                    sender,
                    player_change,
                    PlayerChangeOptions::new(Allow::Only(vec![PlayerField::Ready]), echo),
                )
            }
            ParsedClientPacket::SelectionChange {
                board_id,
                selection_change,
            } => {
                self.check_own_board(sender, &board_id)?;
                self.game
                    .change_selection(&board_id, selection_change, SelectionOptions::new(echo))
                    .map(|_| ())
            }
            ParsedClientPacket::CellChange {
                board_id,
                position,
                cell_change,
            } => {
                self.check_own_board(sender, &board_id)?;
                self.game.change_cell(
                    &board_id,
                    position,
                    &cell_change,
                    CellChangeOptions::new(echo),
                )
            }
            ParsedClientPacket::Ready { player_id } => {
                check_same_player(sender, &player_id)?;
                self.game.change_player(
                    sender,
                    PlayerChange::ready(true),
                    PlayerChangeOptions::new(Allow::Only(vec![PlayerField::Ready]), Announce::All),
                )
            }
            ParsedClientPacket::RequestNewBoard { player_id } => {
                check_same_player(sender, &player_id)?;
                self.game.assign_board(sender)
            }
        }
    }

    fn check_own_board(&self, player_id: &str, board_id: &str) -> Result<(), Error> {
        let board = self
            .game
            .player(player_id)
            .ok_or_else(|| Error::UnknownPlayer(player_id.to_string()))?
            .board()
            .ok_or(Error::NoBoard)?;
        if board.id() != board_id {
            return Err(Error::BoardMismatch {
                expected: board.id().to_string(),
                actual: board_id.to_string(),
            });
        }
        Ok(())
    }

    /// Forget a player whose socket closed, and tell everyone else.
    pub fn disconnect(&mut self, player_id: &str) -> Result<(), Error> {
        let endpoint = self.game.endpoint_mut();
        let Some(conn) = endpoint.connections.remove(player_id) else {
            return Err(Error::UnknownPlayer(player_id.to_string()));
        };
        endpoint.broadcast(
            &ServerPacket::PlayerLeave {
                player_id: player_id.to_string(),
            },
            None,
        )?;
        self.game.remove_player(player_id);

        tracing::info!(
            player = player_id,
            connected_secs = (Utc::now() - conn.connected_at).num_seconds(),
            open = self.game.endpoint().connections.open_count(),
            "Player disconnected"
        );
        Ok(())
    }

    /// Drive the health-drain loop.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<u32, Error> {
        self.game.tick(now)
    }

    pub fn next_tick_at(&self) -> Option<DateTime<Utc>> {
        self.game.next_tick_at()
    }

    /// Drain the messages queued for `player_id`.
    pub fn take_outgoing(&mut self, player_id: &str) -> Vec<OutboundMessage> {
        self.game
            .endpoint_mut()
            .connections
            .get_mut(player_id)
            .map(Connection::take_outbox)
            .unwrap_or_default()
    }

    /// Why the server closed `player_id`'s connection, if it did.
    pub fn close_reason(&self, player_id: &str) -> Option<CloseReason> {
        self.connection(player_id).and_then(Connection::close_reason)
    }
}

fn check_same_player(sender: &str, player_id: &str) -> Result<(), Error> {
    if sender != player_id {
        return Err(Error::PlayerMismatch {
            expected: sender.to_string(),
            actual: player_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloseCode;
    use crate::state::testing::fixture_puzzle;
    use crate::state::{CellStatus, Position, PuzzleBank};
    use chrono::TimeDelta;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    /// Hands out the fixture puzzle until `limit` draws, then fails.
    struct LimitedSource {
        draws: usize,
        limit: usize,
    }

    impl PuzzleSource for LimitedSource {
        fn next_puzzle(&mut self, _previous: Option<usize>) -> Result<(usize, Puzzle), Error> {
            if self.draws >= self.limit {
                return Err(Error::NoPuzzles);
            }
            self.draws += 1;
            Ok((0, fixture_puzzle()))
        }
    }

    fn server() -> Server {
        let bank = PuzzleBank::with_seed(vec![fixture_puzzle()], 1);
        Server::new(ServerConfig::default(), bank)
    }

    fn drain(server: &mut Server, player_id: &str) -> Vec<Value> {
        server
            .take_outgoing(player_id)
            .into_iter()
            .map(|m| serde_json::from_str(&m.text).unwrap())
            .collect()
    }

    fn types(messages: &[Value]) -> Vec<String> {
        messages
            .iter()
            .map(|m| m["type"].as_str().unwrap().to_string())
            .collect()
    }

    fn send(server: &mut Server, player_id: &str, packet: Value) -> Result<(), Error> {
        server.receive(player_id, &packet.to_string())
    }

    fn board_id(server: &Server, player_id: &str) -> String {
        server
            .game()
            .player(player_id)
            .unwrap()
            .board()
            .unwrap()
            .id()
            .to_string()
    }

    /// Two connected players, both ready, game started, outboxes drained.
    fn started() -> (Server, String, String) {
        let mut server = server();
        let p1 = server.connect().unwrap();
        let p2 = server.connect().unwrap();
        for id in [&p1, &p2] {
            send(&mut server, id, json!({"type": "ready", "playerId": id})).unwrap();
        }
        assert_eq!(server.game().status(), GameStatus::Playing);
        drain(&mut server, &p1);
        drain(&mut server, &p2);
        (server, p1, p2)
    }

    #[test]
    fn test_connect_sends_init_and_join() {
        let mut server = server();
        let p1 = server.connect().unwrap();
        let p2 = server.connect().unwrap();

        let to_p1 = drain(&mut server, &p1);
        assert_eq!(types(&to_p1), vec!["init", "playerJoin", "playerJoin"]);
        assert_eq!(to_p1[0]["playerId"], json!(p1));
        assert_eq!(to_p1[2]["playerState"]["id"], json!(p2));

        let to_p2 = drain(&mut server, &p2);
        assert_eq!(types(&to_p2), vec!["init", "playerJoin"]);
        assert_eq!(to_p2[0]["gameState"]["playerStates"].as_array().unwrap().len(), 2);
        assert_eq!(to_p2[0]["gameState"]["status"], json!({"type": "lobby"}));
    }

    #[test]
    fn test_ready_flow_starts_game() {
        let mut server = server();
        let p1 = server.connect().unwrap();
        let p2 = server.connect().unwrap();
        drain(&mut server, &p1);
        drain(&mut server, &p2);

        send(
            &mut server,
            &p1,
            json!({"type": "playerChange", "playerId": p1, "playerChange": {"ready": true}}),
        )
        .unwrap();
        assert!(drain(&mut server, &p1).is_empty());
        assert_eq!(types(&drain(&mut server, &p2)), vec!["playerChange"]);

        send(&mut server, &p2, json!({"type": "ready", "playerId": p2})).unwrap();
        assert_eq!(server.game().status(), GameStatus::Playing);
        assert!(server.next_tick_at().is_some());

        let to_p1 = drain(&mut server, &p1);
        assert_eq!(
            types(&to_p1),
            vec!["playerChange", "playerChange", "playerChange", "gameChange"]
        );
        assert_eq!(to_p1[3]["gameChange"], json!({"status": {"type": "playing"}}));
        assert!(server.connection(&p1).unwrap().puzzle_index.is_some());
    }

    #[test]
    fn test_connect_refused_after_start() {
        let (mut server, _, _) = started();
        let err = server.connect().unwrap_err();
        assert_eq!(err, Error::GameNotInLobby);
        assert_eq!(err.close_reason().to_json(), r#"{"error":"GAME_NOT_IN_LOBBY"}"#);
    }

    #[test]
    fn test_cell_change_echo_and_marking() {
        let (mut server, p1, p2) = started();
        let board = board_id(&server, &p1);

        for (x, letter) in [(1, "A"), (2, "B"), (3, "C")] {
            send(
                &mut server,
                &p1,
                json!({
                    "type": "cellChange",
                    "boardId": board,
                    "cellPosition": {"x": x, "y": 0},
                    "cellChange": {"letter": letter}
                }),
            )
            .unwrap();
        }

        // The sender only hears about the marking.
        let to_p1 = drain(&mut server, &p1);
        assert_eq!(to_p1.len(), 3);
        assert!(to_p1
            .iter()
            .all(|m| m["cellChange"]["status"] == json!("knownCorrect")));

        let to_p2 = drain(&mut server, &p2);
        assert_eq!(to_p2.len(), 6);

        let cell = server
            .game()
            .board_by_id(&board)
            .unwrap()
            .cell_at(Position::new(2, 0))
            .unwrap()
            .status();
        assert_eq!(cell, CellStatus::KnownCorrect);
    }

    #[test]
    fn test_foreign_board_closes_connection() {
        let (mut server, p1, p2) = started();
        let other = board_id(&server, &p2);

        let err = send(
            &mut server,
            &p1,
            json!({
                "type": "cellChange",
                "boardId": other,
                "cellPosition": {"x": 1, "y": 0},
                "cellChange": {"letter": "Z"}
            }),
        )
        .unwrap_err();
        assert!(matches!(err, Error::BoardMismatch { .. }));
        assert_eq!(
            server.close_reason(&p1),
            Some(CloseReason::new(CloseCode::InvalidPacket))
        );

        // Later messages on the closed connection are dropped.
        assert!(send(&mut server, &p1, json!({"type": "ready", "playerId": p1})).is_ok());
        assert!(drain(&mut server, &p2).is_empty());
    }

    #[test]
    fn test_forbidden_player_fields() {
        let mut server = server();
        let p1 = server.connect().unwrap();
        let err = send(
            &mut server,
            &p1,
            json!({"type": "playerChange", "playerId": p1, "playerChange": {"health": 1000}}),
        )
        .unwrap_err();
        assert_eq!(err, Error::PermissionDenied("health"));
        assert_eq!(server.game().player(&p1).unwrap().health(), 100);
        assert_eq!(
            server.close_reason(&p1).map(|r| r.error),
            Some(CloseCode::InvalidPacket)
        );
    }

    #[test]
    fn test_other_players_id_rejected() {
        let mut server = server();
        let p1 = server.connect().unwrap();
        let p2 = server.connect().unwrap();
        let err = send(&mut server, &p1, json!({"type": "ready", "playerId": p2})).unwrap_err();
        assert!(matches!(err, Error::PlayerMismatch { .. }));
        assert!(!server.game().player(&p2).unwrap().is_ready());
    }

    #[test]
    fn test_puzzle_failure_keeps_connection_and_lobby() {
        let source = LimitedSource { draws: 0, limit: 1 };
        let mut server = Server::new(ServerConfig::default(), source);
        let p1 = server.connect().unwrap();
        let p2 = server.connect().unwrap();
        send(&mut server, &p1, json!({"type": "ready", "playerId": p1})).unwrap();
        drain(&mut server, &p1);
        drain(&mut server, &p2);

        let err = send(&mut server, &p2, json!({"type": "ready", "playerId": p2})).unwrap_err();
        assert_eq!(err, Error::NoPuzzles);
        assert!(!err.is_client_fault());
        assert_eq!(server.close_reason(&p2), None);

        assert_eq!(server.game().status(), GameStatus::Lobby);
        assert!(server.game().players().all(|p| p.board().is_none()));
        // Only the ready flag went out; no board was dealt.
        assert_eq!(types(&drain(&mut server, &p1)), vec!["playerChange"]);
    }

    #[test]
    fn test_garbage_closes_connection() {
        let mut server = server();
        let p1 = server.connect().unwrap();
        assert!(server.receive(&p1, "hello").is_err());
        assert_eq!(
            server.close_reason(&p1).map(|r| r.error),
            Some(CloseCode::InvalidPacket)
        );
    }

    #[test]
    fn test_request_new_board() {
        let mut server = Server::new(ServerConfig::default(), PuzzleBank::builtin());
        let p1 = server.connect().unwrap();
        send(&mut server, &p1, json!({"type": "ready", "playerId": p1})).unwrap();
        let first_board = board_id(&server, &p1);
        let first_index = server.connection(&p1).unwrap().puzzle_index;
        drain(&mut server, &p1);

        send(&mut server, &p1, json!({"type": "requestNewBoard", "playerId": p1})).unwrap();
        assert_ne!(board_id(&server, &p1), first_board);
        assert_ne!(server.connection(&p1).unwrap().puzzle_index, first_index);

        let to_p1 = drain(&mut server, &p1);
        assert_eq!(types(&to_p1), vec!["playerChange"]);
        assert_eq!(
            to_p1[0]["playerChange"]["board"]["words"][0]["letters"][0],
            json!({"type": "unknown"})
        );
    }

    #[test]
    fn test_disconnect_broadcasts_leave() {
        let mut server = server();
        let p1 = server.connect().unwrap();
        let p2 = server.connect().unwrap();
        drain(&mut server, &p1);

        server.disconnect(&p2).unwrap();
        assert!(server.game().player(&p2).is_none());
        assert_eq!(
            drain(&mut server, &p1),
            vec![json!({"type": "playerLeave", "playerId": p2})]
        );
        assert!(server.disconnect(&p2).is_err());
    }

    #[test]
    fn test_tick_drains_and_announces() {
        let (mut server, p1, p2) = started();
        let start = server.game().started_playing_at().unwrap();

        assert_eq!(server.tick(start + TimeDelta::seconds(3)).unwrap(), 1);
        let to_p1 = drain(&mut server, &p1);
        assert_eq!(types(&to_p1), vec!["playerChange", "playerChange"]);
        assert!(to_p1
            .iter()
            .all(|m| m["playerChange"] == json!({"health": 99})));
        assert_eq!(server.game().player(&p2).unwrap().health(), 99);
    }
}
