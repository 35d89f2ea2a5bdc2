//! Client-side session.
//!
//! Mirrors the server's game from the packets it sends. Local edits go
//! through the same [`Game`] operations and are queued as
//! [`ClientPacket`]s for the host to write to the socket.

use super::connection::ConnectionStatus;
use crate::config::GameRules;
use crate::error::{CloseCode, CloseReason, Error};
use crate::protocol::{
    Announce, Announcement, ClientPacket, Endpoint, Network, ParsedServerPacket, Role, Sender,
};
use crate::state::{
    Allow, CellChangeOptions, Game, GameState, KeyEvent, Player, PlayerChange, PlayerChangeOptions,
    SelectionOptions,
};

/// WebSocket "going away".
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Participant endpoint: queues packets for the server.
#[derive(Debug, Default)]
pub struct ClientEndpoint {
    outbox: Vec<ClientPacket>,
}

impl ClientEndpoint {
    pub fn send(&mut self, packet: ClientPacket) {
        self.outbox.push(packet);
    }

    pub fn take_outbox(&mut self) -> Vec<ClientPacket> {
        std::mem::take(&mut self.outbox)
    }
}

impl Endpoint for ClientEndpoint {
    fn role(&self) -> Role {
        Role::Participant
    }

    /// Everything goes to the server, which decides who else hears it.
    fn announce(
        &mut self,
        announcement: Announcement,
        except_player_id: Option<&str>,
    ) -> Result<(), Error> {
        if except_player_id.is_some() {
            return Err(Error::ExceptOnParticipant);
        }
        self.send(ClientPacket::try_from(announcement)?);
        Ok(())
    }
}

/// Where the client is in its connection lifecycle.
pub enum ClientConnection {
    Connecting,
    Connected,
    InGame {
        player_id: String,
        game: Game<ClientEndpoint>,
    },
    Disconnected {
        reason: CloseReason,
    },
}

impl ClientConnection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::InGame { .. } => "inGame",
            Self::Disconnected { .. } => "disconnected",
        }
    }
}

pub struct Client {
    connection: ClientConnection,
    network: Network,
    rules: GameRules,
}

impl Default for Client {
    fn default() -> Self {
        Self::new(GameRules::default())
    }
}

impl Client {
    pub fn new(rules: GameRules) -> Self {
        Self {
            connection: ClientConnection::Connecting,
            network: Network::new(),
            rules,
        }
    }

    pub fn connection(&self) -> &ClientConnection {
        &self.connection
    }

    pub fn game(&self) -> Option<&Game<ClientEndpoint>> {
        match &self.connection {
            ClientConnection::InGame { game, .. } => Some(game),
            _ => None,
        }
    }

    pub fn player_id(&self) -> Option<&str> {
        match &self.connection {
            ClientConnection::InGame { player_id, .. } => Some(player_id),
            _ => None,
        }
    }

    /// Same view of the socket as the server's [`ConnectionStatus`].
    pub fn status(&self) -> ConnectionStatus {
        match &self.connection {
            ClientConnection::Disconnected { reason } => {
                ConnectionStatus::Closed { reason: *reason }
            }
            _ => ConnectionStatus::Open,
        }
    }

    pub fn on_open(&mut self) -> Result<(), Error> {
        match self.connection {
            ClientConnection::Connecting => {
                tracing::debug!("Socket open, waiting for init");
                self.connection = ClientConnection::Connected;
                Ok(())
            }
            _ => Err(self.unexpected("open")),
        }
    }

    /// Apply one server packet.
    pub fn on_message(&mut self, text: &str) -> Result<(), Error> {
        let packet = self
            .network
            .parse_server_packet(text, self.game(), Sender::Server)?;
        tracing::trace!(
            packet = packet.type_name(),
            state = self.connection.as_str(),
            "Server packet"
        );

        let packet = match packet {
            ParsedServerPacket::Init {
                player_id,
                game_state,
            } => return self.join(player_id, game_state),
            packet => packet,
        };

        let ClientConnection::InGame { player_id, game } = &mut self.connection else {
            return Err(self.unexpected(packet.type_name()));
        };

        match packet {
            ParsedServerPacket::PlayerJoin { player_state } => {
                if player_state.id == *player_id {
                    return Ok(());
                }
                game.add_player(Player::from_player_state(player_state)?);
            }
            ParsedServerPacket::PlayerLeave { player_id } => {
                game.remove_player(&player_id);
            }
            ParsedServerPacket::GameChange { game_change } => {
                game.change(game_change, Announce::Silent)?;
            }
            ParsedServerPacket::SelectionChange {
                board_id,
                selection_change,
            } => {
                game.change_selection(&board_id, selection_change, SelectionOptions::silent())?;
            }
            ParsedServerPacket::CellChange {
                board_id,
                position,
                cell_change,
            } => {
                game.change_cell(&board_id, position, &cell_change, CellChangeOptions::silent())?;
            }
            ParsedServerPacket::PlayerChange {
                player_id,
                player_change,
            } => {
                game.change_player(
                    &player_id,
                    player_change,
                    PlayerChangeOptions::new(Allow::All, Announce::Silent),
                )?;
            }
            ParsedServerPacket::Init { .. } => {
                return Err(Error::UnexpectedPacket {
                    packet: "init",
                    state: "inGame",
                })
            }
        }
        Ok(())
    }

    fn join(&mut self, player_id: String, game_state: GameState) -> Result<(), Error> {
        let ClientConnection::Connected = self.connection else {
            return Err(self.unexpected("init"));
        };
        let game = Game::from_game_state(game_state, ClientEndpoint::default(), self.rules)?;
        tracing::info!(player = %player_id, players = game.players().count(), "Joined game");
        self.connection = ClientConnection::InGame { player_id, game };
        Ok(())
    }

    /// The socket closed. `reason` is the close frame's text.
    pub fn on_close(&mut self, code: u16, reason: &str) {
        let reason = if code == CLOSE_GOING_AWAY {
            CloseReason::new(CloseCode::UserDisconnected)
        } else {
            serde_json::from_str(reason).unwrap_or_else(|err| {
                tracing::warn!(code, reason, error = %err, "Unreadable close reason");
                CloseReason::new(CloseCode::Unknown)
            })
        };
        tracing::info!(code, reason = %reason, "Disconnected");
        self.connection = ClientConnection::Disconnected { reason };
    }

    /// Flip this player's ready flag.
    pub fn toggle_ready(&mut self) -> Result<(), Error> {
        let (player_id, game) = self.in_game()?;
        let ready = !game
            .player(&player_id)
            .ok_or_else(|| Error::UnknownPlayer(player_id.clone()))?
            .is_ready();
        game.change_player(
            &player_id,
            PlayerChange::ready(ready),
            PlayerChangeOptions::new(Allow::All, Announce::All),
        )
    }

    /// Ask the server for a different puzzle.
    pub fn request_new_board(&mut self) -> Result<(), Error> {
        let (player_id, game) = self.in_game()?;
        game.endpoint_mut()
            .send(ClientPacket::RequestNewBoard { player_id });
        Ok(())
    }

    /// Route a key press to this player's board. `false` when there is
    /// no board or the key did nothing.
    pub fn handle_key_down(&mut self, event: &KeyEvent) -> Result<bool, Error> {
        let (player_id, game) = self.in_game()?;
        let Some(board_id) = game
            .player(&player_id)
            .and_then(Player::board)
            .map(|board| board.id().to_string())
        else {
            return Ok(false);
        };
        game.handle_key_down(&board_id, event)
    }

    /// Drain packets queued for the server.
    pub fn take_outgoing(&mut self) -> Vec<ClientPacket> {
        match &mut self.connection {
            ClientConnection::InGame { game, .. } => game.endpoint_mut().take_outbox(),
            _ => Vec::new(),
        }
    }

    pub fn this_player(&self) -> Option<&Player> {
        let player_id = self.player_id()?;
        self.game()?.player(player_id)
    }

    /// Everyone else, by id.
    pub fn other_players(&self) -> Vec<&Player> {
        let own = self.player_id();
        self.all_players()
            .into_iter()
            .filter(|player| Some(player.id()) != own)
            .collect()
    }

    /// All players, by id.
    pub fn all_players(&self) -> Vec<&Player> {
        let Some(game) = self.game() else {
            return Vec::new();
        };
        let mut players: Vec<&Player> = game.players().collect();
        players.sort_by(|a, b| a.id().cmp(b.id()));
        players
    }

    fn in_game(&mut self) -> Result<(String, &mut Game<ClientEndpoint>), Error> {
        match &mut self.connection {
            ClientConnection::InGame { player_id, game } => Ok((player_id.clone(), game)),
            _ => Err(Error::NoGame),
        }
    }

    fn unexpected(&self, packet: &'static str) -> Error {
        Error::UnexpectedPacket {
            packet,
            state: self.connection.as_str(),
        }
    }
}
