//! Inbound packet parsing.
//!
//! Parsing goes past JSON shape: references in a packet (board ids, cell
//! positions, player ids) are resolved against the receiving side's game
//! while parsing, and a packet that names something that doesn't exist is
//! rejected here rather than when it is applied.

use std::cell::RefCell;

use super::endpoint::Endpoint;
use super::packet::{ClientPacket, ServerPacket};
use crate::error::Error;
use crate::state::{
    CellChange, Game, GameChange, GameState, PlayerChange, PlayerState, Position, SelectionChange,
};

/// Who a packet came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sender {
    Player(String),
    Server,
}

/// A client packet with its references checked.
#[derive(Debug)]
pub enum ParsedClientPacket {
    PlayerChange {
        player_id: String,
        player_change: PlayerChange,
    },
    SelectionChange {
        board_id: String,
        selection_change: Option<SelectionChange>,
    },
    CellChange {
        board_id: String,
        position: Position,
        cell_change: CellChange,
    },
    Ready {
        player_id: String,
    },
    RequestNewBoard {
        player_id: String,
    },
}

impl ParsedClientPacket {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PlayerChange { .. } => "playerChange",
            Self::SelectionChange { .. } => "selectionChange",
            Self::CellChange { .. } => "cellChange",
            Self::Ready { .. } => "ready",
            Self::RequestNewBoard { .. } => "requestNewBoard",
        }
    }
}

/// A server packet with its references checked.
#[derive(Debug)]
pub enum ParsedServerPacket {
    PlayerChange {
        player_id: String,
        player_change: PlayerChange,
    },
    SelectionChange {
        board_id: String,
        selection_change: Option<SelectionChange>,
    },
    CellChange {
        board_id: String,
        position: Position,
        cell_change: CellChange,
    },
    Init {
        player_id: String,
        game_state: GameState,
    },
    GameChange {
        game_change: GameChange,
    },
    PlayerJoin {
        player_state: PlayerState,
    },
    PlayerLeave {
        player_id: String,
    },
}

impl ParsedServerPacket {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PlayerChange { .. } => "playerChange",
            Self::SelectionChange { .. } => "selectionChange",
            Self::CellChange { .. } => "cellChange",
            Self::Init { .. } => "init",
            Self::GameChange { .. } => "gameChange",
            Self::PlayerJoin { .. } => "playerJoin",
            Self::PlayerLeave { .. } => "playerLeave",
        }
    }
}

/// Packet parser for one endpoint. Not reentrant.
#[derive(Debug, Default)]
pub struct Network {
    sender: RefCell<Option<Sender>>,
}

/// Clears the sender slot when a parse ends, however it ends.
struct ParseGuard<'a> {
    slot: &'a RefCell<Option<Sender>>,
}

impl Drop for ParseGuard<'_> {
    fn drop(&mut self) {
        self.slot.borrow_mut().take();
    }
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender of the packet currently being parsed.
    pub fn current_sender(&self) -> Option<Sender> {
        self.sender.borrow().clone()
    }

    fn begin(&self, sender: Sender) -> Result<ParseGuard<'_>, Error> {
        let mut slot = self.sender.borrow_mut();
        if slot.is_some() {
            return Err(Error::ParseInProgress);
        }
        *slot = Some(sender);
        Ok(ParseGuard { slot: &self.sender })
    }

    /// Parse a packet received by the server.
    pub fn parse_client_packet<E: Endpoint>(
        &self,
        text: &str,
        game: &Game<E>,
        sender: Sender,
    ) -> Result<ParsedClientPacket, Error> {
        let _guard = self.begin(sender.clone())?;
        if sender == Sender::Server {
            return Err(Error::PermissionDenied("server cannot send client packets"));
        }

        let packet: ClientPacket = serde_json::from_str(text)?;
        tracing::trace!(packet = packet.type_name(), ?sender, "Parsing client packet");

        Ok(match packet {
            ClientPacket::PlayerChange {
                player_id,
                player_change,
            } => ParsedClientPacket::PlayerChange {
                player_id,
                player_change: PlayerChange::from_state(player_change)?,
            },
            ClientPacket::SelectionChange {
                board_id,
                selection_change,
            } => {
                resolve_board(game, &board_id)?;
                ParsedClientPacket::SelectionChange {
                    board_id,
                    selection_change,
                }
            }
            ClientPacket::CellChange {
                board_id,
                cell_position,
                cell_change,
            } => {
                resolve_cell(game, &board_id, cell_position, &cell_change)?;
                ParsedClientPacket::CellChange {
                    board_id,
                    position: cell_position,
                    cell_change,
                }
            }
            ClientPacket::Ready { player_id } => {
                resolve_player(game, &player_id)?;
                ParsedClientPacket::Ready { player_id }
            }
            ClientPacket::RequestNewBoard { player_id } => {
                resolve_player(game, &player_id)?;
                ParsedClientPacket::RequestNewBoard { player_id }
            }
        })
    }

    /// Parse a packet received by a client. `game` is `None` before `init`.
    pub fn parse_server_packet<E: Endpoint>(
        &self,
        text: &str,
        game: Option<&Game<E>>,
        sender: Sender,
    ) -> Result<ParsedServerPacket, Error> {
        let _guard = self.begin(sender.clone())?;
        if sender != Sender::Server {
            return Err(Error::PermissionDenied("only the server sends server packets"));
        }

        let packet: ServerPacket = serde_json::from_str(text)?;
        tracing::trace!(packet = packet.type_name(), "Parsing server packet");

        Ok(match packet {
            ServerPacket::PlayerChange {
                player_id,
                player_change,
            } => ParsedServerPacket::PlayerChange {
                player_id,
                player_change: PlayerChange::from_state(player_change)?,
            },
            ServerPacket::SelectionChange {
                board_id,
                selection_change,
            } => {
                resolve_board(game.ok_or(Error::NoGame)?, &board_id)?;
                ParsedServerPacket::SelectionChange {
                    board_id,
                    selection_change,
                }
            }
            ServerPacket::CellChange {
                board_id,
                cell_position,
                cell_change,
            } => {
                let game = game.ok_or(Error::NoGame)?;
                resolve_cell(game, &board_id, cell_position, &cell_change)?;
                ParsedServerPacket::CellChange {
                    board_id,
                    position: cell_position,
                    cell_change,
                }
            }
            ServerPacket::Init {
                player_id,
                game_state,
            } => ParsedServerPacket::Init {
                player_id,
                game_state,
            },
            ServerPacket::GameChange { game_change } => {
                ParsedServerPacket::GameChange { game_change }
            }
            ServerPacket::PlayerJoin { player_state } => {
                ParsedServerPacket::PlayerJoin { player_state }
            }
            ServerPacket::PlayerLeave { player_id } => ParsedServerPacket::PlayerLeave { player_id },
        })
    }
}

fn resolve_board<E: Endpoint>(game: &Game<E>, board_id: &str) -> Result<(), Error> {
    game.board_by_id(board_id)
        .map(|_| ())
        .ok_or_else(|| Error::UnknownBoard(board_id.to_string()))
}

fn resolve_cell<E: Endpoint>(
    game: &Game<E>,
    board_id: &str,
    position: Position,
    change: &CellChange,
) -> Result<(), Error> {
    let board = game
        .board_by_id(board_id)
        .ok_or_else(|| Error::UnknownBoard(board_id.to_string()))?;
    board.cell_at(position)?;
    change.validate()
}

fn resolve_player<E: Endpoint>(game: &Game<E>, player_id: &str) -> Result<(), Error> {
    game.player(player_id)
        .map(|_| ())
        .ok_or_else(|| Error::UnknownPlayer(player_id.to_string()))
}
