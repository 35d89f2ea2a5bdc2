//! Wire packets.
//!
//! Every packet is a JSON object tagged by `type`. Field names are
//! camelCase. Three packets travel both ways (`playerChange`,
//! `selectionChange`, `cellChange`); the rest are one-directional.

use serde::{Deserialize, Serialize};

use super::endpoint::Announcement;
use crate::error::Error;
use crate::state::{
    CellChange, GameChange, GameState, PlayerChangeState, PlayerState, Position, SelectionChange,
};

/// Server to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerPacket {
    PlayerChange {
        player_id: String,
        player_change: PlayerChangeState,
    },
    SelectionChange {
        board_id: String,
        selection_change: Option<SelectionChange>,
    },
    CellChange {
        board_id: String,
        cell_position: Position,
        cell_change: CellChange,
    },
    /// First packet on a new connection.
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

impl ServerPacket {
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

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialize(e.to_string()))
    }
}

impl From<Announcement> for ServerPacket {
    fn from(announcement: Announcement) -> Self {
        match announcement {
            Announcement::PlayerChange {
                player_id,
                player_change,
            } => Self::PlayerChange {
                player_id,
                player_change,
            },
            Announcement::SelectionChange {
                board_id,
                selection_change,
            } => Self::SelectionChange {
                board_id,
                selection_change,
            },
            Announcement::CellChange {
                board_id,
                cell_position,
                cell_change,
            } => Self::CellChange {
                board_id,
                cell_position,
                cell_change,
            },
            Announcement::GameChange { game_change } => Self::GameChange { game_change },
        }
    }
}

/// Client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientPacket {
    PlayerChange {
        player_id: String,
        player_change: PlayerChangeState,
    },
    SelectionChange {
        board_id: String,
        selection_change: Option<SelectionChange>,
    },
    CellChange {
        board_id: String,
        cell_position: Position,
        cell_change: CellChange,
    },
    Ready {
        player_id: String,
    },
    RequestNewBoard {
        player_id: String,
    },
}

impl ClientPacket {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PlayerChange { .. } => "playerChange",
            Self::SelectionChange { .. } => "selectionChange",
            Self::CellChange { .. } => "cellChange",
            Self::Ready { .. } => "ready",
            Self::RequestNewBoard { .. } => "requestNewBoard",
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialize(e.to_string()))
    }
}

impl TryFrom<Announcement> for ClientPacket {
    type Error = Error;

    /// Game changes are the server's to make.
    fn try_from(announcement: Announcement) -> Result<Self, Error> {
        match announcement {
            Announcement::PlayerChange {
                player_id,
                player_change,
            } => Ok(Self::PlayerChange {
                player_id,
                player_change,
            }),
            Announcement::SelectionChange {
                board_id,
                selection_change,
            } => Ok(Self::SelectionChange {
                board_id,
                selection_change,
            }),
            Announcement::CellChange {
                board_id,
                cell_position,
                cell_change,
            } => Ok(Self::CellChange {
                board_id,
                cell_position,
                cell_change,
            }),
            Announcement::GameChange { .. } => Err(Error::NotAuthority),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CellStatus, Direction, GameStatus};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_server_packet_shapes() {
        let leave = ServerPacket::PlayerLeave {
            player_id: "p1".into(),
        };
        assert_eq!(
            serde_json::to_value(&leave).unwrap(),
            serde_json::json!({"type": "playerLeave", "playerId": "p1"})
        );

        let change = ServerPacket::GameChange {
            game_change: GameChange::status(GameStatus::Ended),
        };
        assert_eq!(
            serde_json::to_value(&change).unwrap(),
            serde_json::json!({"type": "gameChange", "gameChange": {"status": {"type": "ended"}}})
        );
    }

    #[test]
    fn test_selection_change_null() {
        let packet: ClientPacket =
            serde_json::from_str(r#"{"type":"selectionChange","boardId":"b","selectionChange":null}"#)
                .unwrap();
        assert_eq!(
            packet,
            ClientPacket::SelectionChange {
                board_id: "b".into(),
                selection_change: None,
            }
        );

        let packet: ClientPacket = serde_json::from_str(
            r#"{"type":"selectionChange","boardId":"b","selectionChange":{"direction":"down"}}"#,
        )
        .unwrap();
        assert_eq!(
            packet,
            ClientPacket::SelectionChange {
                board_id: "b".into(),
                selection_change: Some(SelectionChange::direction(Direction::Down)),
            }
        );
    }

    #[test]
    fn test_client_packet_shapes() {
        let packet: ClientPacket = serde_json::from_str(
            r#"{"type":"cellChange","boardId":"b","cellPosition":{"x":1,"y":2},"cellChange":{"status":"knownIncorrect"}}"#,
        )
        .unwrap();
        assert_eq!(
            packet,
            ClientPacket::CellChange {
                board_id: "b".into(),
                cell_position: Position::new(1, 2),
                cell_change: CellChange {
                    letter: None,
                    status: Some(CellStatus::KnownIncorrect),
                },
            }
        );

        let ready = ClientPacket::Ready {
            player_id: "p1".into(),
        };
        assert_eq!(
            ready.to_json().unwrap(),
            r#"{"type":"ready","playerId":"p1"}"#
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<ClientPacket>(r#"{"type":"init","playerId":"x"}"#).is_err());
        assert!(serde_json::from_str::<ServerPacket>(r#"{"type":"ready","playerId":"x"}"#).is_err());
        assert!(serde_json::from_str::<ClientPacket>(r#"{"playerId":"x"}"#).is_err());
    }

    #[test]
    fn test_game_change_not_sent_by_client() {
        let announcement = Announcement::GameChange {
            game_change: GameChange::status(GameStatus::Playing),
        };
        assert_eq!(
            ClientPacket::try_from(announcement.clone()).unwrap_err(),
            Error::NotAuthority
        );
        assert_eq!(
            ServerPacket::from(announcement).type_name(),
            "gameChange"
        );
    }
}
