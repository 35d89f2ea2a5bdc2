//! The sync boundary between a local game model and its peers.
//!
//! Both the server and the client implement [`Endpoint`]. The model calls
//! [`Endpoint::announce`] after applying a change locally; the endpoint
//! either forwards it to the server (participant) or fans it out to every
//! other connected player (authority).

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::state::{
    CellChange, GameChange, PlayerChangeState, Position, Puzzle, SelectionChange,
};

/// Which side of the protocol an endpoint sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The single source of truth. Rebroadcasts accepted changes and drives
    /// game-wide transitions.
    Authority,
    /// Sends its own intents to the authority and applies what comes back.
    Participant,
}

/// Whether and to whom a local change is propagated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Announce {
    /// Apply locally only. Used when applying inbound changes.
    #[default]
    Silent,
    /// Send to every peer.
    All,
    /// Send to every peer except this player (usually the originator).
    Except(String),
}

impl Announce {
    pub fn except(player_id: impl Into<String>) -> Self {
        Self::Except(player_id.into())
    }

    /// `None` when silent, otherwise the excluded player (if any).
    pub fn scope(&self) -> Option<Option<&str>> {
        match self {
            Self::Silent => None,
            Self::All => Some(None),
            Self::Except(player_id) => Some(Some(player_id)),
        }
    }
}

/// A change the model asks its endpoint to propagate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Announcement {
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
    GameChange {
        game_change: GameChange,
    },
}

impl Announcement {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::PlayerChange { .. } => "playerChange",
            Self::SelectionChange { .. } => "selectionChange",
            Self::CellChange { .. } => "cellChange",
            Self::GameChange { .. } => "gameChange",
        }
    }
}

/// Implemented by the client and server transports.
pub trait Endpoint {
    fn role(&self) -> Role;

    fn is_authority(&self) -> bool {
        self.role() == Role::Authority
    }

    /// Propagate `announcement`, skipping `except_player_id` if given.
    fn announce(
        &mut self,
        announcement: Announcement,
        except_player_id: Option<&str>,
    ) -> Result<(), Error>;

    /// Pick a puzzle for `player_id`'s next board. Authority only.
    fn assign_puzzle(&mut self, player_id: &str) -> Result<Puzzle, Error> {
        let _ = player_id;
        Err(Error::NotAuthority)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::state::testing::fixture_puzzle;

    /// Records every announcement instead of sending it.
    #[derive(Debug)]
    pub struct RecordingEndpoint {
        pub role: Role,
        pub announcements: Vec<(Announcement, Option<String>)>,
        pub puzzles_assigned: usize,
        /// Draws past this many fail with `NoPuzzles`.
        pub puzzle_limit: Option<usize>,
    }

    impl RecordingEndpoint {
        pub fn authority() -> Self {
            Self {
                role: Role::Authority,
                announcements: Vec::new(),
                puzzles_assigned: 0,
                puzzle_limit: None,
            }
        }

        pub fn participant() -> Self {
            Self {
                role: Role::Participant,
                ..Self::authority()
            }
        }

        pub fn types(&self) -> Vec<&'static str> {
            self.announcements.iter().map(|(a, _)| a.type_name()).collect()
        }
    }

    impl Endpoint for RecordingEndpoint {
        fn role(&self) -> Role {
            self.role
        }

        fn announce(
            &mut self,
            announcement: Announcement,
            except_player_id: Option<&str>,
        ) -> Result<(), Error> {
            self.announcements
                .push((announcement, except_player_id.map(String::from)));
            Ok(())
        }

        fn assign_puzzle(&mut self, _player_id: &str) -> Result<Puzzle, Error> {
            if self.role != Role::Authority {
                return Err(Error::NotAuthority);
            }
            if self.puzzle_limit.is_some_and(|limit| self.puzzles_assigned >= limit) {
                return Err(Error::NoPuzzles);
            }
            self.puzzles_assigned += 1;
            Ok(fixture_puzzle())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_announce_scope() {
        assert_eq!(Announce::Silent.scope(), None);
        assert_eq!(Announce::All.scope(), Some(None));
        assert_eq!(Announce::except("x").scope(), Some(Some("x")));
    }

    #[test]
    fn test_announcement_wire_shape() {
        let announcement = Announcement::CellChange {
            board_id: "b1".into(),
            cell_position: Position::new(2, 3),
            cell_change: CellChange::letter(Some('A')),
        };
        let json = serde_json::to_value(&announcement).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "cellChange",
                "boardId": "b1",
                "cellPosition": {"x": 2, "y": 3},
                "cellChange": {"letter": "A"}
            })
        );
    }
}
