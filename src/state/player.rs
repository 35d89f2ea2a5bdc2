//! Players: one board, health, and readiness each.
//!
//! Every field change goes through [`Player::apply`], which checks field
//! permissions before touching anything. A rejected change leaves the player
//! untouched.

use serde::{Deserialize, Deserializer, Serialize};

use super::board::{Board, BoardState};
use crate::config::DEFAULT_MAX_HEALTH;
use crate::error::Error;

/// A field of [`PlayerChange`], for permission checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerField {
    Board,
    Health,
    MaxHealth,
    Ready,
}

impl PlayerField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Board => "board",
            Self::Health => "health",
            Self::MaxHealth => "maxHealth",
            Self::Ready => "ready",
        }
    }
}

/// Which fields a change may touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allow {
    All,
    Only(Vec<PlayerField>),
}

impl Allow {
    pub fn permits(&self, field: PlayerField) -> bool {
        match self {
            Self::All => true,
            Self::Only(fields) => fields.contains(&field),
        }
    }
}

/// Partial change to a player. `board: Some(None)` removes the board.
#[derive(Debug, Clone, Default)]
pub struct PlayerChange {
    pub board: Option<Option<Board>>,
    pub health: Option<i32>,
    pub max_health: Option<i32>,
    pub ready: Option<bool>,
}

impl PlayerChange {
    pub fn board(board: Option<Board>) -> Self {
        Self {
            board: Some(board),
            ..Self::default()
        }
    }

    pub fn health(health: i32) -> Self {
        Self {
            health: Some(health),
            ..Self::default()
        }
    }

    pub fn ready(ready: bool) -> Self {
        Self {
            ready: Some(ready),
            ..Self::default()
        }
    }

    /// Fields this change sets.
    pub fn fields(&self) -> Vec<PlayerField> {
        let mut fields = Vec::new();
        if self.board.is_some() {
            fields.push(PlayerField::Board);
        }
        if self.health.is_some() {
            fields.push(PlayerField::Health);
        }
        if self.max_health.is_some() {
            fields.push(PlayerField::MaxHealth);
        }
        if self.ready.is_some() {
            fields.push(PlayerField::Ready);
        }
        fields
    }

    /// Wire form. Boards are sent without answers.
    pub fn to_state(&self) -> PlayerChangeState {
        PlayerChangeState {
            board: self
                .board
                .as_ref()
                .map(|board| board.as_ref().map(|b| b.board_state(false))),
            health: self.health,
            max_health: self.max_health,
            ready: self.ready,
        }
    }

    /// Rebuild from the wire form. Board snapshots become fresh boards.
    pub fn from_state(state: PlayerChangeState) -> Result<Self, Error> {
        let board = match state.board {
            Some(Some(board_state)) => Some(Some(Board::from_board_state(board_state)?)),
            Some(None) => Some(None),
            None => None,
        };
        Ok(Self {
            board,
            health: state.health,
            max_health: state.max_health,
            ready: state.ready,
        })
    }
}

/// Serialized [`PlayerChange`]. Absent fields are omitted; a removed board
/// is `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerChangeState {
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub board: Option<Option<BoardState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_health: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready: Option<bool>,
}

// Distinguishes a present `null` from a missing field.
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Serialized player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub id: String,
    pub board_state: Option<BoardState>,
    pub health: i32,
    pub max_health: i32,
    pub ready: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    id: String,
    board: Option<Board>,
    health: i32,
    max_health: i32,
    ready: bool,
}

impl Player {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_max_health(id, DEFAULT_MAX_HEALTH)
    }

    pub fn with_max_health(id: impl Into<String>, max_health: i32) -> Self {
        Self {
            id: id.into(),
            board: None,
            health: max_health,
            max_health,
            ready: false,
        }
    }

    pub fn from_player_state(state: PlayerState) -> Result<Self, Error> {
        let mut player = Self::with_max_health(state.id, state.max_health);
        let board = state.board_state.map(Board::from_board_state).transpose()?;
        player.apply(
            PlayerChange {
                board: Some(board),
                health: Some(state.health),
                max_health: None,
                ready: Some(state.ready),
            },
            &Allow::All,
        )?;
        Ok(player)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn board(&self) -> Option<&Board> {
        self.board.as_ref()
    }

    pub fn board_mut(&mut self) -> Option<&mut Board> {
        self.board.as_mut()
    }

    pub fn health(&self) -> i32 {
        self.health
    }

    pub fn max_health(&self) -> i32 {
        self.max_health
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn set_health(&mut self, health: i32) {
        self.health = health.clamp(0, self.max_health.max(0));
    }

    /// Apply a change. Nothing is applied if any field is not allowed or
    /// the incoming board belongs to someone else.
    pub fn apply(&mut self, change: PlayerChange, allow: &Allow) -> Result<(), Error> {
        if let Some(field) = change.fields().into_iter().find(|f| !allow.permits(*f)) {
            return Err(Error::PermissionDenied(field.as_str()));
        }

        if let Some(Some(board)) = &change.board {
            if let Some(owner) = board.player_id() {
                if owner != self.id {
                    return Err(Error::BoardOwnedByOtherPlayer {
                        board_id: board.id().to_string(),
                        owner: owner.to_string(),
                    });
                }
            }
        }

        if let Some(board) = change.board {
            if let Some(old) = self.board.as_mut() {
                old.set_player_id(None);
            }
            self.board = board.map(|mut board| {
                board.set_player_id(Some(self.id.clone()));
                board
            });
        }

        if let Some(health) = change.health {
            self.set_health(health);
        }

        if let Some(max_health) = change.max_health {
            self.max_health = max_health;
            self.set_health(self.health);
        }

        if let Some(ready) = change.ready {
            self.ready = ready;
        }

        Ok(())
    }

    pub fn player_state(&self, include_answers: bool) -> PlayerState {
        PlayerState {
            id: self.id.clone(),
            board_state: self.board.as_ref().map(|b| b.board_state(include_answers)),
            health: self.health,
            max_health: self.max_health,
            ready: self.ready,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::testing::fixture_board;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_player() {
        let player = Player::new("p1");
        assert_eq!(player.id(), "p1");
        assert_eq!(player.health(), 100);
        assert_eq!(player.max_health(), 100);
        assert!(!player.is_ready());
        assert!(player.board().is_none());
    }

    #[test]
    fn test_health_is_clamped() {
        let mut player = Player::new("p1");
        player.apply(PlayerChange::health(150), &Allow::All).unwrap();
        assert_eq!(player.health(), 100);

        player.apply(PlayerChange::health(-5), &Allow::All).unwrap();
        assert_eq!(player.health(), 0);

        player.apply(PlayerChange::health(80), &Allow::All).unwrap();
        let lower_max = PlayerChange {
            max_health: Some(50),
            ..PlayerChange::default()
        };
        player.apply(lower_max, &Allow::All).unwrap();
        assert_eq!(player.health(), 50);
        assert_eq!(player.max_health(), 50);
    }

    #[test]
    fn test_permission_denied_applies_nothing() {
        let mut player = Player::new("p1");
        let change = PlayerChange {
            ready: Some(true),
            health: Some(10),
            ..PlayerChange::default()
        };

        let err = player
            .apply(change, &Allow::Only(vec![PlayerField::Ready]))
            .unwrap_err();
        assert_eq!(err, Error::PermissionDenied("health"));
        assert!(!player.is_ready());
        assert_eq!(player.health(), 100);

        player
            .apply(PlayerChange::ready(true), &Allow::Only(vec![PlayerField::Ready]))
            .unwrap();
        assert!(player.is_ready());
    }

    #[test]
    fn test_board_assignment_sets_back_reference() {
        let mut player = Player::new("p1");
        let board = fixture_board();
        let board_id = board.id().to_string();

        player.apply(PlayerChange::board(Some(board)), &Allow::All).unwrap();
        let board = player.board().unwrap();
        assert_eq!(board.id(), board_id);
        assert_eq!(board.player_id(), Some("p1"));

        player.apply(PlayerChange::board(None), &Allow::All).unwrap();
        assert!(player.board().is_none());
    }

    #[test]
    fn test_board_of_other_player_rejected() {
        let mut alice = Player::new("alice");
        alice
            .apply(PlayerChange::board(Some(fixture_board())), &Allow::All)
            .unwrap();
        let taken = alice.board().unwrap().clone();

        let mut bob = Player::new("bob");
        let err = bob
            .apply(PlayerChange::board(Some(taken.clone())), &Allow::All)
            .unwrap_err();
        assert_eq!(
            err,
            Error::BoardOwnedByOtherPlayer {
                board_id: taken.id().to_string(),
                owner: "alice".to_string(),
            }
        );
        assert!(bob.board().is_none());
    }

    #[test]
    fn test_change_state_wire_shape() {
        let change = PlayerChange::ready(true);
        assert_eq!(
            serde_json::to_value(change.to_state()).unwrap(),
            serde_json::json!({"ready": true})
        );

        let removed = PlayerChange::board(None);
        assert_eq!(
            serde_json::to_value(removed.to_state()).unwrap(),
            serde_json::json!({"board": null})
        );

        let parsed: PlayerChangeState = serde_json::from_str(r#"{"board":null}"#).unwrap();
        assert_eq!(parsed.board, Some(None));
        let parsed: PlayerChangeState = serde_json::from_str(r#"{"health":3}"#).unwrap();
        assert_eq!(parsed.board, None);
        assert_eq!(parsed.health, Some(3));
    }

    #[test]
    fn test_change_state_redacts_board() {
        let change = PlayerChange::board(Some(fixture_board()));
        let state = change.to_state();
        let board_state = state.board.unwrap().unwrap();
        assert!(board_state
            .words
            .iter()
            .flat_map(|w| &w.letters)
            .all(|l| l.known().is_none()));
    }

    #[test]
    fn test_player_state_round_trip() {
        let mut player = Player::new("p1");
        player
            .apply(
                PlayerChange {
                    board: Some(Some(fixture_board())),
                    health: Some(42),
                    max_health: None,
                    ready: Some(true),
                },
                &Allow::All,
            )
            .unwrap();

        let state = player.player_state(true);
        let restored = Player::from_player_state(state.clone()).unwrap();
        assert_eq!(restored.player_state(true), state);
        assert_eq!(restored.board().unwrap().player_id(), Some("p1"));
    }
}
