//! Crate-wide error type.
//!
//! Every failure belongs to one of four categories (see [`ErrorKind`]).
//! Nothing in this crate retries: callers decide whether to reject the
//! message, close the connection, or surface the error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::{Position, SelectionChange};

/// Broad category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input: bad JSON, unknown packet shape, invalid letter.
    Validation,
    /// A packet named a board, cell or player that doesn't exist (or isn't yours).
    Reference,
    /// A change touched a field outside its allow list.
    Permission,
    /// Local contract violation: bad selection, missing board, wrong role.
    State,
}

/// Errors produced by the crossword state model and protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    // Validation
    InvalidLetter(String),
    InvalidPuzzle { position: Position, letter: char },
    InvalidBoardState(&'static str),
    MalformedPacket(String),
    InvalidConfig(String),

    // Reference
    UnknownBoard(String),
    UnknownPlayer(String),
    UnknownWord(usize),
    BoardMismatch { expected: String, actual: String },
    PlayerMismatch { expected: String, actual: String },

    // Permission
    PermissionDenied(&'static str),

    // State
    OutOfBounds(Position),
    SelectionFailed(Option<SelectionChange>),
    CellAlreadyOnBoard(Position),
    BoardOwnedByOtherPlayer { board_id: String, owner: String },
    NoBoard,
    NoGame,
    NotAuthority,
    GameNotInLobby,
    ParseInProgress,
    ExceptOnParticipant,
    UnexpectedPacket { packet: &'static str, state: &'static str },
    NoPuzzles,
    Serialize(String),
}

impl Error {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidLetter(_)
            | Self::InvalidPuzzle { .. }
            | Self::InvalidBoardState(_)
            | Self::MalformedPacket(_)
            | Self::InvalidConfig(_) => ErrorKind::Validation,

            Self::UnknownBoard(_)
            | Self::UnknownPlayer(_)
            | Self::UnknownWord(_)
            | Self::BoardMismatch { .. }
            | Self::PlayerMismatch { .. } => ErrorKind::Reference,

            Self::PermissionDenied(_) => ErrorKind::Permission,

            _ => ErrorKind::State,
        }
    }

    /// Whether the remote peer caused this error.
    pub fn is_client_fault(&self) -> bool {
        !matches!(self.kind(), ErrorKind::State)
            || matches!(
                self,
                Self::SelectionFailed(_)
                    | Self::OutOfBounds(_)
                    | Self::NoBoard
                    | Self::GameNotInLobby
                    | Self::BoardOwnedByOtherPlayer { .. }
            )
    }

    /// Close reason the server sends when this error ends a connection.
    pub fn close_reason(&self) -> CloseReason {
        let code = match self {
            Self::GameNotInLobby => CloseCode::GameNotInLobby,
            e if e.is_client_fault() => CloseCode::InvalidPacket,
            _ => CloseCode::Unknown,
        };
        CloseReason { error: code }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLetter(letter) => write!(f, "Invalid letter: {:?}", letter),
            Self::InvalidPuzzle { position, letter } => write!(
                f,
                "Invalid puzzle: invalid letter {:?} at {}",
                letter, position
            ),
            Self::InvalidBoardState(reason) => write!(f, "Invalid board state: {}", reason),
            Self::MalformedPacket(reason) => write!(f, "Malformed packet: {}", reason),
            Self::InvalidConfig(reason) => write!(f, "Invalid config: {}", reason),
            Self::UnknownBoard(id) => write!(f, "No board with id {}", id),
            Self::UnknownPlayer(id) => write!(f, "No player with id {}", id),
            Self::UnknownWord(id) => write!(f, "No word with id {}", id),
            Self::BoardMismatch { expected, actual } => write!(
                f,
                "Packet board id {} does not match player board id {}",
                actual, expected
            ),
            Self::PlayerMismatch { expected, actual } => write!(
                f,
                "Packet player id {} does not match player id {}",
                actual, expected
            ),
            Self::PermissionDenied(field) => write!(f, "Cannot change {}", field),
            Self::OutOfBounds(position) => write!(f, "No cell at {}", position),
            Self::SelectionFailed(change) => {
                write!(f, "Failed to apply selection change {:?}", change)
            }
            Self::CellAlreadyOnBoard(position) => {
                write!(f, "Cell at {} already has a board", position)
            }
            Self::BoardOwnedByOtherPlayer { board_id, owner } => write!(
                f,
                "Board {} already belongs to player {}",
                board_id, owner
            ),
            Self::NoBoard => write!(f, "Player has no board"),
            Self::NoGame => write!(f, "No game"),
            Self::NotAuthority => write!(f, "Endpoint is not the authority"),
            Self::GameNotInLobby => write!(f, "Game is not in lobby"),
            Self::ParseInProgress => write!(f, "Packet parse already in progress"),
            Self::ExceptOnParticipant => {
                write!(f, "exceptPlayerId cannot be used by a participant endpoint")
            }
            Self::UnexpectedPacket { packet, state } => {
                write!(f, "Unexpected packet {} when connection is {}", packet, state)
            }
            Self::NoPuzzles => write!(f, "Puzzle source is empty"),
            Self::Serialize(reason) => write!(f, "Failed to serialize packet: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::MalformedPacket(e.to_string())
    }
}

/// Error code carried in a connection close frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloseCode {
    InvalidPacket,
    GameNotInLobby,
    UserDisconnected,
    Unknown,
}

/// Close frame payload, `{"error": CODE}` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloseReason {
    pub error: CloseCode,
}

impl CloseReason {
    pub fn new(error: CloseCode) -> Self {
        Self { error }
    }

    pub fn to_json(&self) -> String {
        serde_json::json!({ "error": self.error }).to_string()
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::InvalidLetter("a".into()).kind(), ErrorKind::Validation);
        assert_eq!(Error::UnknownBoard("b".into()).kind(), ErrorKind::Reference);
        assert_eq!(Error::PermissionDenied("health").kind(), ErrorKind::Permission);
        assert_eq!(Error::NoBoard.kind(), ErrorKind::State);
    }

    #[test]
    fn test_close_reasons() {
        assert_eq!(
            Error::PermissionDenied("board").close_reason().error,
            CloseCode::InvalidPacket
        );
        assert_eq!(
            Error::GameNotInLobby.close_reason().error,
            CloseCode::GameNotInLobby
        );
        assert_eq!(Error::ParseInProgress.close_reason().error, CloseCode::Unknown);
    }

    #[test]
    fn test_close_reason_json() {
        let reason = CloseReason::new(CloseCode::InvalidPacket);
        assert_eq!(reason.to_json(), r#"{"error":"INVALID_PACKET"}"#);

        let parsed: CloseReason = serde_json::from_str(r#"{"error":"GAME_NOT_IN_LOBBY"}"#).unwrap();
        assert_eq!(parsed.error, CloseCode::GameNotInLobby);
    }
}
