//! A single grid square.

use serde::{Deserialize, Serialize};

use super::position::{Direction, Position};
use super::word::WordId;
use crate::error::Error;

/// Correctness marking of a cell's letter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CellStatus {
    #[default]
    Default,
    KnownCorrect,
    KnownIncorrect,
}

/// Validate a wire letter: empty, or exactly one uppercase `A`–`Z`.
pub fn parse_letter(letter: &str) -> Result<Option<char>, Error> {
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (None, _) => Ok(None),
        (Some(c), None) if c.is_ascii_uppercase() => Ok(Some(c)),
        _ => Err(Error::InvalidLetter(letter.to_string())),
    }
}

/// Words crossing a cell, at most one per direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crossing {
    pub across: Option<WordId>,
    pub down: Option<WordId>,
}

impl Crossing {
    pub fn get(&self, direction: Direction) -> Option<WordId> {
        match direction {
            Direction::Across => self.across,
            Direction::Down => self.down,
        }
    }

    pub fn set(&mut self, direction: Direction, word: Option<WordId>) {
        match direction {
            Direction::Across => self.across = word,
            Direction::Down => self.down = word,
        }
    }

    /// Crossing words, across first.
    pub fn iter(&self) -> impl Iterator<Item = WordId> {
        self.across.into_iter().chain(self.down)
    }
}

/// Partial change to a cell. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub letter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CellStatus>,
}

impl CellChange {
    pub fn letter(letter: Option<char>) -> Self {
        Self {
            letter: Some(letter.map(String::from).unwrap_or_default()),
            status: None,
        }
    }

    pub fn clear() -> Self {
        Self::letter(None)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if let Some(letter) = &self.letter {
            parse_letter(letter)?;
        }
        Ok(())
    }
}

/// Serialized cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellState {
    pub letter: String,
    pub status: CellStatus,
}

/// One grid square. Owned by its board; identity is its position.
#[derive(Debug, Clone)]
pub struct Cell {
    position: Position,
    letter: Option<char>,
    status: CellStatus,
    pub(crate) words: Crossing,
    board_id: Option<String>,
}

impl Cell {
    pub fn new(position: Position) -> Self {
        Self {
            position,
            letter: None,
            status: CellStatus::Default,
            words: Crossing::default(),
            board_id: None,
        }
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn x(&self) -> i32 {
        self.position.x
    }

    pub fn y(&self) -> i32 {
        self.position.y
    }

    pub fn letter(&self) -> Option<char> {
        self.letter
    }

    pub fn is_empty(&self) -> bool {
        self.letter.is_none()
    }

    pub fn status(&self) -> CellStatus {
        self.status
    }

    pub fn words(&self) -> &Crossing {
        &self.words
    }

    /// A void cell belongs to no word.
    pub fn is_void(&self) -> bool {
        self.words.across.is_none() && self.words.down.is_none()
    }

    /// Id of the board this cell belongs to.
    pub fn board_id(&self) -> Result<&str, Error> {
        self.board_id.as_deref().ok_or(Error::NoBoard)
    }

    /// Attach this cell to its board. Only allowed once.
    pub(crate) fn attach(&mut self, board_id: &str) -> Result<(), Error> {
        if self.board_id.is_some() {
            return Err(Error::CellAlreadyOnBoard(self.position));
        }
        self.board_id = Some(board_id.to_string());
        Ok(())
    }

    /// Apply a partial change to the letter/status.
    ///
    /// A letter change without an explicit status resets the status to
    /// `Default`. Returns whether the letter changed.
    pub(crate) fn apply(&mut self, change: &CellChange) -> Result<bool, Error> {
        let old_letter = self.letter;

        if let Some(letter) = &change.letter {
            let letter = parse_letter(letter)?;
            if letter != old_letter {
                self.letter = letter;
            }
        }

        if let Some(status) = change.status {
            self.status = status;
        } else if self.letter != old_letter {
            self.status = CellStatus::Default;
        }

        Ok(self.letter != old_letter)
    }

    pub fn cell_state(&self) -> CellState {
        CellState {
            letter: self.letter.map(String::from).unwrap_or_default(),
            status: self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_letter() {
        assert_eq!(parse_letter(""), Ok(None));
        assert_eq!(parse_letter("Q"), Ok(Some('Q')));
        assert!(parse_letter("q").is_err());
        assert!(parse_letter("AB").is_err());
        assert!(parse_letter(" ").is_err());
        assert!(parse_letter("É").is_err());
    }

    #[test]
    fn test_letter_change_resets_status() {
        let mut cell = Cell::new(Position::new(0, 0));
        cell.apply(&CellChange {
            letter: Some("A".into()),
            status: Some(CellStatus::KnownIncorrect),
        })
        .unwrap();
        assert_eq!(cell.status(), CellStatus::KnownIncorrect);

        let changed = cell.apply(&CellChange::letter(Some('B'))).unwrap();
        assert!(changed);
        assert_eq!(cell.letter(), Some('B'));
        assert_eq!(cell.status(), CellStatus::Default);
    }

    #[test]
    fn test_same_letter_keeps_status() {
        let mut cell = Cell::new(Position::new(0, 0));
        cell.apply(&CellChange {
            letter: Some("A".into()),
            status: Some(CellStatus::KnownCorrect),
        })
        .unwrap();

        let changed = cell.apply(&CellChange::letter(Some('A'))).unwrap();
        assert!(!changed);
        assert_eq!(cell.status(), CellStatus::KnownCorrect);
    }

    #[test]
    fn test_invalid_letter_rejected() {
        let mut cell = Cell::new(Position::new(0, 0));
        let result = cell.apply(&CellChange {
            letter: Some("a".into()),
            status: None,
        });
        assert_eq!(result, Err(Error::InvalidLetter("a".into())));
        assert!(cell.is_empty());
    }

    #[test]
    fn test_attach_once() {
        let mut cell = Cell::new(Position::new(1, 2));
        assert!(cell.board_id().is_err());
        cell.attach("board-1").unwrap();
        assert_eq!(cell.board_id(), Ok("board-1"));
        assert!(cell.attach("board-2").is_err());
    }

    #[test]
    fn test_void() {
        let mut cell = Cell::new(Position::new(0, 0));
        assert!(cell.is_void());
        cell.words.set(Direction::Down, Some(WordId(3)));
        assert!(!cell.is_void());
        assert_eq!(cell.words().iter().collect::<Vec<_>>(), vec![WordId(3)]);
    }

    #[test]
    fn test_cell_change_wire_shape() {
        let json = serde_json::to_string(&CellChange::clear()).unwrap();
        assert_eq!(json, r#"{"letter":""}"#);

        let change: CellChange = serde_json::from_str(r#"{"status":"knownCorrect"}"#).unwrap();
        assert_eq!(change.letter, None);
        assert_eq!(change.status, Some(CellStatus::KnownCorrect));
    }
}
