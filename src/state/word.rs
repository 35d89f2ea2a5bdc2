//! Words: ordered spans of cells with a clue and expected letters.
//!
//! A word never owns its cells. It records its start position and length;
//! the live span is derived by walking the board's grid.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::board::Board;
use super::cell::{Cell, CellStatus};
use super::position::{Direction, Position};
use crate::error::Error;

/// Word id, unique within one board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WordId(pub usize);

impl fmt::Display for WordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Expected letter at one position of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum WordLetter {
    Known { letter: char },
    /// Answer hidden from this party.
    Unknown,
}

impl WordLetter {
    pub fn known(&self) -> Option<char> {
        match self {
            Self::Known { letter } => Some(*letter),
            Self::Unknown => None,
        }
    }

    pub fn validate(&self) -> Result<(), Error> {
        match self {
            Self::Known { letter } if !letter.is_ascii_uppercase() => {
                Err(Error::InvalidLetter(letter.to_string()))
            }
            _ => Ok(()),
        }
    }
}

/// Serialized word.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordState {
    pub label: String,
    pub letters: Vec<WordLetter>,
    pub direction: Direction,
    pub start_cell: Position,
    pub clue_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Word {
    id: WordId,
    direction: Direction,
    start: Position,
    clue_text: String,
    pub(crate) label: String,
    letters: Vec<WordLetter>,
}

impl Word {
    pub fn new(
        id: WordId,
        direction: Direction,
        start: Position,
        clue_text: String,
        letters: Vec<WordLetter>,
    ) -> Self {
        Self {
            id,
            direction,
            start,
            clue_text,
            label: String::new(),
            letters,
        }
    }

    pub fn id(&self) -> WordId {
        self.id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn start(&self) -> Position {
        self.start
    }

    pub fn clue_text(&self) -> &str {
        &self.clue_text
    }

    /// Display label, re-derived whenever the board's word list changes.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn letters(&self) -> &[WordLetter] {
        &self.letters
    }

    pub fn len(&self) -> usize {
        self.letters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.letters.is_empty()
    }

    /// Positions spanned by this word, in order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + Clone {
        let (start, direction) = (self.start, self.direction);
        (0..self.letters.len() as i32).map(move |i| start.step(direction, i))
    }

    /// Index of `position` within this word, if it lies on the span.
    pub fn index_of(&self, position: Position) -> Option<usize> {
        let on_line = match self.direction {
            Direction::Across => position.y == self.start.y,
            Direction::Down => position.x == self.start.x,
        };
        let offset = position.along(self.direction) - self.start.along(self.direction);
        if on_line && offset >= 0 && (offset as usize) < self.letters.len() {
            Some(offset as usize)
        } else {
            None
        }
    }

    /// Cells spanned by this word on `board`.
    pub fn cells<'b>(&self, board: &'b Board) -> impl Iterator<Item = &'b Cell> + 'b {
        self.positions().map_while(move |p| board.try_cell_at(p))
    }

    /// Every cell in the span has a letter.
    pub fn is_filled(&self, board: &Board) -> bool {
        self.cells(board).all(|cell| !cell.is_empty())
    }

    /// Every cell is already marked correct, or holds its known answer.
    pub fn is_known_solved(&self, board: &Board) -> bool {
        self.cells(board).all(|cell| {
            cell.status() == CellStatus::KnownCorrect
                || matches!(
                    board.correct_letter(cell.position()),
                    Some(WordLetter::Known { letter }) if cell.letter() == Some(letter)
                )
        })
    }

    pub fn word_state(&self, include_answers: bool) -> WordState {
        WordState {
            label: self.label.clone(),
            letters: if include_answers {
                self.letters.clone()
            } else {
                vec![WordLetter::Unknown; self.letters.len()]
            },
            direction: self.direction,
            start_cell: self.start,
            clue_text: self.clue_text.clone(),
        }
    }
}
