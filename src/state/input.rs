//! Keyboard input on a board.

use serde::{Deserialize, Serialize};

use super::board::{Board, BoardObserver, CellChangeOptions, SelectionChange, SelectionOptions};
use super::cell::{CellChange, CellStatus};
use super::position::{Direction, Position};
use crate::error::Error;
use crate::protocol::Announce;

/// A key press, as delivered by the host UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyEvent {
    pub key: String,
    #[serde(default)]
    pub alt: bool,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
}

impl KeyEvent {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    /// The typed letter, uppercased, for a bare single-character key.
    fn letter(&self) -> Option<char> {
        if self.alt || self.ctrl || self.meta {
            return None;
        }
        let mut chars = self.key.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Some(c.to_ascii_uppercase()).filter(char::is_ascii_uppercase),
            _ => None,
        }
    }
}

enum Arrow {
    Up,
    Down,
    Left,
    Right,
}

impl Arrow {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "ArrowUp" => Some(Self::Up),
            "ArrowDown" => Some(Self::Down),
            "ArrowLeft" => Some(Self::Left),
            "ArrowRight" => Some(Self::Right),
            _ => None,
        }
    }

    fn axis(&self) -> (Direction, i32) {
        match self {
            Self::Up => (Direction::Down, -1),
            Self::Down => (Direction::Down, 1),
            Self::Left => (Direction::Across, -1),
            Self::Right => (Direction::Across, 1),
        }
    }
}

impl Board {
    /// Apply a key press. Returns whether the key was consumed.
    pub fn handle_key_down(
        &mut self,
        event: &KeyEvent,
        observer: &mut dyn BoardObserver,
    ) -> Result<bool, Error> {
        let Some(selection) = self.selection() else {
            return Ok(false);
        };

        match event.key.as_str() {
            " " => {
                let change = SelectionChange::direction(selection.direction.perpendicular());
                self.change_selection(Some(change), SelectionOptions::new(Announce::All), observer)?;
            }
            "Backspace" => {
                let was_empty = self.selected_cell().map_or(true, |cell| cell.is_empty());
                if was_empty {
                    self.advance_selected_cell(-1, observer)?;
                }
                self.clear_selected_cell(observer)?;
                if !was_empty {
                    self.advance_selected_cell(-1, observer)?;
                }
            }
            "Delete" => self.clear_selected_cell(observer)?,
            "Enter" | "Tab" => {
                let delta = if event.shift { -1 } else { 1 };
                self.advance_selected_word(delta, observer)?;
            }
            key => {
                if let Some(arrow) = Arrow::parse(key) {
                    let (direction, delta) = arrow.axis();
                    if direction == selection.direction {
                        self.advance_selected_cell(delta, observer)?;
                    } else {
                        let change = SelectionChange::direction(direction);
                        self.change_selection(
                            Some(change),
                            SelectionOptions::new(Announce::All),
                            observer,
                        )?;
                    }
                } else if let Some(letter) = event.letter() {
                    self.type_letter(letter, selection.cell, observer)?;
                } else {
                    return Ok(false);
                }
            }
        }

        Ok(true)
    }

    fn selected_is_locked(&self) -> bool {
        self.selected_cell()
            .map_or(true, |cell| cell.status() == CellStatus::KnownCorrect)
    }

    fn clear_selected_cell(&mut self, observer: &mut dyn BoardObserver) -> Result<(), Error> {
        let Some(selection) = self.selection() else {
            return Ok(());
        };
        if self.selected_is_locked() {
            return Ok(());
        }
        self.change_cell(
            selection.cell,
            &CellChange::clear(),
            CellChangeOptions::new(Announce::All),
            observer,
        )
    }

    /// Set the letter, then skip ahead to the next empty cell of the run.
    fn type_letter(
        &mut self,
        letter: char,
        original: Position,
        observer: &mut dyn BoardObserver,
    ) -> Result<(), Error> {
        let had_letter = self.cell_at(original)?.letter().is_some();

        if !self.selected_is_locked() {
            self.change_cell(
                original,
                &CellChange::letter(Some(letter)),
                CellChangeOptions::new(Announce::All),
                observer,
            )?;
        }

        let mut advanced;
        loop {
            advanced = self.advance_selected_cell(1, observer)?;
            let landed_empty = self.selected_cell().map_or(false, |cell| cell.is_empty());
            if landed_empty || !advanced {
                break;
            }
        }

        if !advanced {
            self.change_selection(
                Some(SelectionChange::cell(original)),
                SelectionOptions::new(Announce::All),
                observer,
            )?;
            if had_letter {
                self.advance_selected_cell(1, observer)?;
            }
        }
        Ok(())
    }
}
