//! One player's crossword grid.
//!
//! The board owns its cells (a row-major grid) and its word list. Cells and
//! words refer to each other by [`Position`] and [`WordId`], never by
//! pointer, so the board is the only owner of either.
//!
//! # Selection
//!
//! ```text
//!                  change_selection(None)
//!        ┌──────────────────────────────────────────┐
//!        ▼                                          │
//! ┌─────────────┐  change_selection(cell, dir) ┌────┴─────────────────┐
//! │ NoSelection │─────────────────────────────▶│ Selected(cell, dir)  │◀─┐
//! └─────────────┘   (cell exists, not void     └────┬─────────────────┘  │
//!                    unless editing)                 └────────────────────┘
//!                                                     partial change keeps
//!                                                     the missing half
//! ```
//!
//! # Change propagation
//!
//! Mutators take a [`BoardObserver`]. After a change is applied the board
//! announces it through the observer (only when the board belongs to a
//! player) and, for cell changes, runs its own handler before notifying the
//! observer via [`BoardObserver::cell_changed`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::cell::{Cell, CellChange, CellState, CellStatus};
use super::position::{Direction, Position};
use super::puzzle::Puzzle;
use super::word::{Word, WordId, WordLetter, WordState};
use crate::error::Error;
use crate::protocol::{Announce, Announcement};

/// Current focus on a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub cell: Position,
    pub direction: Direction,
}

/// Partial selection change. Missing fields keep their current value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl SelectionChange {
    pub fn cell(cell: Position) -> Self {
        Self {
            cell: Some(cell),
            direction: None,
        }
    }

    pub fn direction(direction: Direction) -> Self {
        Self {
            cell: None,
            direction: Some(direction),
        }
    }
}

impl From<Selection> for SelectionChange {
    fn from(selection: Selection) -> Self {
        Self {
            cell: Some(selection.cell),
            direction: Some(selection.direction),
        }
    }
}

/// Serialized board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardState {
    pub id: String,
    pub cell_states: Vec<Vec<CellState>>,
    pub selection: Option<Selection>,
    pub words: Vec<WordState>,
}

/// Options for [`Board::change_cell`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellChangeOptions {
    pub announce: Announce,
    /// Run the board/game handlers after the change.
    pub call_handlers: bool,
}

impl CellChangeOptions {
    pub fn new(announce: Announce) -> Self {
        Self {
            announce,
            call_handlers: true,
        }
    }

    pub fn silent() -> Self {
        Self::new(Announce::Silent)
    }

    pub fn without_handlers(mut self) -> Self {
        self.call_handlers = false;
        self
    }
}

/// Options for [`Board::change_selection`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionOptions {
    pub announce: Announce,
    /// Fail with an error instead of returning `false`.
    pub throw_on_failure: bool,
}

impl SelectionOptions {
    pub fn new(announce: Announce) -> Self {
        Self {
            announce,
            throw_on_failure: true,
        }
    }

    pub fn silent() -> Self {
        Self::new(Announce::Silent)
    }

    pub fn probe(mut self) -> Self {
        self.throw_on_failure = false;
        self
    }
}

/// Receives a board's announcements and cell-change notifications.
pub trait BoardObserver {
    fn announce(
        &mut self,
        announcement: Announcement,
        except_player_id: Option<&str>,
    ) -> Result<(), Error>;

    /// Called after a cell change, once the board's own handler has run.
    fn cell_changed(&mut self, board: &mut Board, position: Position) -> Result<(), Error>;
}

/// Observer for boards that aren't part of a game.
#[derive(Debug, Clone, Copy, Default)]
pub struct Detached;

impl BoardObserver for Detached {
    fn announce(&mut self, _: Announcement, _: Option<&str>) -> Result<(), Error> {
        Ok(())
    }

    fn cell_changed(&mut self, _: &mut Board, _: Position) -> Result<(), Error> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Board {
    id: String,
    cells: Vec<Vec<Cell>>,
    words: Vec<Word>,
    selection: Option<Selection>,
    /// In editing mode letter edits rebuild the word list.
    pub editing: bool,
    player_id: Option<String>,
}

impl Board {
    fn new(id: String, mut cells: Vec<Vec<Cell>>, words: Vec<Word>) -> Result<Self, Error> {
        for cell in cells.iter_mut().flatten() {
            cell.attach(&id)?;
        }

        let mut board = Self {
            id,
            cells,
            words: Vec::new(),
            selection: None,
            editing: false,
            player_id: None,
        };
        board.set_words(words)?;
        Ok(board)
    }

    fn empty_grid(width: usize, height: usize) -> Vec<Vec<Cell>> {
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| Cell::new(Position::new(x as i32, y as i32)))
                    .collect()
            })
            .collect()
    }

    /// Build a fresh board (new id) from a filled puzzle.
    pub fn from_puzzle(puzzle: &Puzzle) -> Result<Self, Error> {
        let rows: Vec<Vec<char>> = puzzle
            .cell_letters
            .iter()
            .map(|row| row.chars().collect())
            .collect();
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != width) {
            return Err(Error::InvalidBoardState("puzzle rows differ in width"));
        }

        let letter_at = |p: Position| -> Option<char> {
            if p.x < 0 || p.y < 0 {
                return None;
            }
            rows.get(p.y as usize)?.get(p.x as usize).copied()
        };

        let mut words = Vec::with_capacity(puzzle.clues.len());
        for clue in &puzzle.clues {
            let mut position = clue.start_cell;
            let mut letters = Vec::new();

            loop {
                let letter = letter_at(position).ok_or(Error::OutOfBounds(position))?;
                if !letter.is_ascii_uppercase() {
                    return Err(Error::InvalidPuzzle { position, letter });
                }
                letters.push(WordLetter::Known { letter });

                position = position.step(clue.direction, 1);
                match letter_at(position) {
                    Some(next) if next != ' ' => continue,
                    _ => break,
                }
            }

            words.push(Word::new(
                WordId(words.len()),
                clue.direction,
                clue.start_cell,
                clue.text.clone(),
                letters,
            ));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let mut board = Self::new(id, Self::empty_grid(width, height), words)?;

        if let Some(first) = board.words.first() {
            let selection = Selection {
                cell: first.start(),
                direction: first.direction(),
            };
            board.change_selection(Some(selection.into()), SelectionOptions::silent(), &mut Detached)?;
        }

        Ok(board)
    }

    /// Rebuild a board from its serialized form, keeping its id.
    pub fn from_board_state(state: BoardState) -> Result<Self, Error> {
        let width = state.cell_states.first().map_or(0, Vec::len);
        if state.cell_states.iter().any(|row| row.len() != width) {
            return Err(Error::InvalidBoardState("rows differ in width"));
        }

        let mut cells = Self::empty_grid(width, state.cell_states.len());
        for (row, states) in cells.iter_mut().zip(&state.cell_states) {
            for (cell, cell_state) in row.iter_mut().zip(states) {
                cell.apply(&CellChange {
                    letter: Some(cell_state.letter.clone()),
                    status: Some(cell_state.status),
                })?;
            }
        }

        let mut words = Vec::with_capacity(state.words.len());
        for (index, word_state) in state.words.into_iter().enumerate() {
            for letter in &word_state.letters {
                letter.validate()?;
            }
            let mut word = Word::new(
                WordId(index),
                word_state.direction,
                word_state.start_cell,
                word_state.clue_text,
                word_state.letters,
            );
            word.label = word_state.label;
            words.push(word);
        }

        let mut board = Self::new(state.id, cells, words)?;
        if let Some(selection) = state.selection {
            board.change_selection(Some(selection.into()), SelectionOptions::silent(), &mut Detached)?;
        }

        Ok(board)
    }

    /// Blank board with no words.
    pub fn create_empty(width: usize, height: usize) -> Result<Self, Error> {
        Self::from_puzzle(&Puzzle::blank(width, height))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn width(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    /// Id of the player this board belongs to.
    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    pub(crate) fn set_player_id(&mut self, player_id: Option<String>) {
        self.player_id = player_id;
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter().flatten()
    }

    pub fn try_cell_at(&self, position: Position) -> Option<&Cell> {
        if position.x < 0 || position.y < 0 {
            return None;
        }
        self.cells
            .get(position.y as usize)?
            .get(position.x as usize)
    }

    pub fn cell_at(&self, position: Position) -> Result<&Cell, Error> {
        self.try_cell_at(position)
            .ok_or(Error::OutOfBounds(position))
    }

    fn cell_at_mut(&mut self, position: Position) -> Result<&mut Cell, Error> {
        if position.x < 0 || position.y < 0 {
            return Err(Error::OutOfBounds(position));
        }
        self.cells
            .get_mut(position.y as usize)
            .and_then(|row| row.get_mut(position.x as usize))
            .ok_or(Error::OutOfBounds(position))
    }

    fn positions(&self) -> Vec<Position> {
        self.cells().map(Cell::position).collect()
    }

    /// Words, across before down, then by label.
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn word(&self, id: WordId) -> Option<&Word> {
        self.words.iter().find(|word| word.id() == id)
    }

    /// Words crossing `position`, across first.
    pub fn words_at(&self, position: Position) -> Result<Vec<&Word>, Error> {
        let cell = self.cell_at(position)?;
        Ok(cell.words().iter().filter_map(|id| self.word(id)).collect())
    }

    /// Replace the word list: relinks every cell, relabels, and sorts.
    pub fn set_words(&mut self, mut words: Vec<Word>) -> Result<(), Error> {
        for cell in self.cells.iter_mut().flatten() {
            cell.words = Default::default();
        }
        for word in &words {
            for position in word.positions() {
                let cell = self
                    .cell_at_mut(position)
                    .map_err(|_| Error::InvalidBoardState("word extends past the grid"))?;
                cell.words.set(word.direction(), Some(word.id()));
            }
        }

        // Row-major scan; a cell starting either an across or a down word
        // takes the next number, shared by both words.
        let index: HashMap<WordId, usize> = words
            .iter()
            .enumerate()
            .map(|(i, word)| (word.id(), i))
            .collect();
        let mut next_label = 1;
        for cell in self.cells.iter().flatten() {
            let starts: Vec<usize> = Direction::ALL
                .iter()
                .filter_map(|&direction| {
                    let i = *index.get(&cell.words().get(direction)?)?;
                    let starts_here = words[i].start().along(direction)
                        == cell.position().along(direction);
                    starts_here.then_some(i)
                })
                .collect();

            if !starts.is_empty() {
                for i in starts {
                    words[i].label = next_label.to_string();
                }
                next_label += 1;
            }
        }

        let label_number = |word: &Word| word.label().parse::<u32>().unwrap_or(0);
        words.sort_by(|a, b| {
            a.direction()
                .cmp(&b.direction())
                .then_with(|| label_number(a).cmp(&label_number(b)))
        });
        self.words = words;
        Ok(())
    }

    /// Expected letter at `position`, from the across word if there is one.
    pub fn correct_letter(&self, position: Position) -> Option<WordLetter> {
        let cell = self.try_cell_at(position)?;
        let word = self.word(cell.words().across.or(cell.words().down)?)?;
        word.letters().get(word.index_of(position)?).copied()
    }

    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    pub fn selection_state(&self) -> Option<Selection> {
        self.selection
    }

    pub fn selected_cell(&self) -> Option<&Cell> {
        self.try_cell_at(self.selection?.cell)
    }

    /// The word crossing the selection in the selected direction.
    pub fn selected_word(&self) -> Option<&Word> {
        let selection = self.selection?;
        let id = self.try_cell_at(selection.cell)?.words().get(selection.direction)?;
        self.word(id)
    }

    fn resolve_selection(&self, change: &SelectionChange) -> Option<Selection> {
        let cell = change.cell.or(self.selection.map(|s| s.cell))?;
        let direction = change
            .direction
            .or(self.selection.map(|s| s.direction))
            .unwrap_or(Direction::Across);

        let target = self.try_cell_at(cell)?;
        (!target.is_void() || self.editing).then_some(Selection { cell, direction })
    }

    /// Move the selection. `None` clears it and always succeeds.
    ///
    /// A change succeeds when its target cell exists and isn't void (void
    /// cells are selectable in editing mode). The announced change is the
    /// partial `change` as given, not the resolved selection.
    pub fn change_selection(
        &mut self,
        change: Option<SelectionChange>,
        options: SelectionOptions,
        observer: &mut dyn BoardObserver,
    ) -> Result<bool, Error> {
        let target = match &change {
            None => Some(None),
            Some(change) => self.resolve_selection(change).map(Some),
        };

        let Some(selection) = target else {
            if options.throw_on_failure {
                return Err(Error::SelectionFailed(change));
            }
            return Ok(false);
        };
        self.selection = selection;

        let announcement = Announcement::SelectionChange {
            board_id: self.id.clone(),
            selection_change: change,
        };
        self.announce(&options.announce, announcement, observer)?;
        Ok(true)
    }

    /// Step the selected cell along the selected direction.
    pub fn advance_selected_cell(
        &mut self,
        delta: i32,
        observer: &mut dyn BoardObserver,
    ) -> Result<bool, Error> {
        let Some(selection) = self.selection else {
            return Ok(false);
        };

        let change = SelectionChange::cell(selection.cell.step(selection.direction, delta));
        self.change_selection(Some(change), SelectionOptions::new(Announce::All).probe(), observer)
    }

    /// Cycle through the word list by `delta`, skipping filled words.
    ///
    /// When every other word is filled, moves one word forward regardless.
    pub fn advance_selected_word(
        &mut self,
        delta: i32,
        observer: &mut dyn BoardObserver,
    ) -> Result<(), Error> {
        let Some(current) = self.selected_word() else {
            return Ok(());
        };
        let current_index = self
            .words
            .iter()
            .position(|word| word.id() == current.id())
            .ok_or(Error::UnknownWord(current.id().0))?;

        let count = self.words.len() as i64;
        let step = |index: usize, delta: i32| -> usize {
            ((index as i64 + i64::from(delta)).rem_euclid(count)) as usize
        };

        let mut index = current_index;
        loop {
            index = step(index, delta);
            if index == current_index || !self.words[index].is_filled(self) {
                break;
            }
        }
        if index == current_index {
            index = step(current_index, 1);
        }

        let id = self.words[index].id();
        self.select_word(Some(id), observer)
    }

    /// Select a word.
    ///
    /// Re-selecting the selected word jumps to its start. Otherwise the
    /// selection lands on the word's first empty cell, or its start when
    /// the word is full.
    pub fn select_word(
        &mut self,
        id: Option<WordId>,
        observer: &mut dyn BoardObserver,
    ) -> Result<(), Error> {
        let Some(id) = id else {
            self.selection = None;
            return Ok(());
        };
        let word = self.word(id).ok_or(Error::UnknownWord(id.0))?;
        let (start, direction) = (word.start(), word.direction());

        let target = if self.selected_word().map(Word::id) == Some(id) {
            start
        } else {
            let mut position = start;
            loop {
                match self.try_cell_at(position) {
                    Some(cell) if cell.words().get(direction) == Some(id) => {
                        if cell.is_empty() {
                            break position;
                        }
                        position = position.step(direction, 1);
                    }
                    _ => break start,
                }
            }
        };

        let change = SelectionChange {
            cell: Some(target),
            direction: Some(direction),
        };
        self.change_selection(Some(change), SelectionOptions::new(Announce::All), observer)?;
        Ok(())
    }

    /// Apply a partial change to one cell.
    pub fn change_cell(
        &mut self,
        position: Position,
        change: &CellChange,
        options: CellChangeOptions,
        observer: &mut dyn BoardObserver,
    ) -> Result<(), Error> {
        let cell = self.cell_at_mut(position)?;
        cell.board_id()?;
        cell.apply(change)?;

        let announcement = Announcement::CellChange {
            board_id: self.id.clone(),
            cell_position: position,
            cell_change: change.clone(),
        };
        self.announce(&options.announce, announcement, observer)?;

        if options.call_handlers {
            self.on_cell_change(position, observer)?;
        }
        Ok(())
    }

    fn on_cell_change(
        &mut self,
        position: Position,
        observer: &mut dyn BoardObserver,
    ) -> Result<(), Error> {
        if self.editing {
            self.rebuild_words()?;
        }
        if self.player_id.is_some() {
            observer.cell_changed(self, position)?;
        }
        Ok(())
    }

    /// Editing mode: every maximal run of letters becomes a word.
    fn rebuild_words(&mut self) -> Result<(), Error> {
        let mut words = Vec::new();
        let (width, height) = (self.width() as i32, self.height() as i32);

        for direction in Direction::ALL {
            let (lines, length) = match direction {
                Direction::Across => (height, width),
                Direction::Down => (width, height),
            };
            for line in 0..lines {
                let mut run: Option<(Position, Vec<WordLetter>)> = None;
                for offset in 0..=length {
                    let position = match direction {
                        Direction::Across => Position::new(offset, line),
                        Direction::Down => Position::new(line, offset),
                    };
                    match self.try_cell_at(position).and_then(Cell::letter) {
                        Some(letter) => run
                            .get_or_insert_with(|| (position, Vec::new()))
                            .1
                            .push(WordLetter::Known { letter }),
                        None => {
                            if let Some((start, letters)) = run.take() {
                                words.push(Word::new(
                                    WordId(words.len()),
                                    direction,
                                    start,
                                    String::new(),
                                    letters,
                                ));
                            }
                        }
                    }
                }
            }
        }

        self.set_words(words)
    }

    /// Grade one cell against its known answer.
    pub fn check_cell(
        &mut self,
        position: Position,
        observer: &mut dyn BoardObserver,
    ) -> Result<(), Error> {
        let cell = self.cell_at(position)?;
        if cell.is_empty() || cell.is_void() {
            return Ok(());
        }
        let Some(correct) = self.correct_letter(position) else {
            return Ok(());
        };

        let status = match correct {
            WordLetter::Unknown => CellStatus::Default,
            WordLetter::Known { letter } if cell.letter() == Some(letter) => {
                CellStatus::KnownCorrect
            }
            WordLetter::Known { .. } => CellStatus::KnownIncorrect,
        };
        let change = CellChange {
            letter: None,
            status: Some(status),
        };
        self.change_cell(position, &change, CellChangeOptions::new(Announce::All), observer)
    }

    /// Grade every cell.
    pub fn check_puzzle(&mut self, observer: &mut dyn BoardObserver) -> Result<(), Error> {
        for position in self.positions() {
            self.check_cell(position, observer)?;
        }
        Ok(())
    }

    /// Clear every letter.
    pub fn reset(&mut self, observer: &mut dyn BoardObserver) -> Result<(), Error> {
        for position in self.positions() {
            self.change_cell(
                position,
                &CellChange::clear(),
                CellChangeOptions::new(Announce::All),
                observer,
            )?;
        }
        Ok(())
    }

    pub fn is_known_solved(&self) -> bool {
        self.words.iter().all(|word| word.is_known_solved(self))
    }

    pub fn board_state(&self, include_answers: bool) -> BoardState {
        BoardState {
            id: self.id.clone(),
            cell_states: self
                .cells
                .iter()
                .map(|row| row.iter().map(Cell::cell_state).collect())
                .collect(),
            selection: self.selection_state(),
            words: self
                .words
                .iter()
                .map(|word| word.word_state(include_answers))
                .collect(),
        }
    }

    fn announce(
        &self,
        announce: &Announce,
        announcement: Announcement,
        observer: &mut dyn BoardObserver,
    ) -> Result<(), Error> {
        if self.player_id.is_none() {
            return Ok(());
        }
        match announce.scope() {
            Some(except) => observer.announce(announcement, except),
            None => Ok(()),
        }
    }
}
