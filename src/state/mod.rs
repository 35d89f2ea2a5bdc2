//! The crossword state model.
//!
//! - `position` - Grid coordinates and directions
//! - `cell` - Grid squares: letter, status, crossing words
//! - `word` - Word spans, clues and answers
//! - `board` - One player's grid, word list and selection
//! - `input` - Keyboard handling on a board
//! - `puzzle` - Puzzle input and puzzle sources
//! - `player` - Player fields and permission-checked changes
//! - `game` - The multiplayer session and its authority rules
//! - `ticker` - Health-drain timing
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Game<E: Endpoint>                                            │
//! │                                                              │
//! │  endpoint ◀──── announcements ────┐                          │
//! │                                   │                          │
//! │  players: id → Player             │ GameObserver             │
//! │                 │                 │ (announce, cell_changed) │
//! │                 ▼                 │                          │
//! │               Board ──────────────┘                          │
//! │                 │                                            │
//! │        cells[y][x] ◀── WordId / Position ──▶ words[]         │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing below the game holds a pointer upward. Cells and words refer to
//! each other by position and id; a board knows its player only by id, and
//! reaches its game through the observer passed into each mutation.

pub mod board;
pub mod cell;
pub mod game;
pub mod input;
pub mod player;
pub mod position;
pub mod puzzle;
pub mod ticker;
pub mod word;

#[cfg(test)]
pub(crate) mod testing;

pub use board::{
    Board, BoardObserver, BoardState, CellChangeOptions, Detached, Selection, SelectionChange,
    SelectionOptions,
};
pub use cell::{parse_letter, Cell, CellChange, CellState, CellStatus, Crossing};
pub use game::{Game, GameChange, GameObserver, GameState, GameStatus, PlayerChangeOptions};
pub use input::KeyEvent;
pub use player::{Allow, Player, PlayerChange, PlayerChangeState, PlayerField, PlayerState};
pub use position::{Direction, Position};
pub use puzzle::{Clue, Puzzle, PuzzleBank, PuzzleSource};
pub use ticker::HealthDrainTicker;
pub use word::{Word, WordId, WordLetter, WordState};
