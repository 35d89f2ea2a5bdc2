//! Puzzle input and puzzle sources.
//!
//! Puzzles come from outside this crate. A board is built from one with
//! [`Board::from_puzzle`](super::Board::from_puzzle); the server draws them
//! from a [`PuzzleSource`] when assigning boards.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::position::{Direction, Position};
use crate::error::Error;

/// One clue of a puzzle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clue {
    pub start_cell: Position,
    pub direction: Direction,
    pub text: String,
}

impl Clue {
    pub fn new(x: i32, y: i32, direction: Direction, text: impl Into<String>) -> Self {
        Self {
            start_cell: Position::new(x, y),
            direction,
            text: text.into(),
        }
    }
}

/// A filled crossword: one string per row, `' '` for blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub cell_letters: Vec<String>,
    pub clues: Vec<Clue>,
}

impl Puzzle {
    /// Puzzle with no letters and no clues.
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            cell_letters: vec![" ".repeat(width); height],
            clues: Vec::new(),
        }
    }
}

/// Supplies puzzles for new boards.
pub trait PuzzleSource {
    /// Pick a puzzle, avoiding `previous` when there is any alternative.
    fn next_puzzle(&mut self, previous: Option<usize>) -> Result<(usize, Puzzle), Error>;
}

/// Random draws from a fixed list of puzzles.
#[derive(Debug, Clone)]
pub struct PuzzleBank {
    puzzles: Vec<Puzzle>,
    rng: StdRng,
}

impl PuzzleBank {
    pub fn new(puzzles: Vec<Puzzle>) -> Self {
        Self {
            puzzles,
            rng: StdRng::from_entropy(),
        }
    }

    /// Deterministic draws, for tests and replays.
    pub fn with_seed(puzzles: Vec<Puzzle>, seed: u64) -> Self {
        Self {
            puzzles,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    /// A few hand-made 5x5 puzzles.
    pub fn builtin() -> Self {
        use Direction::{Across, Down};

        let five_by_five = |rows: [&str; 5], texts: [&str; 10]| {
            let starts = [
                (1, 0, Across),
                (0, 1, Across),
                (0, 2, Across),
                (0, 3, Across),
                (1, 4, Across),
                (1, 0, Down),
                (2, 0, Down),
                (3, 0, Down),
                (0, 1, Down),
                (4, 1, Down),
            ];
            Puzzle {
                cell_letters: rows.iter().map(|r| r.to_string()).collect(),
                clues: starts
                    .iter()
                    .zip(texts)
                    .map(|(&(x, y, direction), text)| Clue::new(x, y, direction, text))
                    .collect(),
            }
        };

        Self::new(vec![
            five_by_five(
                [" APR ", "TRIAL", "ARENA", "RACKS", " YES "],
                [
                    "Loan statistic, or month",
                    "Evaluation",
                    "Venue for various big events",
                    "Things that store things",
                    "Simple answer",
                    "Data type that stores many",
                    "Portion",
                    "Standings",
                    "Viscous organic material",
                    "___ Vegas",
                ],
            ),
            five_by_five(
                [" AUS ", "ALLOY", "TITLE", "MARIA", " SAD "],
                [
                    "Abbreviation for the largest Oceanic country",
                    "Mixture of metals",
                    "Name",
                    "2024 film about opera singer Callas",
                    "Lacking in joy",
                    "Another name",
                    "MK_____",
                    "Familiar state of matter",
                    "Source of funds",
                    "Agreement",
                ],
            ),
            five_by_five(
                [" ALL ", "CHEAP", "DEATH", "SAVED", " DER "],
                [
                    "Every",
                    "With \"out\", to skimp",
                    "Our end",
                    "Rescued",
                    "Common German article",
                    "In front",
                    "Exit",
                    "\"Not now\"",
                    "Musical discs",
                    "High degree",
                ],
            ),
        ])
    }
}

impl PuzzleSource for PuzzleBank {
    fn next_puzzle(&mut self, previous: Option<usize>) -> Result<(usize, Puzzle), Error> {
        let count = self.puzzles.len();
        if count == 0 {
            return Err(Error::NoPuzzles);
        }

        let index = match previous {
            // Draw from the other count-1 puzzles and skip over `previous`.
            Some(previous) if count > 1 && previous < count => {
                let index = self.rng.gen_range(0..count - 1);
                if index >= previous {
                    index + 1
                } else {
                    index
                }
            }
            _ => self.rng.gen_range(0..count),
        };

        Ok((index, self.puzzles[index].clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Board;

    #[test]
    fn test_builtin_puzzles_build() {
        let bank = PuzzleBank::builtin();
        assert_eq!(bank.len(), 3);
        for puzzle in &bank.puzzles {
            let board = Board::from_puzzle(puzzle).unwrap();
            assert_eq!(board.words().len(), 10);
        }
    }

    #[test]
    fn test_never_repeats_previous() {
        let mut bank = PuzzleBank::with_seed(PuzzleBank::builtin().puzzles, 7);
        let mut previous = None;
        for _ in 0..50 {
            let (index, _) = bank.next_puzzle(previous).unwrap();
            assert_ne!(Some(index), previous);
            previous = Some(index);
        }
    }

    #[test]
    fn test_single_puzzle_repeats() {
        let mut bank = PuzzleBank::with_seed(vec![Puzzle::blank(3, 3)], 1);
        assert_eq!(bank.next_puzzle(Some(0)).unwrap().0, 0);
    }

    #[test]
    fn test_empty_bank() {
        let mut bank = PuzzleBank::new(Vec::new());
        assert_eq!(bank.next_puzzle(None).unwrap_err(), Error::NoPuzzles);
    }

    #[test]
    fn test_puzzle_json() {
        let json = r#"{
            "cellLetters": ["AB", "C "],
            "clues": [{"startCell": {"x": 0, "y": 0}, "direction": "across", "text": "ab"}]
        }"#;
        let puzzle: Puzzle = serde_json::from_str(json).unwrap();
        assert_eq!(puzzle.clues[0], Clue::new(0, 0, Direction::Across, "ab"));
    }
}
