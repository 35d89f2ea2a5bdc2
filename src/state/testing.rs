//! Shared fixtures for unit tests.

use super::board::{Board, BoardObserver};
use super::position::{Direction, Position};
use super::puzzle::{Clue, Puzzle};
use crate::error::Error;
use crate::protocol::Announcement;

/// 5x5 grid with blocked corners and ten words.
///
/// ```text
///   ABC
///  DEFGH
///  IJKLM
///  NOPQR
///   STU
/// ```
pub fn fixture_puzzle() -> Puzzle {
    use Direction::{Across, Down};

    Puzzle {
        cell_letters: [" ABC ", "DEFGH", "IJKLM", "NOPQR", " STU "]
            .iter()
            .map(|row| row.to_string())
            .collect(),
        clues: vec![
            Clue::new(1, 0, Across, "1A"),
            Clue::new(0, 1, Across, "4A"),
            Clue::new(0, 2, Across, "6A"),
            Clue::new(0, 3, Across, "7A"),
            Clue::new(1, 4, Across, "8A"),
            Clue::new(1, 0, Down, "1D"),
            Clue::new(2, 0, Down, "2D"),
            Clue::new(3, 0, Down, "3D"),
            Clue::new(0, 1, Down, "4D"),
            Clue::new(4, 1, Down, "5D"),
        ],
    }
}

pub fn fixture_board() -> Board {
    Board::from_puzzle(&fixture_puzzle()).expect("fixture puzzle is valid")
}

/// Observer that records announcements and ignores cell changes.
#[derive(Debug, Default)]
pub struct Recorder {
    pub announcements: Vec<(Announcement, Option<String>)>,
}

impl BoardObserver for Recorder {
    fn announce(
        &mut self,
        announcement: Announcement,
        except_player_id: Option<&str>,
    ) -> Result<(), Error> {
        self.announcements
            .push((announcement, except_player_id.map(String::from)));
        Ok(())
    }

    fn cell_changed(&mut self, _: &mut Board, _: Position) -> Result<(), Error> {
        Ok(())
    }
}
