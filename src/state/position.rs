//! Grid coordinates and word directions.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A cell coordinate. `x` grows rightward, `y` grows downward.
///
/// Signed so that stepping off the top/left edge produces a position that
/// simply doesn't resolve to a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Move `delta` steps along `direction`'s axis.
    pub fn step(self, direction: Direction, delta: i32) -> Self {
        match direction {
            Direction::Across => Self::new(self.x + delta, self.y),
            Direction::Down => Self::new(self.x, self.y + delta),
        }
    }

    /// Coordinate along `direction`'s axis.
    pub fn along(self, direction: Direction) -> i32 {
        match direction {
            Direction::Across => self.x,
            Direction::Down => self.y,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Word direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Across,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Across, Direction::Down];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Across => "across",
            Self::Down => "down",
        }
    }

    pub fn perpendicular(self) -> Self {
        match self {
            Self::Across => Self::Down,
            Self::Down => Self::Across,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
