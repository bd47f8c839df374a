//! Grid Coordinates
//!
//! Integer cell positions on a square, toroidal board.
//! The snake never dies on walls: every step wraps around the edges.

use serde::{Serialize, Deserialize};

/// A cell on the board.
///
/// Always satisfies `0 <= x, y < cells` for the active grid size.
/// Ord is derived so positions can live in BTreeSet for deterministic scans.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    /// Column
    pub x: i32,
    /// Row (grows downward, like the canvas it is drawn on)
    pub y: i32,
}

impl Position {
    /// Origin cell, also the fallback when the board is full.
    pub const ORIGIN: Position = Position { x: 0, y: 0 };

    /// Create a new position.
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Step one cell in `dir`, wrapping around a `cells`-sized board.
    #[inline]
    pub fn step(self, dir: Direction, cells: i32) -> Self {
        let (dx, dy) = dir.delta();
        Self {
            x: wrap(self.x + dx, cells),
            y: wrap(self.y + dy, cells),
        }
    }

    /// Offset by a raw delta with wraparound.
    #[inline]
    pub fn offset(self, dx: i32, dy: i32, cells: i32) -> Self {
        Self {
            x: wrap(self.x + dx, cells),
            y: wrap(self.y + dy, cells),
        }
    }

    /// Clamp both components into `[0, cells - 1]`.
    #[inline]
    pub fn clamp_to(self, cells: i32) -> Self {
        let max = (cells - 1).max(0);
        Self {
            x: self.x.clamp(0, max),
            y: self.y.clamp(0, max),
        }
    }

    /// Is this cell inside a `cells`-sized board?
    #[inline]
    pub fn in_bounds(self, cells: i32) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < cells && self.y < cells
    }

    /// Chebyshev (king-move) distance, without wraparound.
    #[inline]
    pub fn chebyshev(self, other: Position) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Wrap a coordinate onto `[0, cells)`.
#[inline]
pub fn wrap(value: i32, cells: i32) -> i32 {
    if cells <= 0 {
        return 0;
    }
    value.rem_euclid(cells)
}

/// Heading of the snake. Always a unit step along one axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum Direction {
    /// (0, -1)
    Up = 0,
    /// (0, 1)
    Down = 1,
    /// (-1, 0)
    Left = 2,
    /// (1, 0)
    #[default]
    Right = 3,
}

impl Direction {
    /// All four headings, in wire order.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Unit vector for this heading.
    #[inline]
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    /// The heading pointing the other way.
    #[inline]
    pub const fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Would turning to `self` fold the snake back onto `current`?
    #[inline]
    pub fn reverses(self, current: Direction) -> bool {
        self == current.opposite()
    }

    /// Get from index (0-3).
    pub fn from_index(index: u8) -> Option<Direction> {
        match index {
            0 => Some(Direction::Up),
            1 => Some(Direction::Down),
            2 => Some(Direction::Left),
            3 => Some(Direction::Right),
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
