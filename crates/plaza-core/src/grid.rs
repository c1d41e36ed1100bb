use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A cell on a room's grid. Coordinates are zero-based, (0, 0) top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: u32,
    pub y: u32,
}

impl Position {
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

/// Facing direction attached to a movement report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Grid bounds and static obstacles for one room, sourced from the space
/// geometry collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomGeometry {
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub obstacles: HashSet<Position>,
}

impl RoomGeometry {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            obstacles: HashSet::new(),
        }
    }

    /// Whether `pos` lies inside the grid bounds.
    pub fn contains(&self, pos: Position) -> bool {
        pos.x < self.width && pos.y < self.height
    }

    /// Whether `pos` is in bounds and not occupied by a static obstacle.
    pub fn is_walkable(&self, pos: Position) -> bool {
        self.contains(pos) && !self.obstacles.contains(&pos)
    }
}

/// Single-step displacement rule: a move is legal iff the two positions
/// differ by exactly one unit along exactly one axis. Standing still,
/// diagonals, and longer jumps are all illegal.
pub fn is_legal_step(from: Position, to: Position) -> bool {
    let dx = from.x.abs_diff(to.x);
    let dy = from.y.abs_diff(to.y);
    (dx == 1 && dy == 0) || (dx == 0 && dy == 1)
}
