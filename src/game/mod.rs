//! # Game Module
//!
//! Core game state, world representation, entities and the turn engine.
//!
//! This module contains the fundamental building blocks of Gloomdeep:
//! - Tile grids, visibility maps and the per-depth level cache
//! - Field of view
//! - Player, monsters, status effects and monster behaviour strategies
//! - Hidden traps
//! - The turn engine that resolves one player action per turn
//! - Save/load of the whole session

pub mod actions;
pub mod behavior;
pub mod combat;
pub mod entities;
pub mod fov;
pub mod message_log;
pub mod magic;
pub mod persistence;
pub mod recall;
pub mod rules;
pub mod state;
pub mod status;
pub mod traps;
pub mod turn;
pub mod world;

pub use actions::*;
pub use behavior::*;
pub use combat::*;
pub use entities::*;
pub use magic::*;
pub use message_log::*;
pub use persistence::*;
pub use recall::*;
pub use rules::*;
pub use state::*;
pub use status::*;
pub use traps::*;
pub use world::*;

use crate::utils::GameRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Represents a 2D coordinate on a tile grid.
///
/// # Examples
///
/// ```
/// use gloomdeep::Position;
///
/// let pos = Position::new(10, 5);
/// assert_eq!(pos.x, 10);
/// assert_eq!(pos.y, 5);
///
/// let adjacent = pos.adjacent_positions();
/// assert_eq!(adjacent.len(), 8); // All 8 surrounding positions
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Creates a new position with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Calculates the Manhattan distance to another position.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::Position;
    ///
    /// let pos1 = Position::new(0, 0);
    /// let pos2 = Position::new(3, 4);
    /// assert_eq!(pos1.manhattan_distance(pos2), 7);
    /// ```
    pub fn manhattan_distance(self, other: Position) -> u32 {
        ((self.x - other.x).abs() + (self.y - other.y).abs()) as u32
    }

    /// Chebyshev (king-move) distance, the metric used for light radius and
    /// melee reach.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::Position;
    ///
    /// assert_eq!(Position::new(0, 0).chebyshev_distance(Position::new(3, 4)), 4);
    /// ```
    pub fn chebyshev_distance(self, other: Position) -> u32 {
        (self.x - other.x).abs().max((self.y - other.y).abs()) as u32
    }

    /// Calculates the Euclidean distance to another position.
    pub fn euclidean_distance(self, other: Position) -> f64 {
        let dx = (self.x - other.x) as f64;
        let dy = (self.y - other.y) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// The neighbouring position one step in `direction`.
    pub fn step(self, direction: Direction) -> Position {
        self + direction.to_delta()
    }

    /// Returns all 8 adjacent positions (including diagonals).
    pub fn adjacent_positions(self) -> Vec<Position> {
        Direction::all().into_iter().map(|d| self.step(d)).collect()
    }

    /// Returns only the 4 cardinal adjacent positions (no diagonals).
    pub fn cardinal_adjacent_positions(self) -> Vec<Position> {
        Direction::cardinal()
            .into_iter()
            .map(|d| self.step(d))
            .collect()
    }
}

impl std::ops::Add for Position {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Position {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

/// Directions for movement, door handling and digging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    South,
    East,
    West,
    Northeast,
    Northwest,
    Southeast,
    Southwest,
}

impl Direction {
    /// Converts a direction to a position delta.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{Direction, Position};
    ///
    /// let delta = Direction::North.to_delta();
    /// assert_eq!(delta, Position::new(0, -1));
    /// ```
    pub fn to_delta(self) -> Position {
        let (dx, dy) = match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::Northeast => (1, -1),
            Direction::Northwest => (-1, -1),
            Direction::Southeast => (1, 1),
            Direction::Southwest => (-1, 1),
        };
        Position::new(dx, dy)
    }

    /// Converts a unit position delta to a direction.
    ///
    /// Returns None for the zero delta and anything longer than one step.
    pub fn from_delta(delta: Position) -> Option<Direction> {
        Direction::all()
            .into_iter()
            .find(|direction| direction.to_delta() == delta)
    }

    /// Whether this is one of the four diagonal directions.
    pub fn is_diagonal(self) -> bool {
        let delta = self.to_delta();
        delta.x != 0 && delta.y != 0
    }

    /// Returns all 8 directions.
    pub fn all() -> Vec<Direction> {
        vec![
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
            Direction::Northeast,
            Direction::Northwest,
            Direction::Southeast,
            Direction::Southwest,
        ]
    }

    /// Returns only the 4 cardinal directions.
    pub fn cardinal() -> Vec<Direction> {
        vec![
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
        ]
    }
}

/// Unique identifier for monsters.
pub type EntityId = Uuid;

/// Draws a new entity id from the game's random stream, so ids replay with the
/// seed.
pub fn new_entity_id(rng: &mut GameRng) -> EntityId {
    rng.uuid()
}
