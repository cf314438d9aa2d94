//! # Game Mathematics
//!
//! Grid lines, ability modifiers and other small calculations shared across
//! the engine.

use crate::game::Position;

/// Returns the cells of a Bresenham line from `from` to `to`, both inclusive.
///
/// # Examples
///
/// ```
/// use gloomdeep::{bresenham_line, Position};
///
/// let line = bresenham_line(Position::new(0, 0), Position::new(3, 1));
/// assert_eq!(line.first(), Some(&Position::new(0, 0)));
/// assert_eq!(line.last(), Some(&Position::new(3, 1)));
/// assert_eq!(line.len(), 4);
/// ```
pub fn bresenham_line(from: Position, to: Position) -> Vec<Position> {
    let mut cells = Vec::new();
    let dx = (to.x - from.x).abs();
    let dy = -(to.y - from.y).abs();
    let sx = if from.x < to.x { 1 } else { -1 };
    let sy = if from.y < to.y { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (from.x, from.y);

    loop {
        cells.push(Position::new(x, y));
        if x == to.x && y == to.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }

    cells
}

/// Ability score modifier, rounded toward negative infinity.
///
/// A score of 10 or 11 gives +0, 8 gives -1, 18 gives +4.
pub fn ability_modifier(score: i32) -> i32 {
    (score - 10).div_euclid(2)
}

/// Proficiency bonus for a character level.
pub fn proficiency_bonus(level: u32) -> i32 {
    2 + (level.max(1) as i32 - 1) / 4
}

/// Unit step (each axis in -1..=1) that moves `from` toward `to`.
pub fn step_toward(from: Position, to: Position) -> Position {
    Position::new((to.x - from.x).signum(), (to.y - from.y).signum())
}
