//! # Pathfinding Algorithms
//!
//! Thin wrappers over the `pathfinding` crate for monster pursuit and level
//! connectivity checks.

use crate::game::Position;
use ::pathfinding::prelude::{astar, bfs};

/// Returns the first step of a shortest 8-way path from `start` to `goal`.
///
/// `passable` decides which cells may be entered; the goal itself is always
/// allowed so a monster can path to the player's cell. Returns `None` when the
/// goal is unreachable or equal to the start.
pub fn next_step_toward<F>(start: Position, goal: Position, passable: F) -> Option<Position>
where
    F: Fn(Position) -> bool,
{
    if start == goal {
        return None;
    }

    let (path, _cost) = astar(
        &start,
        |&pos| {
            pos.adjacent_positions()
                .into_iter()
                .filter(|&next| next == goal || passable(next))
                .map(|next| (next, 1u32))
                .collect::<Vec<_>>()
        },
        |&pos| pos.chebyshev_distance(goal),
        |&pos| pos == goal,
    )?;

    path.get(1).copied()
}

/// Checks whether `goal` can be reached from `start` with 4-way moves.
pub fn is_reachable<F>(start: Position, goal: Position, passable: F) -> bool
where
    F: Fn(Position) -> bool,
{
    bfs(
        &start,
        |&pos| {
            pos.cardinal_adjacent_positions()
                .into_iter()
                .filter(|&next| passable(next))
                .collect::<Vec<_>>()
        },
        |&pos| pos == goal,
    )
    .is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_box(pos: Position) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < 10 && pos.y < 10
    }

    #[test]
    fn test_next_step_on_open_ground() {
        let step = next_step_toward(Position::new(0, 0), Position::new(5, 5), open_box);
        assert_eq!(step, Some(Position::new(1, 1)));
    }

    #[test]
    fn test_next_step_around_wall() {
        // Vertical wall at x == 3 with a gap at y == 8.
        let passable = |pos: Position| open_box(pos) && !(pos.x == 3 && pos.y != 8);
        let step = next_step_toward(Position::new(1, 1), Position::new(5, 1), passable);
        let step = step.expect("a path exists through the gap");
        assert_eq!(step.chebyshev_distance(Position::new(1, 1)), 1);
        assert!(passable(step));
    }

    #[test]
    fn test_unreachable_goal() {
        let passable = |pos: Position| open_box(pos) && pos.x != 3;
        assert_eq!(
            next_step_toward(Position::new(1, 1), Position::new(5, 1), passable),
            None
        );
        assert!(!is_reachable(Position::new(1, 1), Position::new(5, 1), passable));
        assert!(is_reachable(Position::new(1, 1), Position::new(2, 9), passable));
    }
}
