//! # Field of View
//!
//! Ray-cast field of view over a [`TileGrid`].
//!
//! Every cell within Chebyshev distance `radius` of the origin is tested with a
//! Bresenham line. Opaque terrain stops the ray but is itself lit, and a
//! diagonal step squeezing between two opaque cells is blocked so light never
//! leaks through wall corners. The engine keeps no state of its own: the
//! caller's [`VisibilityMap`] carries the explored memory between calls.

use crate::game::{Position, TileGrid, Visibility, VisibilityMap};
use crate::utils::bresenham_line;

/// Recomputes visibility around `origin`.
///
/// Previously visible cells become remembered; cells in view become visible.
/// An out-of-bounds origin is clamped to the nearest cell of the grid.
///
/// # Examples
///
/// ```
/// use gloomdeep::{fov, Position, TileGrid, Visibility, VisibilityMap};
///
/// let grid = TileGrid::from_rows(1, &["#####", "#...#", "#####"]).unwrap();
/// let mut seen = VisibilityMap::for_grid(&grid);
/// fov::compute(&grid, Position::new(1, 1), 2, &mut seen);
/// assert_eq!(seen.get(Position::new(3, 1)), Visibility::Visible);
/// assert_eq!(seen.get(Position::new(4, 1)), Visibility::Unseen);
/// ```
pub fn compute(grid: &TileGrid, origin: Position, radius: u32, visibility: &mut VisibilityMap) {
    visibility.fade_visible();

    let origin = grid.clamp(origin);
    visibility.set(origin, Visibility::Visible);

    let r = radius as i32;
    for y in (origin.y - r).max(0)..=(origin.y + r).min(grid.height as i32 - 1) {
        for x in (origin.x - r).max(0)..=(origin.x + r).min(grid.width as i32 - 1) {
            let target = Position::new(x, y);
            if target != origin && line_of_sight(grid, origin, target) {
                visibility.set(target, Visibility::Visible);
            }
        }
    }
}

/// Checks whether `to` can be seen from `from`.
///
/// Intermediate cells must be transparent. The target itself may be opaque,
/// which is how walls bounding a room become visible.
pub fn line_of_sight(grid: &TileGrid, from: Position, to: Position) -> bool {
    if !grid.in_bounds(from) || !grid.in_bounds(to) {
        return false;
    }

    let line = bresenham_line(from, to);
    for (index, pair) in line.windows(2).enumerate() {
        let (prev, next) = (pair[0], pair[1]);

        if prev.x != next.x
            && prev.y != next.y
            && grid.blocks_sight(Position::new(next.x, prev.y))
            && grid.blocks_sight(Position::new(prev.x, next.y))
        {
            return false;
        }

        let is_target = index + 2 == line.len();
        if !is_target && grid.blocks_sight(next) {
            return false;
        }
    }

    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{DoorState, Terrain};

    fn open_room(size: u32) -> TileGrid {
        let mut grid = TileGrid::new(size, size, 1);
        for y in 1..size as i32 - 1 {
            for x in 1..size as i32 - 1 {
                grid.set(Position::new(x, y), Terrain::Floor).unwrap();
            }
        }
        grid
    }

    #[test]
    fn test_radius_is_inclusive_chebyshev() {
        let grid = open_room(21);
        let mut seen = VisibilityMap::for_grid(&grid);
        compute(&grid, Position::new(10, 10), 3, &mut seen);

        assert!(seen.is_visible(Position::new(13, 13)));
        assert!(seen.is_visible(Position::new(7, 10)));
        assert!(!seen.is_visible(Position::new(14, 10)));
        assert_eq!(seen.count(Visibility::Visible), 49);
    }

    #[test]
    fn test_zero_radius_sees_only_origin() {
        let grid = open_room(9);
        let mut seen = VisibilityMap::for_grid(&grid);
        compute(&grid, Position::new(4, 4), 0, &mut seen);
        assert_eq!(seen.count(Visibility::Visible), 1);
        assert!(seen.is_visible(Position::new(4, 4)));
    }

    #[test]
    fn test_walls_block_but_are_visible() {
        let grid = TileGrid::from_rows(1, &["#########", "#...#...#", "#########"]).unwrap();
        let mut seen = VisibilityMap::for_grid(&grid);
        compute(&grid, Position::new(1, 1), 8, &mut seen);

        assert!(seen.is_visible(Position::new(4, 1)));
        assert!(!seen.is_visible(Position::new(5, 1)));
        assert!(!seen.is_visible(Position::new(7, 1)));
    }

    #[test]
    fn test_closed_door_blocks_open_door_does_not() {
        let mut grid = TileGrid::from_rows(1, &["#######", "#..+..#", "#######"]).unwrap();
        let mut seen = VisibilityMap::for_grid(&grid);
        compute(&grid, Position::new(1, 1), 6, &mut seen);
        assert!(seen.is_visible(Position::new(3, 1)));
        assert!(!seen.is_visible(Position::new(4, 1)));

        grid.set(Position::new(3, 1), Terrain::Door(DoorState::Open))
            .unwrap();
        compute(&grid, Position::new(1, 1), 6, &mut seen);
        assert!(seen.is_visible(Position::new(5, 1)));
    }

    #[test]
    fn test_corner_blocking() {
        // The origin's east and south neighbours are wall, the diagonal is floor.
        let grid = TileGrid::from_rows(1, &["#####", "#.#.#", "##..#", "#...#", "#####"]).unwrap();
        let mut seen = VisibilityMap::for_grid(&grid);
        compute(&grid, Position::new(1, 1), 3, &mut seen);
        assert!(!seen.is_visible(Position::new(2, 2)));
        assert!(seen.is_visible(Position::new(2, 1)));
        assert!(seen.is_visible(Position::new(1, 2)));
    }

    #[test]
    fn test_visible_becomes_remembered() {
        let grid = open_room(21);
        let mut seen = VisibilityMap::for_grid(&grid);
        compute(&grid, Position::new(3, 3), 2, &mut seen);
        compute(&grid, Position::new(15, 15), 2, &mut seen);

        assert_eq!(seen.get(Position::new(3, 3)), Visibility::Remembered);
        assert_eq!(seen.get(Position::new(15, 15)), Visibility::Visible);
        assert_eq!(seen.get(Position::new(10, 10)), Visibility::Unseen);
    }

    #[test]
    fn test_out_of_bounds_origin_is_clamped() {
        let grid = open_room(7);
        let mut seen = VisibilityMap::for_grid(&grid);
        compute(&grid, Position::new(-5, 3), 1, &mut seen);
        assert!(seen.is_visible(Position::new(0, 3)));
        assert!(seen.is_visible(Position::new(1, 3)));
    }
}
