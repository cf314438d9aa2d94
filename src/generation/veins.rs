//! Mineral veins seeded into the solid rock of dungeon levels.
//!
//! Quartz and magma clusters grow by a short random walk that only ever
//! converts interior `Wall` cells, so veins never cut into rooms, corridors
//! or the permanent border.

use crate::config;
use crate::game::{Position, Terrain, TileGrid};
use crate::utils::GameRng;
use crate::GloomResult;

/// How many clusters of each mineral were placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VeinSummary {
    pub quartz_clusters: u32,
    pub magma_clusters: u32,
    pub tiles: u32,
}

/// Base cluster count for a level, before the per-mineral spread.
///
/// `max(3, depth / 2)` for a full-size 100x65 level, scaled down with area.
///
/// # Examples
///
/// ```
/// use gloomdeep::vein_base_count;
///
/// assert_eq!(vein_base_count(1, 100, 65), 3.0);
/// assert_eq!(vein_base_count(20, 100, 65), 10.0);
/// assert!(vein_base_count(1, 20, 12) < 1.0);
/// ```
pub fn vein_base_count(depth: u32, width: u32, height: u32) -> f64 {
    let reference_area =
        (config::DEFAULT_DUNGEON_WIDTH * config::DEFAULT_DUNGEON_HEIGHT) as f64;
    let area = (width * height) as f64;
    (depth / 2).max(3) as f64 * (area / reference_area)
}

/// Seeds quartz and magma veins into a dungeon grid. The town gets none.
pub fn add_veins(grid: &mut TileGrid, depth: u32, rng: &mut GameRng) -> GloomResult<VeinSummary> {
    let mut summary = VeinSummary::default();
    if depth == 0 {
        return Ok(summary);
    }

    let base = vein_base_count(depth, grid.width, grid.height);
    summary.quartz_clusters = (base * rng.uniform(0.8, 1.2)).round() as u32;
    summary.magma_clusters = (base * rng.uniform(1.0, 1.5)).round() as u32;

    let rock: Vec<Position> = grid
        .find(|t| t == Terrain::Wall)
        .into_iter()
        .filter(|&pos| !grid.is_border(pos))
        .collect();
    if rock.is_empty() {
        return Ok(summary);
    }

    for _ in 0..summary.quartz_clusters {
        let size = rng.range(3, 6) as u32;
        summary.tiles += grow_cluster(grid, &rock, Terrain::QuartzVein, size, rng)?;
    }
    for _ in 0..summary.magma_clusters {
        let size = rng.range(4, 8) as u32;
        summary.tiles += grow_cluster(grid, &rock, Terrain::MagmaVein, size, rng)?;
    }

    Ok(summary)
}

/// Random-walks from a random rock cell, converting up to `size` walls.
fn grow_cluster(
    grid: &mut TileGrid,
    rock: &[Position],
    mineral: Terrain,
    size: u32,
    rng: &mut GameRng,
) -> GloomResult<u32> {
    let Some(&start) = rng.choose(rock) else {
        return Ok(0);
    };

    let mut converted = 0;
    let mut pos = start;
    for _ in 0..size * 8 {
        if converted >= size {
            break;
        }
        if grid.get(pos) == Some(Terrain::Wall) && !grid.is_border(pos) {
            grid.set(pos, mineral)?;
            converted += 1;
        }
        let neighbours = pos.cardinal_adjacent_positions();
        if let Some(&next) = rng.choose(&neighbours) {
            if grid.in_bounds(next) && !grid.is_border(next) {
                pos = next;
            }
        }
    }
    Ok(converted)
}
