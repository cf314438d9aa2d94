//! Property tests for the map generator.

use gloomdeep::generation::utils::{connected, validate_level};
use gloomdeep::{generate_level, GenerationConfig, Position, Terrain, TileGrid};
use proptest::prelude::*;

fn has_room(grid: &TileGrid) -> bool {
    grid.positions().any(|pos| {
        [(0, 0), (1, 0), (0, 1), (1, 1)]
            .iter()
            .all(|&(dx, dy)| grid.is_walkable(pos + Position::new(dx, dy)))
    })
}

fn border_is_wall(grid: &TileGrid) -> bool {
    grid.positions()
        .filter(|&pos| grid.is_border(pos))
        .all(|pos| grid.get(pos) == Some(Terrain::Wall))
}

/// A 40x20 first level has rooms, one way down and a solid border.
#[test]
fn test_small_first_level() {
    let config = GenerationConfig::new();
    for seed in 0..20 {
        let grid = generate_level(40, 20, 1, seed, &config);
        assert_eq!((grid.width, grid.height), (40, 20));
        assert!(has_room(&grid), "seed {} produced no room", seed);
        assert_eq!(grid.count(|t| t == Terrain::StairsDown), 1);
        assert!(border_is_wall(&grid));
    }
}

#[test]
fn test_town_is_fixed_and_valid() {
    let config = GenerationConfig::new();
    let a = generate_level(10, 10, 0, 1, &config);
    let b = generate_level(200, 80, 0, 999, &config);
    assert_eq!(a.to_rows(), b.to_rows());
    assert!(validate_level(&a).is_ok());
}

#[test]
fn test_requested_size_is_clamped() {
    let config = GenerationConfig::new();
    let tiny = generate_level(3, 3, 2, 7, &config);
    assert_eq!(
        (tiny.width, tiny.height),
        (config.min_width, config.min_height)
    );
    let huge = generate_level(10_000, 10_000, 2, 7, &config);
    assert_eq!(
        (huge.width, huge.height),
        (config.max_width, config.max_height)
    );
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_levels_are_valid(
        seed in any::<u64>(),
        depth in 1u32..40,
        width in 20u32..120,
        height in 12u32..60,
    ) {
        let grid = generate_level(width, height, depth, seed, &GenerationConfig::new());
        prop_assert!(border_is_wall(&grid));
        prop_assert_eq!(grid.count(|t| t == Terrain::StairsDown), 1);
        let stairs = grid.stairs_down.unwrap();
        prop_assert!(connected(&grid, grid.entry, stairs));
        prop_assert!(validate_level(&grid).is_ok());
    }

    #[test]
    fn prop_generation_is_deterministic(seed in any::<u64>(), depth in 1u32..20) {
        let config = GenerationConfig::for_testing();
        let a = generate_level(40, 20, depth, seed, &config);
        let b = generate_level(40, 20, depth, seed, &config);
        prop_assert_eq!(a, b);
    }
}
