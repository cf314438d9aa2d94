//! Performance tests for generation, field of view and snapshots.
//!
//! Bounds are loose so debug builds on slow machines still pass; they catch
//! accidental quadratic blowups, not small regressions.

use gloomdeep::game::fov;
use gloomdeep::{
    config, generate_level, CharacterClass, ContentTables, GameConfig, GameState, GenerationConfig,
    GloomResult, PlayerAction, Position, VisibilityMap,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[test]
fn test_max_size_generation_performance() {
    let settings = GenerationConfig::new();
    let (width, height) = (config::MAX_DUNGEON_WIDTH, config::MAX_DUNGEON_HEIGHT);

    let start = Instant::now();
    let iterations = 5;
    for seed in 0..iterations {
        let grid = generate_level(width, height, 10, seed, &settings);
        assert_eq!((grid.width, grid.height), (width, height));
    }
    let average = start.elapsed() / iterations as u32;

    println!("Average {}x{} generation time: {:?}", width, height, average);
    assert!(
        average < Duration::from_secs(2),
        "Generation too slow: {:?}",
        average
    );
}

#[test]
fn test_fov_performance() {
    let settings = GenerationConfig::new();
    let grid = generate_level(
        config::MAX_DUNGEON_WIDTH,
        config::MAX_DUNGEON_HEIGHT,
        5,
        42,
        &settings,
    );
    let mut visibility = VisibilityMap::new(grid.width, grid.height);
    let origin = grid.entry;

    let start = Instant::now();
    let iterations = 200;
    for _ in 0..iterations {
        fov::compute(&grid, origin, 20, &mut visibility);
    }
    let average = start.elapsed() / iterations;

    println!("Average FOV time: {:?}", average);
    assert!(visibility.is_visible(origin));
    assert!(
        average < Duration::from_millis(50),
        "FOV too slow: {:?}",
        average
    );
}

#[test]
fn test_turn_and_snapshot_performance() -> GloomResult<()> {
    let content = Arc::new(ContentTables::builtin()?);
    let mut game = GameState::new_game(
        12345,
        "TestPlayer",
        CharacterClass::Warrior,
        content,
        GameConfig::default(),
    )?;
    game.player.position = game
        .current_level()?
        .grid
        .stairs_down
        .unwrap_or(Position::new(1, 1));
    game.submit_player_action(PlayerAction::ChangeDepth)?;

    let start = Instant::now();
    let iterations = 100;
    for _ in 0..iterations {
        if game.is_over() {
            break;
        }
        game.submit_player_action(PlayerAction::Search)?;
        let snapshot = game.snapshot()?;
        assert!(!snapshot.cells.is_empty());
    }
    let average = start.elapsed() / iterations;

    println!("Average turn plus snapshot time: {:?}", average);
    assert!(
        average < Duration::from_millis(20),
        "Turn processing too slow: {:?}",
        average
    );
    Ok(())
}
