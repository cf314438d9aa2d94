//! Integration tests for stair navigation between the town and the dungeon.

use gloomdeep::{
    CharacterClass, ContentTables, GameConfig, GameEvent, GameState, GroundItem, PlayerAction,
    Position, Terrain,
};
use std::sync::Arc;

fn new_game(seed: u64) -> GameState {
    let content = Arc::new(ContentTables::builtin().unwrap());
    GameState::new_game(seed, "TestHero", CharacterClass::Warrior, content, GameConfig::default())
        .unwrap()
}

/// Puts the player on the stairs of the current level and takes them.
fn take_stairs(game: &mut GameState, terrain: Terrain) {
    let level = game.current_level().unwrap();
    let stairs = match terrain {
        Terrain::StairsDown => level.grid.stairs_down.unwrap(),
        _ => level.grid.entry,
    };
    assert_eq!(level.grid.get(stairs), Some(terrain));
    game.player.position = stairs;
    let report = game
        .submit_player_action(PlayerAction::ChangeDepth)
        .unwrap();
    assert!(report
        .events
        .iter()
        .any(|event| matches!(event, GameEvent::DepthChanged { .. })));
}

/// Asserts the player stands on `anchor` unless a monster already occupies it.
fn assert_arrived_at(game: &GameState, anchor: Position) {
    let level = game.current_level().unwrap();
    if level.monster_at(anchor).is_none() {
        assert_eq!(game.player.position, anchor);
    } else {
        assert!(level.is_free(game.player.position));
    }
}

#[test]
fn test_stairs_down_from_town_lands_on_entry() {
    let mut game = new_game(98765);
    assert_eq!(game.world.current_depth, 0);

    take_stairs(&mut game, Terrain::StairsDown);
    assert_eq!(game.world.current_depth, 1);
    assert_eq!(game.player.depth, 1);
    assert_eq!(game.player.deepest_depth, 1);
    assert_eq!(game.statistics.levels_explored, 2);

    let entry = game.current_level().unwrap().grid.entry;
    assert_eq!(
        game.current_level().unwrap().grid.get(entry),
        Some(Terrain::StairsUp)
    );
    assert_arrived_at(&game, entry);
    assert!(game.log.contains("You enter depth 1 (50 ft)."));
}

#[test]
fn test_stairs_up_returns_to_town_stairs() {
    let mut game = new_game(54321);
    let town_stairs = game.current_level().unwrap().grid.stairs_down.unwrap();

    take_stairs(&mut game, Terrain::StairsDown);
    take_stairs(&mut game, Terrain::StairsUp);
    assert_eq!(game.world.current_depth, 0);
    assert_arrived_at(&game, town_stairs);
    assert!(game.log.contains("You arrive in town."));
    assert_eq!(game.player.deepest_depth, 1);
}

#[test]
fn test_revisited_levels_are_cached() {
    let mut game = new_game(11111);
    take_stairs(&mut game, Terrain::StairsDown);
    let rows = game.current_level().unwrap().grid.to_rows();
    let marker = game.player.position;
    game.world
        .current_level_mut()
        .unwrap()
        .add_ground_item(marker, GroundItem::Gold(42));

    take_stairs(&mut game, Terrain::StairsUp);
    take_stairs(&mut game, Terrain::StairsDown);

    let level = game.current_level().unwrap();
    assert_eq!(level.grid.to_rows(), rows);
    assert!(level
        .items_at(marker)
        .iter()
        .any(|item| *item == GroundItem::Gold(42)));
    assert_eq!(game.statistics.levels_explored, 2);
}

#[test]
fn test_descending_several_levels() {
    let mut game = new_game(2024);
    for depth in 1..=4 {
        take_stairs(&mut game, Terrain::StairsDown);
        assert_eq!(game.world.current_depth, depth);
        game.world.current_level_mut().unwrap().monsters.clear();
    }
    assert_eq!(game.player.deepest_depth, 4);
    assert!(game.world.has_level(3));
}

#[test]
fn test_no_stairs_underfoot_is_rejected() {
    let mut game = new_game(7);
    let turn = game.turn;
    let level = game.current_level().unwrap();
    let floor = level
        .grid
        .positions()
        .find(|&pos| level.grid.get(pos) == Some(Terrain::Floor) && level.is_free(pos))
        .unwrap();
    game.player.position = floor;

    assert!(game
        .submit_player_action(PlayerAction::ChangeDepth)
        .is_err());
    assert_eq!(game.turn, turn);
    assert_eq!(game.world.current_depth, 0);
}
