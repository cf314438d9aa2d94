//! # Generation Module
//!
//! Procedural content generation for dungeon levels, the town, mineral veins,
//! monsters, floor items and traps.
//!
//! Every generator is a pure function of its configuration and a seeded
//! [`GameRng`], so the same seed always yields the same level.

pub mod dungeon;
pub mod encounters;
pub mod hazards;
pub mod items;
pub mod town;
pub mod veins;

pub use dungeon::*;
pub use encounters::*;
pub use hazards::*;
pub use items::*;
pub use town::*;
pub use veins::*;

use crate::config;
use crate::game::{Position, TileGrid};
use crate::utils::GameRng;
use crate::GloomResult;
use log::warn;
use serde::{Deserialize, Serialize};

/// Configuration for procedural generation.
///
/// Controls level dimensions, room layout, door and vein placement, and how
/// densely monsters and items are scattered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Smallest accepted level width
    pub min_width: u32,
    /// Smallest accepted level height
    pub min_height: u32,
    /// Largest accepted level width
    pub max_width: u32,
    /// Largest accepted level height
    pub max_height: u32,
    /// Width of a depth 1 level
    pub base_width: u32,
    /// Height of a depth 1 level
    pub base_height: u32,
    /// Extra width per depth below the first
    pub width_per_depth: u32,
    /// Extra height per depth below the first
    pub height_per_depth: u32,
    /// Width that depth scaling grows towards
    pub level_width_cap: u32,
    /// Height that depth scaling grows towards
    pub level_height_cap: u32,
    /// Minimum room size, walls included
    pub min_room_size: u32,
    /// Maximum room size, walls included
    pub max_room_size: u32,
    /// Rooms attempted per level
    pub max_rooms: u32,
    /// Placement attempts per room
    pub attempts_per_room: u32,
    /// Probability of extra connections between rooms (0.0 to 1.0)
    pub extra_connection_chance: f64,
    /// Chance an entrance door is generated closed
    pub closed_door_chance: f64,
    /// Minimum distance between two doors
    pub door_spacing: u32,
    /// Secret door chance at depth 0
    pub secret_door_base: f64,
    /// Secret door chance added per depth
    pub secret_door_per_depth: f64,
    /// Upper bound on the secret door chance
    pub secret_door_max: f64,
    /// Chance a wall next to a corridor becomes rubble
    pub rubble_chance: f64,
    /// Monsters per 100 floor tiles
    pub monster_density: f64,
    /// Floor items per 100 floor tiles
    pub item_density: f64,
    /// Gold piles per 100 floor tiles
    pub gold_density: f64,
    /// Town folk spawned in the town
    pub town_monsters: u32,
    /// Traps on a depth 1 level
    pub base_traps: u32,
    /// Depths per additional trap
    pub depths_per_trap: u32,
    /// Upper bound on traps per level
    pub max_traps: u32,
}

impl GenerationConfig {
    /// Creates a default generation configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::GenerationConfig;
    ///
    /// let config = GenerationConfig::new();
    /// assert!(config.min_room_size >= 4);
    /// assert!(config.max_room_size >= config.min_room_size);
    /// ```
    pub fn new() -> Self {
        Self {
            min_width: config::MIN_DUNGEON_WIDTH,
            min_height: config::MIN_DUNGEON_HEIGHT,
            max_width: config::MAX_DUNGEON_WIDTH,
            max_height: config::MAX_DUNGEON_HEIGHT,
            base_width: 60,
            base_height: 30,
            width_per_depth: 4,
            height_per_depth: 3,
            level_width_cap: config::DEFAULT_DUNGEON_WIDTH,
            level_height_cap: config::DEFAULT_DUNGEON_HEIGHT,
            min_room_size: 5,
            max_room_size: 12,
            max_rooms: 15,
            attempts_per_room: 10,
            extra_connection_chance: 0.15,
            closed_door_chance: 0.5,
            door_spacing: 3,
            secret_door_base: 0.05,
            secret_door_per_depth: 0.01,
            secret_door_max: 0.3,
            rubble_chance: 0.02,
            monster_density: 1.2,
            item_density: 0.6,
            gold_density: 0.5,
            town_monsters: 4,
            base_traps: 3,
            depths_per_trap: 5,
            max_traps: 15,
        }
    }

    /// Creates a configuration for testing with smaller, simpler levels.
    pub fn for_testing() -> Self {
        Self {
            base_width: 40,
            base_height: 20,
            width_per_depth: 0,
            height_per_depth: 0,
            min_room_size: 4,
            max_room_size: 7,
            max_rooms: 6,
            attempts_per_room: 8,
            extra_connection_chance: 0.1,
            monster_density: 0.5,
            item_density: 0.5,
            ..Self::new()
        }
    }

    /// Clamps requested dimensions into the configured bounds.
    pub fn clamp_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        (
            width.clamp(self.min_width, self.max_width.max(self.min_width)),
            height.clamp(self.min_height, self.max_height.max(self.min_height)),
        )
    }

    /// Dimensions of the level generated for `depth`.
    pub fn level_dimensions(&self, depth: u32) -> (u32, u32) {
        let steps = depth.saturating_sub(1);
        let width = self
            .base_width
            .saturating_add(steps.saturating_mul(self.width_per_depth))
            .min(self.level_width_cap.max(self.base_width));
        let height = self
            .base_height
            .saturating_add(steps.saturating_mul(self.height_per_depth))
            .min(self.level_height_cap.max(self.base_height));
        self.clamp_dimensions(width, height)
    }

    /// Probability that a candidate wall becomes a secret door at `depth`.
    pub fn secret_door_chance(&self, depth: u32) -> f64 {
        (self.secret_door_base + depth as f64 * self.secret_door_per_depth)
            .min(self.secret_door_max)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A rectangular room, used only while a level is being generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: u32,
    /// Top-left corner of the room
    pub top_left: Position,
    /// Width of the room (including walls)
    pub width: u32,
    /// Height of the room (including walls)
    pub height: u32,
}

impl Room {
    /// Creates a new room with the given parameters.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{Room, Position};
    ///
    /// let room = Room::new(1, Position::new(5, 5), 10, 8);
    /// assert_eq!(room.id, 1);
    /// assert_eq!(room.width, 10);
    /// assert_eq!(room.height, 8);
    /// ```
    pub fn new(id: u32, top_left: Position, width: u32, height: u32) -> Self {
        Self {
            id,
            top_left,
            width,
            height,
        }
    }

    /// Gets the bottom-right corner of the room.
    pub fn bottom_right(&self) -> Position {
        Position::new(
            self.top_left.x + self.width as i32 - 1,
            self.top_left.y + self.height as i32 - 1,
        )
    }

    /// Gets the center position of the room.
    pub fn center(&self) -> Position {
        Position::new(
            self.top_left.x + self.width as i32 / 2,
            self.top_left.y + self.height as i32 / 2,
        )
    }

    /// Checks if a position is inside this room, walls included.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{Room, Position};
    ///
    /// let room = Room::new(1, Position::new(5, 5), 10, 8);
    /// assert!(room.contains(Position::new(7, 7)));
    /// assert!(!room.contains(Position::new(20, 20)));
    /// ```
    pub fn contains(&self, pos: Position) -> bool {
        pos.x >= self.top_left.x
            && pos.y >= self.top_left.y
            && pos.x < self.top_left.x + self.width as i32
            && pos.y < self.top_left.y + self.height as i32
    }

    /// Checks if a position is on the wall ring of this room.
    pub fn is_border(&self, pos: Position) -> bool {
        if !self.contains(pos) {
            return false;
        }

        pos.x == self.top_left.x
            || pos.y == self.top_left.y
            || pos.x == self.top_left.x + self.width as i32 - 1
            || pos.y == self.top_left.y + self.height as i32 - 1
    }

    /// Checks if this room comes within `margin` tiles of another room.
    pub fn overlaps(&self, other: &Room, margin: i32) -> bool {
        !(self.top_left.x >= other.top_left.x + other.width as i32 + margin
            || other.top_left.x >= self.top_left.x + self.width as i32 + margin
            || self.top_left.y >= other.top_left.y + other.height as i32 + margin
            || other.top_left.y >= self.top_left.y + self.height as i32 + margin)
    }

    /// Gets all floor positions within this room.
    pub fn floor_positions(&self) -> Vec<Position> {
        let mut positions = Vec::new();

        for y in (self.top_left.y + 1)..(self.top_left.y + self.height as i32 - 1) {
            for x in (self.top_left.x + 1)..(self.top_left.x + self.width as i32 - 1) {
                positions.push(Position::new(x, y));
            }
        }

        positions
    }

    /// Whether a position is one of the four wall corners.
    pub fn is_corner(&self, pos: Position) -> bool {
        let br = self.bottom_right();
        (pos.x == self.top_left.x || pos.x == br.x) && (pos.y == self.top_left.y || pos.y == br.y)
    }
}

/// Trait for procedural generators.
///
/// All generation systems implement this trait, so the level builder can run
/// them the same way and validate what they produce.
pub trait Generator<T> {
    /// Generates content using the provided configuration and random number generator.
    fn generate(&self, config: &GenerationConfig, rng: &mut GameRng) -> GloomResult<T>;

    /// Validates that the generated content meets requirements.
    fn validate(&self, content: &T, config: &GenerationConfig) -> GloomResult<()>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

/// Generates the terrain for one depth.
///
/// Depth 0 is the fixed town and ignores the requested size. Deeper levels
/// are room-and-corridor dungeons clamped into the configured bounds. This
/// never fails: if a generator reports an error, a single open room is
/// returned instead.
///
/// # Examples
///
/// ```
/// use gloomdeep::{generate_level, GenerationConfig, Terrain};
///
/// let config = GenerationConfig::new();
/// let a = generate_level(40, 20, 1, 99, &config);
/// let b = generate_level(40, 20, 1, 99, &config);
/// assert_eq!(a, b);
/// assert_eq!(a.count(|t| t == Terrain::StairsDown), 1);
/// ```
pub fn generate_level(
    width: u32,
    height: u32,
    depth: u32,
    seed: u64,
    config: &GenerationConfig,
) -> TileGrid {
    let mut rng = GameRng::new(seed);

    let result = if depth == 0 {
        let generator = TownGenerator::new();
        generator.generate(config, &mut rng)
    } else {
        let (width, height) = config.clamp_dimensions(width, height);
        let generator = RoomCorridorGenerator::new(width, height, depth);
        generator
            .generate(config, &mut rng)
            .and_then(|grid| generator.validate(&grid, config).map(|_| grid))
    };

    match result {
        Ok(grid) => grid,
        Err(e) => {
            warn!("Level generation at depth {} failed ({}), using a fallback room", depth, e);
            let (width, height) = config.clamp_dimensions(width, height);
            utils::fallback_grid(width, height, depth)
        }
    }
}

/// Utility functions for generation algorithms.
pub mod utils {
    use super::*;
    use crate::game::Terrain;
    use crate::utils::is_reachable;
    use crate::GloomError;

    /// Whether `to` can be reached from `from` through floor, doors of any
    /// kind and stairs.
    pub fn connected(grid: &TileGrid, from: Position, to: Position) -> bool {
        is_reachable(from, to, |pos| {
            grid.get(pos).map(Terrain::is_connective).unwrap_or(false)
        })
    }

    /// Carves an L-shaped corridor between two points.
    ///
    /// Existing doors and stairs are left alone; everything else on the path
    /// becomes floor. Border cells are never touched.
    pub fn carve_l_corridor(
        grid: &mut TileGrid,
        start: Position,
        end: Position,
        horizontal_first: bool,
    ) -> GloomResult<Vec<Position>> {
        let corner = if horizontal_first {
            Position::new(end.x, start.y)
        } else {
            Position::new(start.x, end.y)
        };

        let mut carved = Vec::new();
        for (from, to) in [(start, corner), (corner, end)] {
            let min_x = from.x.min(to.x);
            let max_x = from.x.max(to.x);
            let min_y = from.y.min(to.y);
            let max_y = from.y.max(to.y);
            for y in min_y..=max_y {
                for x in min_x..=max_x {
                    let pos = Position::new(x, y);
                    if !grid.in_bounds(pos) || grid.is_border(pos) {
                        continue;
                    }
                    match grid.get(pos) {
                        Some(Terrain::Door(_)) | Some(Terrain::StairsUp) | Some(Terrain::StairsDown) => {}
                        Some(Terrain::Floor) => {}
                        _ => {
                            grid.set(pos, Terrain::Floor)?;
                            carved.push(pos);
                        }
                    }
                }
            }
        }
        Ok(carved)
    }

    /// Checks the invariants every dungeon level must satisfy.
    pub fn validate_level(grid: &TileGrid) -> GloomResult<()> {
        for pos in grid.positions().filter(|&pos| grid.is_border(pos)) {
            if grid.get(pos) != Some(Terrain::Wall) {
                return Err(GloomError::GenerationFailed(format!(
                    "border cell ({}, {}) is not wall",
                    pos.x, pos.y
                )));
            }
        }

        let stairs_down = grid.stairs_down.ok_or_else(|| {
            GloomError::GenerationFailed("level has no stairs down".to_string())
        })?;
        if grid.count(|t| t == Terrain::StairsDown) != 1 {
            return Err(GloomError::GenerationFailed(
                "level must have exactly one stairs down".to_string(),
            ));
        }
        if stairs_down == grid.entry {
            return Err(GloomError::GenerationFailed(
                "stairs down placed on the entry".to_string(),
            ));
        }
        if !connected(grid, grid.entry, stairs_down) {
            return Err(GloomError::GenerationFailed(
                "stairs down unreachable from the entry".to_string(),
            ));
        }
        Ok(())
    }

    /// A single open room with both stairs, used when generation goes wrong.
    pub fn fallback_grid(width: u32, height: u32, depth: u32) -> TileGrid {
        TileGrid::open_room(width, height, depth)
    }

    /// Whether a wall cell separates two open cells on opposite sides.
    pub fn bridges_floor(grid: &TileGrid, pos: Position) -> bool {
        let open = |p: Position| grid.is_walkable(p);
        let west = Position::new(pos.x - 1, pos.y);
        let east = Position::new(pos.x + 1, pos.y);
        let north = Position::new(pos.x, pos.y - 1);
        let south = Position::new(pos.x, pos.y + 1);
        (open(west) && open(east) && !open(north) && !open(south))
            || (open(north) && open(south) && !open(west) && !open(east))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Terrain;
    use std::collections::HashSet;

    #[test]
    fn test_generation_config_creation() {
        let config = GenerationConfig::new();
        assert_eq!(config.min_width, 20);
        assert_eq!(config.max_height, 120);
        assert!(config.min_room_size >= 4);
        assert!(config.max_room_size >= config.min_room_size);
    }

    #[test]
    fn test_config_clamps_dimensions() {
        let config = GenerationConfig::new();
        assert_eq!(config.clamp_dimensions(5, 5), (20, 12));
        assert_eq!(config.clamp_dimensions(1000, 1000), (300, 120));
        assert_eq!(config.clamp_dimensions(80, 40), (80, 40));
    }

    #[test]
    fn test_level_dimensions_grow_with_depth() {
        let config = GenerationConfig::new();
        let (w1, h1) = config.level_dimensions(1);
        let (w5, h5) = config.level_dimensions(5);
        let (w50, h50) = config.level_dimensions(50);
        assert_eq!((w1, h1), (60, 30));
        assert!(w5 > w1 && h5 > h1);
        assert_eq!((w50, h50), (100, 65));
    }

    #[test]
    fn test_secret_door_chance_is_capped() {
        let config = GenerationConfig::new();
        assert!((config.secret_door_chance(0) - 0.05).abs() < 1e-9);
        assert!((config.secret_door_chance(10) - 0.15).abs() < 1e-9);
        assert_eq!(config.secret_door_chance(100), 0.3);
    }

    #[test]
    fn test_config_deserializes_partial_json() {
        let config: GenerationConfig = serde_json::from_str(r#"{ "max_rooms": 3 }"#).unwrap();
        assert_eq!(config.max_rooms, 3);
        assert_eq!(config.door_spacing, 3);
    }

    #[test]
    fn test_room_geometry() {
        let room = Room::new(1, Position::new(5, 5), 10, 8);

        assert_eq!(room.bottom_right(), Position::new(14, 12));
        assert_eq!(room.center(), Position::new(10, 9));
        assert_eq!(room.floor_positions().len(), 48);

        assert!(room.contains(Position::new(7, 7)));
        assert!(room.contains(Position::new(5, 5)));
        assert!(!room.contains(Position::new(15, 12)));

        assert!(room.is_border(Position::new(10, 5)));
        assert!(!room.is_border(Position::new(7, 7)));
        assert!(room.is_corner(Position::new(14, 5)));
        assert!(!room.is_corner(Position::new(10, 5)));
    }

    #[test]
    fn test_room_overlap_with_margin() {
        let room1 = Room::new(1, Position::new(5, 5), 5, 5);
        let touching = Room::new(2, Position::new(10, 5), 5, 5);
        let spaced = Room::new(3, Position::new(11, 5), 5, 5);

        assert!(!room1.overlaps(&touching, 0));
        assert!(room1.overlaps(&touching, 1));
        assert!(!room1.overlaps(&spaced, 1));
    }

    #[test]
    fn test_floor_stays_inside_wall_ring() {
        let room = Room::new(1, Position::new(5, 5), 4, 4);
        let floor: HashSet<_> = room.floor_positions().into_iter().collect();
        assert_eq!(floor.len(), 4);
        assert!(floor.iter().all(|&pos| room.contains(pos) && !room.is_border(pos)));
    }

    #[test]
    fn test_l_corridor_carving() {
        let mut grid = TileGrid::new(20, 20, 1);
        let start = Position::new(5, 5);
        let end = Position::new(15, 15);

        let carved = utils::carve_l_corridor(&mut grid, start, end, true).unwrap();
        assert_eq!(carved.len(), 21);
        assert_eq!(grid.get(start), Some(Terrain::Floor));
        assert_eq!(grid.get(Position::new(15, 5)), Some(Terrain::Floor));
        assert_eq!(grid.get(end), Some(Terrain::Floor));
        assert!(utils::connected(&grid, start, end));
    }

    #[test]
    fn test_fallback_grid_is_valid() {
        let grid = utils::fallback_grid(20, 12, 3);
        assert!(utils::validate_level(&grid).is_ok());
    }

    #[test]
    fn test_fallback_room_layout() {
        let grid = utils::fallback_grid(6, 5, 2);
        assert_eq!(grid.get(Position::new(1, 1)), Some(Terrain::StairsUp));
        assert_eq!(grid.get(Position::new(4, 3)), Some(Terrain::StairsDown));
        assert_eq!(grid.stairs_down, Some(Position::new(4, 3)));
        assert_eq!(grid.count(|t| t == Terrain::Floor), 10);
        assert!(grid
            .positions()
            .filter(|&pos| grid.is_border(pos))
            .all(|pos| grid.get(pos) == Some(Terrain::Wall)));
    }

    #[test]
    fn test_validation_rejects_missing_stairs() {
        let mut grid = utils::fallback_grid(20, 12, 3);
        grid.set(Position::new(18, 10), Terrain::Floor).unwrap();
        grid.stairs_down = None;
        assert!(utils::validate_level(&grid).is_err());
    }

    #[test]
    fn test_depth_zero_is_the_town() {
        let config = GenerationConfig::new();
        let town = generate_level(40, 20, 0, 1, &config);
        let other = generate_level(200, 90, 0, 777, &config);
        assert_eq!(town, other);
        assert_eq!(town.depth, 0);
        assert!(town.stairs_down.is_some());
    }
}
