//! # Dungeon Generation
//!
//! Procedural dungeon layout generation using a room-and-corridor algorithm.
//!
//! The generator works in passes over a grid that starts as solid rock:
//! 1. Place rooms randomly with collision detection
//! 2. Connect consecutive rooms with L-shaped corridors
//! 3. Put doors on the entrances and stairs in the first and farthest rooms
//! 4. Hide a few secret doors, then seed mineral veins and rubble
//! 5. Check that the stairs down can be reached, carving a path if not

use crate::game::{DoorState, Position, Terrain, TileGrid};
use crate::generation::{add_veins, utils, GenerationConfig, Generator, Room};
use crate::utils::GameRng;
use crate::{GloomError, GloomResult};
use log::debug;
use std::collections::{BTreeSet, HashSet};

/// Primary dungeon generator using the room-and-corridor algorithm.
#[derive(Debug, Clone)]
pub struct RoomCorridorGenerator {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

/// Cells carved by the corridor pass.
#[derive(Debug, Default)]
struct CorridorLayout {
    /// Corridor floor outside every room
    corridors: HashSet<Position>,
    /// Wall-ring cells of a room that a corridor broke through
    entrances: HashSet<Position>,
}

impl RoomCorridorGenerator {
    /// Creates a generator for a level of the given size and depth.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{GameRng, GenerationConfig, Generator, RoomCorridorGenerator};
    ///
    /// let generator = RoomCorridorGenerator::new(40, 20, 1);
    /// let grid = generator
    ///     .generate(&GenerationConfig::for_testing(), &mut GameRng::new(5))
    ///     .unwrap();
    /// assert_eq!(grid.width, 40);
    /// ```
    pub fn new(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    /// Places rooms with reject-and-retry, forcing one if nothing fits.
    fn place_rooms(
        &self,
        grid: &mut TileGrid,
        config: &GenerationConfig,
        rng: &mut GameRng,
    ) -> GloomResult<Vec<Room>> {
        let mut rooms: Vec<Room> = Vec::new();
        let budget = config.max_rooms.saturating_mul(config.attempts_per_room);

        for _ in 0..budget {
            if rooms.len() as u32 >= config.max_rooms {
                break;
            }
            if let Some(room) = self.try_place_room(config, rng, rooms.len() as u32, &rooms) {
                self.carve_room(grid, &room)?;
                rooms.push(room);
            }
        }

        if rooms.is_empty() {
            let room = self.forced_room(config);
            debug!("No room fit at depth {}, forcing one at the centre", self.depth);
            self.carve_room(grid, &room)?;
            rooms.push(room);
        }

        Ok(rooms)
    }

    /// Attempts to place a single room.
    fn try_place_room(
        &self,
        config: &GenerationConfig,
        rng: &mut GameRng,
        room_id: u32,
        existing_rooms: &[Room],
    ) -> Option<Room> {
        let max_w = config.max_room_size.min(self.width.saturating_sub(2));
        let max_h = config.max_room_size.min(self.height.saturating_sub(2));
        let min_size = config.min_room_size.max(4);
        if max_w < min_size || max_h < min_size {
            return None;
        }

        let width = rng.range(min_size as i32, max_w as i32) as u32;
        let height = rng.range(min_size as i32, max_h as i32) as u32;
        let x = rng.range(1, self.width as i32 - 1 - width as i32);
        let y = rng.range(1, self.height as i32 - 1 - height as i32);
        let room = Room::new(room_id, Position::new(x, y), width, height);

        if !self.room_fits_in_level(&room) {
            return None;
        }
        if existing_rooms.iter().any(|existing| room.overlaps(existing, 1)) {
            return None;
        }
        Some(room)
    }

    /// The room used when random placement found nothing.
    fn forced_room(&self, config: &GenerationConfig) -> Room {
        let width = config.min_room_size.max(4).min(self.width - 2);
        let height = config.min_room_size.max(4).min(self.height - 2);
        let x = (self.width as i32 - width as i32) / 2;
        let y = (self.height as i32 - height as i32) / 2;
        Room::new(0, Position::new(x.max(1), y.max(1)), width, height)
    }

    /// Checks if a room fits within level boundaries.
    fn room_fits_in_level(&self, room: &Room) -> bool {
        room.top_left.x >= 1
            && room.top_left.y >= 1
            && room.top_left.x + room.width as i32 <= self.width as i32 - 1
            && room.top_left.y + room.height as i32 <= self.height as i32 - 1
    }

    /// Carves out a room by setting its interior to floor.
    fn carve_room(&self, grid: &mut TileGrid, room: &Room) -> GloomResult<()> {
        for pos in room.floor_positions() {
            grid.set(pos, Terrain::Floor)?;
        }
        Ok(())
    }

    /// Connects rooms using L-shaped corridors.
    fn connect_with_l_corridors(
        &self,
        grid: &mut TileGrid,
        rooms: &[Room],
        config: &GenerationConfig,
        rng: &mut GameRng,
    ) -> GloomResult<CorridorLayout> {
        let mut carved = Vec::new();
        if rooms.len() < 2 {
            return Ok(CorridorLayout::default());
        }

        // Connect each room to the next one
        for pair in rooms.windows(2) {
            let horizontal_first = rng.chance(0.5);
            carved.extend(utils::carve_l_corridor(
                grid,
                pair[0].center(),
                pair[1].center(),
                horizontal_first,
            )?);
        }

        // Add some extra connections for variety
        let extra_connections = (rooms.len() as f64 * config.extra_connection_chance).ceil() as usize;
        for _ in 0..extra_connections {
            let a = rng.index(rooms.len());
            let b = rng.index(rooms.len());
            if a != b {
                let horizontal_first = rng.chance(0.5);
                carved.extend(utils::carve_l_corridor(
                    grid,
                    rooms[a].center(),
                    rooms[b].center(),
                    horizontal_first,
                )?);
            }
        }

        let mut layout = CorridorLayout::default();
        for pos in carved {
            if rooms.iter().any(|room| room.is_border(pos)) {
                layout.entrances.insert(pos);
            } else if !rooms.iter().any(|room| room.contains(pos)) {
                layout.corridors.insert(pos);
            }
        }
        Ok(layout)
    }

    /// Puts one door in the middle of every run of entrance cells.
    fn add_doors(
        &self,
        grid: &mut TileGrid,
        rooms: &[Room],
        layout: &CorridorLayout,
        config: &GenerationConfig,
        rng: &mut GameRng,
    ) -> GloomResult<Vec<Position>> {
        let mut doors: Vec<Position> = Vec::new();

        for room in rooms {
            let cells: BTreeSet<Position> = layout
                .entrances
                .iter()
                .copied()
                .filter(|&pos| room.is_border(pos) && !room.is_corner(pos))
                .collect();

            for run in entrance_runs(&cells) {
                let door = run[run.len() / 2];
                if grid.get(door) != Some(Terrain::Floor) {
                    continue;
                }
                if doors
                    .iter()
                    .any(|&other| other.chebyshev_distance(door) < config.door_spacing)
                {
                    continue;
                }
                let state = if rng.chance(config.closed_door_chance) {
                    DoorState::Closed
                } else {
                    DoorState::Open
                };
                grid.set(door, Terrain::Door(state))?;
                doors.push(door);
            }
        }

        Ok(doors)
    }

    /// Adds stairs up in the first room and stairs down in the farthest one.
    fn add_stairs(&self, grid: &mut TileGrid, rooms: &[Room]) -> GloomResult<()> {
        let first_room = rooms
            .first()
            .ok_or_else(|| GloomError::GenerationFailed("no rooms to hold stairs".to_string()))?;
        let entry = first_room.center();
        grid.set(entry, Terrain::StairsUp)?;
        grid.entry = entry;

        let exit = if rooms.len() > 1 {
            rooms[1..]
                .iter()
                .map(|room| room.center())
                .max_by_key(|center| center.manhattan_distance(entry))
        } else {
            first_room
                .floor_positions()
                .into_iter()
                .filter(|&pos| pos != entry)
                .max_by_key(|pos| pos.manhattan_distance(entry))
        }
        .ok_or_else(|| GloomError::GenerationFailed("no room for stairs down".to_string()))?;

        grid.set(exit, Terrain::StairsDown)?;
        grid.stairs_down = Some(exit);
        Ok(())
    }

    /// Hides secret doors in walls that separate two open areas.
    fn add_secret_doors(
        &self,
        grid: &mut TileGrid,
        rooms: &[Room],
        doors: &mut Vec<Position>,
        config: &GenerationConfig,
        rng: &mut GameRng,
    ) -> GloomResult<u32> {
        let chance = config.secret_door_chance(self.depth);
        let limit = (rooms.len() as u32 / 3).max(1);
        let mut candidates: Vec<Position> = grid
            .find(|t| t == Terrain::Wall)
            .into_iter()
            .filter(|&pos| !grid.is_border(pos) && utils::bridges_floor(grid, pos))
            .collect();
        rng.shuffle(&mut candidates);

        let mut placed = 0;
        for pos in candidates {
            if placed >= limit {
                break;
            }
            if doors.iter().any(|&door| door.chebyshev_distance(pos) <= 2) {
                continue;
            }
            if rng.chance(chance) {
                grid.set(pos, Terrain::Door(DoorState::SecretHidden))?;
                doors.push(pos);
                placed += 1;
            }
        }
        Ok(placed)
    }

    /// Turns a few walls along corridors into rubble.
    fn add_rubble(
        &self,
        grid: &mut TileGrid,
        layout: &CorridorLayout,
        config: &GenerationConfig,
        rng: &mut GameRng,
    ) -> GloomResult<u32> {
        let mut walls: Vec<Position> = layout
            .corridors
            .iter()
            .flat_map(|pos| pos.cardinal_adjacent_positions())
            .filter(|&pos| grid.get(pos) == Some(Terrain::Wall) && !grid.is_border(pos))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        walls.sort();

        let mut count = 0;
        for pos in walls {
            if rng.chance(config.rubble_chance) {
                grid.set(pos, Terrain::Rubble)?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Makes sure the stairs down can be reached from the entry.
    fn validate_connectivity(&self, grid: &mut TileGrid) -> GloomResult<()> {
        let exit = grid
            .stairs_down
            .ok_or_else(|| GloomError::GenerationFailed("no stairs down".to_string()))?;
        if !utils::connected(grid, grid.entry, exit) {
            debug!(
                "Stairs down unreachable at depth {}, carving a fallback corridor",
                self.depth
            );
            let entry = grid.entry;
            utils::carve_l_corridor(grid, entry, exit, true)?;
        }
        Ok(())
    }
}

/// Splits wall cells into runs of 4-connected neighbours, each sorted.
fn entrance_runs(cells: &BTreeSet<Position>) -> Vec<Vec<Position>> {
    let mut seen = HashSet::new();
    let mut runs = Vec::new();

    for &start in cells {
        if !seen.insert(start) {
            continue;
        }
        let mut run = vec![start];
        let mut stack = vec![start];
        while let Some(pos) = stack.pop() {
            for next in pos.cardinal_adjacent_positions() {
                if cells.contains(&next) && seen.insert(next) {
                    run.push(next);
                    stack.push(next);
                }
            }
        }
        run.sort();
        runs.push(run);
    }

    runs
}

impl Generator<TileGrid> for RoomCorridorGenerator {
    fn generate(&self, config: &GenerationConfig, rng: &mut GameRng) -> GloomResult<TileGrid> {
        let mut grid = TileGrid::new(self.width, self.height, self.depth);

        let rooms = self.place_rooms(&mut grid, config, rng)?;
        let layout = self.connect_with_l_corridors(&mut grid, &rooms, config, rng)?;
        let mut doors = self.add_doors(&mut grid, &rooms, &layout, config, rng)?;
        self.add_stairs(&mut grid, &rooms)?;
        let secret_doors = self.add_secret_doors(&mut grid, &rooms, &mut doors, config, rng)?;
        let veins = add_veins(&mut grid, self.depth, rng)?;
        let rubble = self.add_rubble(&mut grid, &layout, config, rng)?;
        self.validate_connectivity(&mut grid)?;

        debug!(
            "Generated depth {} ({}x{}): {} rooms, {} doors ({} secret), {} quartz / {} magma veins, {} rubble",
            self.depth,
            self.width,
            self.height,
            rooms.len(),
            doors.len(),
            secret_doors,
            veins.quartz_clusters,
            veins.magma_clusters,
            rubble
        );

        Ok(grid)
    }

    fn validate(&self, grid: &TileGrid, _config: &GenerationConfig) -> GloomResult<()> {
        if grid.width != self.width || grid.height != self.height {
            return Err(GloomError::GenerationFailed(format!(
                "expected a {}x{} grid, got {}x{}",
                self.width, self.height, grid.width, grid.height
            )));
        }
        utils::validate_level(grid)
    }

    fn generator_type(&self) -> &'static str {
        "RoomCorridorGenerator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(width: u32, height: u32, depth: u32, seed: u64) -> TileGrid {
        RoomCorridorGenerator::new(width, height, depth)
            .generate(&GenerationConfig::new(), &mut GameRng::new(seed))
            .unwrap()
    }

    #[test]
    fn test_room_fits_in_level() {
        let generator = RoomCorridorGenerator::new(50, 40, 1);
        let good_room = Room::new(1, Position::new(5, 5), 10, 8);
        let bad_room = Room::new(2, Position::new(45, 35), 10, 8);
        let edge_room = Room::new(3, Position::new(1, 1), 48, 38);

        assert!(generator.room_fits_in_level(&good_room));
        assert!(!generator.room_fits_in_level(&bad_room));
        assert!(generator.room_fits_in_level(&edge_room));
    }

    #[test]
    fn test_generated_level_is_valid() {
        for seed in 0..20 {
            let grid = generate(60, 30, 3, seed);
            let generator = RoomCorridorGenerator::new(60, 30, 3);
            assert!(
                generator.validate(&grid, &GenerationConfig::new()).is_ok(),
                "seed {} produced an invalid level",
                seed
            );
            assert_eq!(grid.count(|t| t == Terrain::StairsUp), 1);
            assert_eq!(grid.get(grid.entry), Some(Terrain::StairsUp));
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(generate(80, 40, 5, 1234), generate(80, 40, 5, 1234));
        assert_ne!(generate(80, 40, 5, 1234), generate(80, 40, 5, 4321));
    }

    #[test]
    fn test_forced_room_on_tiny_map() {
        let config = GenerationConfig {
            min_room_size: 30,
            max_room_size: 30,
            ..GenerationConfig::new()
        };
        let generator = RoomCorridorGenerator::new(20, 12, 1);
        let grid = generator.generate(&config, &mut GameRng::new(9)).unwrap();
        assert!(generator.validate(&grid, &config).is_ok());
        assert_ne!(grid.stairs_down, Some(grid.entry));
    }

    #[test]
    fn test_secret_doors_respect_rules() {
        let config = GenerationConfig {
            secret_door_base: 1.0,
            secret_door_max: 1.0,
            ..GenerationConfig::new()
        };
        for seed in 0..10 {
            let grid = RoomCorridorGenerator::new(100, 65, 10)
                .generate(&config, &mut GameRng::new(seed))
                .unwrap();
            let secrets = grid.find(|t| t == Terrain::Door(DoorState::SecretHidden));
            let doors = grid.find(|t| matches!(t, Terrain::Door(_)));
            assert!(secrets.len() <= 5);
            for secret in &secrets {
                assert!(!grid.is_border(*secret));
                for door in &doors {
                    if door != secret {
                        assert!(door.chebyshev_distance(*secret) > 2);
                    }
                }
            }
        }
    }

    #[test]
    fn test_entrance_runs_split_by_gaps() {
        let cells: BTreeSet<Position> = [
            Position::new(1, 1),
            Position::new(2, 1),
            Position::new(3, 1),
            Position::new(7, 1),
        ]
        .into_iter()
        .collect();
        let runs = entrance_runs(&cells);
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0][runs[0].len() / 2], Position::new(2, 1));
    }

    #[test]
    fn test_fallback_corridor_reconnects() {
        let generator = RoomCorridorGenerator::new(20, 12, 1);
        let mut grid = TileGrid::from_rows(
            1,
            &[
                "####################",
                "#<.......#.........#",
                "#........#........>#",
                "####################",
                "####################",
                "####################",
                "####################",
                "####################",
                "####################",
                "####################",
                "####################",
                "####################",
            ],
        )
        .unwrap();
        assert!(!utils::connected(&grid, grid.entry, Position::new(18, 2)));
        generator.validate_connectivity(&mut grid).unwrap();
        assert!(utils::connected(&grid, grid.entry, Position::new(18, 2)));
    }
}
