//! The town at depth 0: a fixed, hand-drawn layout.

use crate::game::{Position, Terrain, TileGrid};
use crate::generation::{utils, GenerationConfig, Generator};
use crate::utils::GameRng;
use crate::{GloomError, GloomResult};
use log::debug;

/// Town map in save glyphs. Buildings are solid blocks with a closed door;
/// the dungeon entrance sits in the middle of the square.
const TOWN_LAYOUT: [&str; 22] = [
    "##################################################################",
    "#................................................................#",
    "#...#######.........#######..........#######.........#######.....#",
    "#...#######.........#######..........#######.........#######.....#",
    "#...#######.........#######..........#######.........#######.....#",
    "#...###+###.........###+###..........###+###.........###+###.....#",
    "#................................................................#",
    "#................................................................#",
    "#.........................................................:......#",
    "#................................................................#",
    "#...............................>................................#",
    "#................................................................#",
    "#.....:..........................................................#",
    "#................................................................#",
    "#................................................................#",
    "#...###+###.........###+###..........###+###.........###+###.....#",
    "#...#######.........#######..........#######.........#######.....#",
    "#...#######.........#######..........#######.........#######.....#",
    "#...#######.........#######..........#######.........#######.....#",
    "#................................................................#",
    "#................................................................#",
    "##################################################################",
];

/// Where a new character starts, on the road south of the entrance.
const TOWN_ENTRY: Position = Position { x: 32, y: 13 };

/// Builds the town. The layout never varies with the seed.
#[derive(Debug, Clone, Default)]
pub struct TownGenerator;

impl TownGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator<TileGrid> for TownGenerator {
    fn generate(&self, _config: &GenerationConfig, _rng: &mut GameRng) -> GloomResult<TileGrid> {
        let mut grid = TileGrid::from_rows(0, &TOWN_LAYOUT)
            .map_err(|e| GloomError::GenerationFailed(format!("town layout: {}", e)))?;
        grid.entry = TOWN_ENTRY;
        debug!("Built the town ({}x{})", grid.width, grid.height);
        Ok(grid)
    }

    fn validate(&self, grid: &TileGrid, _config: &GenerationConfig) -> GloomResult<()> {
        if grid.get(grid.entry) != Some(Terrain::Floor) {
            return Err(GloomError::GenerationFailed(
                "town entry is not on the road".to_string(),
            ));
        }
        utils::validate_level(grid)
    }

    fn generator_type(&self) -> &'static str {
        "TownGenerator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_town_layout_is_valid() {
        let generator = TownGenerator::new();
        let config = GenerationConfig::new();
        let town = generator.generate(&config, &mut GameRng::new(0)).unwrap();
        assert!(generator.validate(&town, &config).is_ok());
        assert_eq!(town.depth, 0);
        assert_eq!(town.count(|t| t == Terrain::StairsUp), 0);
        assert_eq!(town.stairs_down, Some(Position::new(32, 10)));
    }

    #[test]
    fn test_layout_rows_have_equal_width() {
        let width = TOWN_LAYOUT[0].len();
        assert!(TOWN_LAYOUT.iter().all(|row| row.len() == width));
    }
}
