//! # Trap Placement
//!
//! Hides traps on the floor of a dungeon level. Deeper levels get more of
//! them and nastier kinds; the town has none.

use crate::game::{Position, Terrain, TileGrid, Trap, TrapKind};
use crate::generation::{GenerationConfig, Generator};
use crate::utils::GameRng;
use crate::{GloomError, GloomResult};
use log::debug;
use std::collections::HashSet;

/// Places hidden traps for one level.
pub struct TrapGenerator<'a> {
    pub grid: &'a TileGrid,
}

impl<'a> TrapGenerator<'a> {
    pub fn new(grid: &'a TileGrid) -> Self {
        Self { grid }
    }

    /// `base_traps` plus one per `depths_per_trap` depths, capped.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{GenerationConfig, TrapGenerator};
    ///
    /// let config = GenerationConfig::new();
    /// assert_eq!(TrapGenerator::trap_count(0, &config), 0);
    /// assert_eq!(TrapGenerator::trap_count(1, &config), 3);
    /// assert_eq!(TrapGenerator::trap_count(10, &config), 5);
    /// assert_eq!(TrapGenerator::trap_count(500, &config), 15);
    /// ```
    pub fn trap_count(depth: u32, config: &GenerationConfig) -> usize {
        if depth == 0 {
            return 0;
        }
        let extra = depth / config.depths_per_trap.max(1);
        config
            .base_traps
            .saturating_add(extra)
            .min(config.max_traps) as usize
    }
}

impl Generator<Vec<Trap>> for TrapGenerator<'_> {
    fn generate(&self, config: &GenerationConfig, rng: &mut GameRng) -> GloomResult<Vec<Trap>> {
        let depth = self.grid.depth;
        let kinds = TrapKind::for_depth(depth);
        let count = Self::trap_count(depth, config);
        if kinds.is_empty() || count == 0 {
            return Ok(Vec::new());
        }

        // never right next to where the player arrives
        let entry = self.grid.entry;
        let mut cells: Vec<Position> = self
            .grid
            .find(|t| t == Terrain::Floor)
            .into_iter()
            .filter(|pos| pos.chebyshev_distance(entry) > 1)
            .collect();
        rng.shuffle(&mut cells);

        let mut traps = Vec::with_capacity(count);
        for position in cells.into_iter().take(count) {
            let Some(&kind) = rng.choose(&kinds) else {
                break;
            };
            traps.push(Trap::hidden(position, kind));
        }
        debug!("Hid {} traps at depth {}", traps.len(), depth);
        Ok(traps)
    }

    fn validate(&self, traps: &Vec<Trap>, config: &GenerationConfig) -> GloomResult<()> {
        if traps.len() > Self::trap_count(self.grid.depth, config) {
            return Err(GloomError::GenerationFailed(format!(
                "{} traps is more than depth {} allows",
                traps.len(),
                self.grid.depth
            )));
        }
        let mut seen = HashSet::new();
        for trap in traps {
            if self.grid.get(trap.position) != Some(Terrain::Floor) || !seen.insert(trap.position)
            {
                return Err(GloomError::GenerationFailed(format!(
                    "misplaced trap at ({}, {})",
                    trap.position.x, trap.position.y
                )));
            }
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "TrapGenerator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::generate_level;

    #[test]
    fn test_traps_are_hidden_on_open_floor() {
        let config = GenerationConfig::new();
        let grid = generate_level(80, 40, 12, 3, &config);
        let generator = TrapGenerator::new(&grid);
        let traps = generator.generate(&config, &mut GameRng::new(3)).unwrap();

        assert_eq!(traps.len(), TrapGenerator::trap_count(12, &config));
        assert!(generator.validate(&traps, &config).is_ok());
        for trap in &traps {
            assert!(!trap.revealed);
            assert!(trap.position.chebyshev_distance(grid.entry) > 1);
            assert!(TrapKind::for_depth(12).contains(&trap.kind));
        }
    }

    #[test]
    fn test_shallow_levels_only_get_darts() {
        let config = GenerationConfig::new();
        let grid = generate_level(60, 30, 1, 8, &config);
        let traps = TrapGenerator::new(&grid)
            .generate(&config, &mut GameRng::new(8))
            .unwrap();
        assert!(traps.iter().all(|trap| trap.kind == TrapKind::Dart));
    }

    #[test]
    fn test_town_has_no_traps() {
        let config = GenerationConfig::new();
        let town = generate_level(0, 0, 0, 2, &config);
        let traps = TrapGenerator::new(&town)
            .generate(&config, &mut GameRng::new(2))
            .unwrap();
        assert!(traps.is_empty());
    }

    #[test]
    fn test_validation_rejects_trap_in_rock() {
        let config = GenerationConfig::new();
        let grid = generate_level(60, 30, 4, 6, &config);
        let traps = vec![Trap::hidden(Position::new(0, 0), TrapKind::Pit)];
        assert!(TrapGenerator::new(&grid).validate(&traps, &config).is_err());
    }
}
