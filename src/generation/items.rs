//! # Item Generation
//!
//! Scatters loot and gold over the floor of a freshly generated dungeon
//! level. The town starts with nothing on the ground.

use crate::content::{ContentTables, ItemKind};
use crate::game::{GroundItem, GroundPile, ItemStack, Position, Terrain, TileGrid};
use crate::generation::{GenerationConfig, Generator};
use crate::utils::GameRng;
use crate::{GloomError, GloomResult};
use log::debug;

/// Places floor items and gold for one level.
pub struct ItemGenerator<'a> {
    pub grid: &'a TileGrid,
    pub content: &'a ContentTables,
}

impl<'a> ItemGenerator<'a> {
    pub fn new(grid: &'a TileGrid, content: &'a ContentTables) -> Self {
        Self { grid, content }
    }

    fn per_hundred(floor_cells: usize, density: f64, rng: &mut GameRng) -> usize {
        let expected = floor_cells as f64 * density / 100.0;
        (expected * rng.uniform(0.75, 1.25)).round() as usize
    }

    fn roll_gold(&self, rng: &mut GameRng) -> u32 {
        let depth = self.grid.depth.max(1) as i32;
        (rng.range(2, 8) * depth + rng.range(0, 10)) as u32
    }

    /// Consumables sometimes come in small stacks.
    fn roll_quantity(kind: ItemKind, rng: &mut GameRng) -> u32 {
        match kind {
            ItemKind::Potion | ItemKind::Scroll | ItemKind::Flask | ItemKind::Food => {
                rng.range(1, 3) as u32
            }
            _ => 1,
        }
    }
}

impl Generator<Vec<GroundPile>> for ItemGenerator<'_> {
    fn generate(&self, config: &GenerationConfig, rng: &mut GameRng) -> GloomResult<Vec<GroundPile>> {
        let depth = self.grid.depth;
        if depth == 0 {
            return Ok(Vec::new());
        }

        let mut cells: Vec<Position> = self
            .grid
            .find(|t| t == Terrain::Floor)
            .into_iter()
            .filter(|&pos| pos != self.grid.entry)
            .collect();
        let pool = self.content.items_for_depth(depth);
        rng.shuffle(&mut cells);

        let item_count = Self::per_hundred(cells.len(), config.item_density, rng);
        let gold_count = Self::per_hundred(cells.len(), config.gold_density, rng);
        let mut cells = cells.into_iter();
        let mut piles = Vec::new();

        if !pool.is_empty() {
            for _ in 0..item_count {
                let (Some(position), Some(&template)) = (cells.next(), rng.choose(&pool)) else {
                    break;
                };
                let quantity = Self::roll_quantity(template.kind, rng);
                piles.push(GroundPile {
                    position,
                    items: vec![GroundItem::Item(ItemStack::from_template(template, quantity))],
                });
            }
        }

        for _ in 0..gold_count {
            let Some(position) = cells.next() else {
                break;
            };
            piles.push(GroundPile {
                position,
                items: vec![GroundItem::Gold(self.roll_gold(rng))],
            });
        }

        debug!(
            "Placed {} item piles at depth {}",
            piles.len(),
            depth
        );
        Ok(piles)
    }

    fn validate(&self, piles: &Vec<GroundPile>, _config: &GenerationConfig) -> GloomResult<()> {
        for pile in piles {
            if !self.grid.is_walkable(pile.position) {
                return Err(GloomError::GenerationFailed(format!(
                    "item pile inside rock at ({}, {})",
                    pile.position.x, pile.position.y
                )));
            }
            for item in &pile.items {
                if let GroundItem::Item(stack) = item {
                    self.content.item(&stack.item_id)?;
                }
            }
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "ItemGenerator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::generate_level;
    use std::collections::HashSet;

    #[test]
    fn test_items_land_on_distinct_floor_cells() {
        let content = ContentTables::builtin().unwrap();
        let config = GenerationConfig::new();
        let grid = generate_level(80, 40, 2, 11, &config);
        let generator = ItemGenerator::new(&grid, &content);
        let piles = generator.generate(&config, &mut GameRng::new(11)).unwrap();

        assert!(!piles.is_empty());
        assert!(generator.validate(&piles, &config).is_ok());
        let positions: HashSet<Position> = piles.iter().map(|pile| pile.position).collect();
        assert_eq!(positions.len(), piles.len());
        assert!(!positions.contains(&grid.entry));
    }

    #[test]
    fn test_town_floor_starts_empty() {
        let content = ContentTables::builtin().unwrap();
        let config = GenerationConfig::new();
        let town = generate_level(0, 0, 0, 4, &config);
        let piles = ItemGenerator::new(&town, &content)
            .generate(&config, &mut GameRng::new(4))
            .unwrap();
        assert!(piles.is_empty());
    }

    #[test]
    fn test_wands_spawn_charged() {
        let content = ContentTables::builtin().unwrap();
        let config = GenerationConfig {
            item_density: 20.0,
            ..GenerationConfig::new()
        };
        let grid = generate_level(100, 65, 10, 2, &config);
        let piles = ItemGenerator::new(&grid, &content)
            .generate(&config, &mut GameRng::new(2))
            .unwrap();
        for pile in &piles {
            for item in &pile.items {
                if let GroundItem::Item(stack) = item {
                    let template = content.item(&stack.item_id).unwrap();
                    if template.kind.uses_charges() {
                        assert_eq!(stack.charges, template.charges);
                    }
                }
            }
        }
    }
}
