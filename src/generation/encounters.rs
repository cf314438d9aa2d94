//! # Encounter Generation
//!
//! Places the monsters of a freshly generated level. Templates come from the
//! content tables filtered by depth; town folk populate depth 0 and hostile
//! monsters everything below it. Pack monsters arrive in small groups that
//! share a pack id.

use crate::content::{ContentTables, MonsterTemplate};
use crate::game::{Behavior, Monster, Position, Terrain, TileGrid};
use crate::generation::{GenerationConfig, Generator};
use crate::utils::GameRng;
use crate::{GloomError, GloomResult};
use log::debug;
use std::collections::HashSet;

/// Monsters never start this close to the level entry.
const ENTRY_CLEARANCE: u32 = 3;

/// Spawns monsters for one level.
pub struct EncounterGenerator<'a> {
    pub grid: &'a TileGrid,
    pub content: &'a ContentTables,
}

impl<'a> EncounterGenerator<'a> {
    pub fn new(grid: &'a TileGrid, content: &'a ContentTables) -> Self {
        Self { grid, content }
    }

    /// Plain floor cells a monster may start on, away from the entry.
    fn spawn_cells(&self) -> Vec<Position> {
        let entry = self.grid.entry;
        self.grid
            .find(|t| t == Terrain::Floor)
            .into_iter()
            .filter(|pos| pos.chebyshev_distance(entry) > ENTRY_CLEARANCE)
            .collect()
    }

    /// Templates eligible at this depth: peaceful folk in town, hostiles below.
    fn template_pool(&self) -> Vec<&'a MonsterTemplate> {
        let depth = self.grid.depth;
        self.content
            .monsters_for_depth(depth)
            .into_iter()
            .filter(|template| if depth == 0 { !template.hostile } else { template.hostile })
            .collect()
    }

    fn encounter_count(&self, config: &GenerationConfig, floor_cells: usize, rng: &mut GameRng) -> u32 {
        if self.grid.depth == 0 {
            let base = config.town_monsters;
            return rng.range(base as i32, (base * 2) as i32) as u32;
        }
        let expected = floor_cells as f64 * config.monster_density / 100.0;
        let jitter = rng.uniform(0.75, 1.25);
        ((expected * jitter).round() as u32).max(1)
    }

    /// Packmates go on free floor next to the leader.
    fn place_pack(
        &self,
        template: &MonsterTemplate,
        leader: &Monster,
        pack_id: u32,
        taken: &mut HashSet<Position>,
        rng: &mut GameRng,
    ) -> Vec<Monster> {
        let extra = rng.range(1, 3);
        let mut around: Vec<Position> = leader
            .position
            .adjacent_positions()
            .into_iter()
            .filter(|pos| self.grid.get(*pos) == Some(Terrain::Floor) && !taken.contains(pos))
            .collect();
        rng.shuffle(&mut around);

        around
            .into_iter()
            .take(extra as usize)
            .map(|pos| {
                taken.insert(pos);
                let mut member = Monster::from_template(template, pos, rng);
                member.pack_id = Some(pack_id);
                member
            })
            .collect()
    }
}

impl Generator<Vec<Monster>> for EncounterGenerator<'_> {
    fn generate(&self, config: &GenerationConfig, rng: &mut GameRng) -> GloomResult<Vec<Monster>> {
        let mut cells = self.spawn_cells();
        let pool = self.template_pool();
        let mut monsters = Vec::new();
        if cells.is_empty() || pool.is_empty() {
            debug!("No encounters possible at depth {}", self.grid.depth);
            return Ok(monsters);
        }

        let count = self.encounter_count(config, cells.len(), rng);
        rng.shuffle(&mut cells);
        let mut taken = HashSet::new();
        let mut next_pack = 0;

        for pos in cells {
            if monsters.len() as u32 >= count {
                break;
            }
            if taken.contains(&pos) {
                continue;
            }
            let Some(&template) = rng.choose(&pool) else {
                break;
            };
            taken.insert(pos);
            let mut leader = Monster::from_template(template, pos, rng);

            if template.behavior == Behavior::Pack {
                leader.pack_id = Some(next_pack);
                let members = self.place_pack(template, &leader, next_pack, &mut taken, rng);
                next_pack += 1;
                monsters.push(leader);
                monsters.extend(members);
            } else {
                monsters.push(leader);
            }
        }

        debug!(
            "Spawned {} monsters at depth {} ({} packs)",
            monsters.len(),
            self.grid.depth,
            next_pack
        );
        Ok(monsters)
    }

    fn validate(&self, monsters: &Vec<Monster>, _config: &GenerationConfig) -> GloomResult<()> {
        let mut seen = HashSet::new();
        for monster in monsters {
            if !self.grid.is_walkable(monster.position) {
                return Err(GloomError::GenerationFailed(format!(
                    "{} placed inside rock",
                    monster.name
                )));
            }
            if !seen.insert(monster.position) {
                return Err(GloomError::GenerationFailed(format!(
                    "two monsters share ({}, {})",
                    monster.position.x, monster.position.y
                )));
            }
        }
        Ok(())
    }

    fn generator_type(&self) -> &'static str {
        "EncounterGenerator"
    }
}
