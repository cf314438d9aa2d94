//! # Items and Spells
//!
//! Using items from the pack and casting known spells. Both share the same
//! shape: every check runs first, then the effect is applied, then the cost is
//! paid (a charge, the consumed item, or mana).

use crate::content::{ContentTables, ItemEffect, ItemKind, SpellEffect};
use crate::game::state::{invalid, level_of, level_of_mut, ActionOutcome};
use crate::game::{
    capitalize, fov, EntityId, GameEvent, GameState, MessageImportance, Position, StatusKind,
    Target, Terrain, Visibility,
};
use crate::utils::Dice;
use crate::GloomResult;
use std::collections::BTreeSet;
use std::sync::Arc;

/// How far bolts travel.
pub const BOLT_RANGE: u32 = 20;

/// Turns of confusion after a failed cast.
pub const SPELL_FAILURE_CONFUSION: u32 = 3;

/// Chance in percent that a cast fails, between 5 and 95.
///
/// # Examples
///
/// ```
/// use gloomdeep::spell_failure_chance;
///
/// assert_eq!(spell_failure_chance(22, 3, 1, 1), 13);
/// assert_eq!(spell_failure_chance(22, 3, 40, 1), 5);
/// assert_eq!(spell_failure_chance(90, -4, 1, 1), 95);
/// ```
pub fn spell_failure_chance(base_failure: i32, stat_modifier: i32, level: u32, min_level: u32) -> i32 {
    (base_failure - stat_modifier * 3 - level.saturating_sub(min_level) as i32).clamp(5, 95)
}

impl GameState {
    /// Learns every listed spell the character's class and level allow.
    /// Returns the names of the newly learned spells.
    pub(crate) fn learn_spells(&mut self, spell_ids: &[String]) -> GloomResult<Vec<String>> {
        let content = Arc::clone(&self.content);
        let spells = spell_ids
            .iter()
            .map(|id| content.spell(id))
            .collect::<GloomResult<Vec<_>>>()?;

        let mut learned = Vec::new();
        for spell in spells {
            let eligible = spell
                .classes
                .get(&self.player.class)
                .map(|info| info.min_level <= self.player.level)
                .unwrap_or(false);
            if eligible && self.player.known_spells.insert(spell.id.clone()) {
                learned.push(spell.name.clone());
            }
        }
        Ok(learned)
    }

    pub(crate) fn use_item(
        &mut self,
        slot: usize,
        target: Option<Target>,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<ActionOutcome> {
        let content = Arc::clone(&self.content);
        let stack = self
            .player
            .inventory
            .get(slot)
            .cloned()
            .ok_or_else(|| invalid(format!("No item in slot {}.", slot)))?;
        let template = content.item(&stack.item_id)?;
        let name = stack.describe(&content);

        if template.kind == ItemKind::Light {
            return self.equip(slot, events);
        }
        let effect = template
            .effect
            .clone()
            .ok_or_else(|| invalid(format!("You cannot use {}.", name)))?;
        if template.kind.uses_charges() && stack.charges.unwrap_or(0) == 0 {
            return Err(invalid(format!("{} has no charges left.", capitalize(&name))));
        }

        let victim = match &effect {
            ItemEffect::Bolt { .. } => {
                let target = target.ok_or_else(|| invalid("You need a direction or a target."))?;
                self.bolt_victim(target)?
            }
            _ => None,
        };
        match &effect {
            ItemEffect::Recall => self.recall_allowed()?,
            ItemEffect::Light { .. } if self.player.equipment.light.is_none() => {
                return Err(invalid("You have no light to refuel."));
            }
            ItemEffect::LearnSpells { spells } => self.check_readable(spells, &content)?,
            _ => {}
        }

        match effect {
            ItemEffect::Heal { dice } => self.heal_player(&dice, events),
            ItemEffect::RestoreMana { amount } => {
                self.player.mana = (self.player.mana + amount.max(0)).min(self.player.max_mana);
                events.push(GameEvent::message(
                    "You feel your head clear.",
                    MessageImportance::Info,
                ));
            }
            ItemEffect::ApplyStatus {
                status,
                duration,
                magnitude,
            } => self.affect_player(status, duration, magnitude, events),
            ItemEffect::CureStatus { status } => {
                if self.player.effects.remove(status) {
                    events.push(GameEvent::StatusExpired { kind: status });
                } else {
                    events.push(GameEvent::message(
                        "You feel no different.",
                        MessageImportance::Info,
                    ));
                }
            }
            ItemEffect::Recall => self.toggle_recall(events)?,
            ItemEffect::Light { fuel, .. } => self.refuel_light(fuel, events),
            ItemEffect::LearnSpells { spells } => {
                let learned = self.learn_spells(&spells)?;
                let text = if learned.is_empty() {
                    "You learn nothing new.".to_string()
                } else {
                    format!("You learn {}.", learned.join(", "))
                };
                events.push(GameEvent::message(text, MessageImportance::Info));
            }
            ItemEffect::Bolt { dice } => self.strike(victim, &dice, events)?,
            ItemEffect::Teleport { range } => self.teleport_player(range, events)?,
        }

        if template.kind.uses_charges() {
            if let Some(held) = self.player.inventory.get_mut(slot) {
                held.charges = held.charges.map(|charges| charges.saturating_sub(1));
            }
        } else if template.kind.is_consumable() {
            self.player.take_from_inventory(slot, 1)?;
        }
        Ok(ActionOutcome::default())
    }

    fn check_readable(&self, spells: &[String], content: &ContentTables) -> GloomResult<()> {
        for id in spells {
            if content.spell(id)?.classes.contains_key(&self.player.class) {
                return Ok(());
            }
        }
        Err(invalid("You cannot read that book."))
    }

    pub(crate) fn cast_spell(
        &mut self,
        spell_id: &str,
        target: Option<Target>,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<ActionOutcome> {
        if !self.player.known_spells.contains(spell_id) {
            return Err(invalid("You do not know that spell."));
        }
        let content = Arc::clone(&self.content);
        let spell = content.spell(spell_id)?;
        let info = *spell.classes.get(&self.player.class).ok_or_else(|| {
            invalid(format!("A {} cannot cast {}.", self.player.class, spell.name))
        })?;
        if self.player.level < info.min_level {
            return Err(invalid(format!(
                "You are not experienced enough to cast {}.",
                spell.name
            )));
        }
        if self.player.mana < info.mana {
            return Err(invalid("You do not have enough mana to cast this spell."));
        }

        let victim = match &spell.effect {
            SpellEffect::Bolt { .. } => {
                let target = target.ok_or_else(|| invalid("You need a direction or a target."))?;
                self.bolt_victim(target)?
            }
            _ => None,
        };
        if matches!(spell.effect, SpellEffect::Recall) {
            self.recall_allowed()?;
        }

        let failure = spell_failure_chance(
            info.base_failure,
            self.player.spell_stat_modifier(),
            self.player.level,
            info.min_level,
        );
        self.player.mana -= info.mana;
        if self.rng.percent(failure.max(0) as u32) {
            self.player
                .effects
                .add(StatusKind::Confused, SPELL_FAILURE_CONFUSION, 0);
            events.push(GameEvent::message(
                "You failed to concentrate hard enough!",
                MessageImportance::Warning,
            ));
            return Ok(ActionOutcome::default());
        }

        match &spell.effect {
            SpellEffect::Bolt { dice } => self.strike(victim, dice, events)?,
            SpellEffect::Heal { dice } => self.heal_player(dice, events),
            SpellEffect::ApplyStatus {
                status,
                duration,
                magnitude,
            } => self.affect_player(*status, *duration, *magnitude, events),
            SpellEffect::Recall => self.toggle_recall(events)?,
            SpellEffect::Light { radius, fuel } => {
                self.light_area(*radius, events)?;
                if *fuel > 0 && self.player.equipment.light.is_some() {
                    self.refuel_light(*fuel, events);
                }
            }
            SpellEffect::Teleport { range } => self.teleport_player(*range, events)?,
            SpellEffect::SleepMonsters { radius, duration } => {
                self.sleep_monsters(*radius, *duration, events)?
            }
            SpellEffect::DetectMonsters { radius } => self.detect_monsters(*radius, events)?,
        }

        self.statistics.spells_cast += 1;
        if self.player.cast_spells.insert(spell.id.clone()) {
            for reached in self.player.gain_xp(info.min_level.max(1)) {
                events.push(GameEvent::message(
                    format!("Welcome to level {}.", reached),
                    MessageImportance::Warning,
                ));
            }
        }
        Ok(ActionOutcome::default())
    }

    /// The monster a bolt aimed at `target` would hit, if any.
    ///
    /// A direction follows a straight line until a monster or an opaque cell.
    /// An entity target must be visible and in line of sight.
    fn bolt_victim(&self, target: Target) -> GloomResult<Option<EntityId>> {
        let level = level_of(&self.world)?;
        let origin = self.player.position;
        match target {
            Target::Direction(direction) => {
                let mut pos = origin;
                for _ in 0..BOLT_RANGE {
                    pos = pos.step(direction);
                    if let Some(monster) = level.monster_at(pos) {
                        return Ok(Some(monster.id));
                    }
                    if level.grid.blocks_sight(pos) {
                        break;
                    }
                }
                Ok(None)
            }
            Target::Entity(id) => {
                let monster = level
                    .monster(id)
                    .ok_or_else(|| invalid("That target is not here."))?;
                let clear = level.visibility.is_visible(monster.position)
                    && monster.position.chebyshev_distance(origin) <= BOLT_RANGE
                    && fov::line_of_sight(&level.grid, origin, monster.position);
                if !clear {
                    return Err(invalid("You have no clear shot."));
                }
                Ok(Some(id))
            }
        }
    }

    fn strike(
        &mut self,
        victim: Option<EntityId>,
        dice: &Dice,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<()> {
        match victim {
            Some(id) => {
                let damage = self.rng.roll(dice).max(1);
                let outcome = self.hurt_monster(id, damage, true)?;
                events.extend(outcome);
            }
            None => events.push(GameEvent::message(
                "The bolt hits nothing.",
                MessageImportance::Info,
            )),
        }
        Ok(())
    }

    fn heal_player(&mut self, dice: &Dice, events: &mut Vec<GameEvent>) {
        let amount = self.rng.roll(dice).max(1);
        let text = if self.player.heal(amount) > 0 {
            "You feel better."
        } else {
            "You feel no different."
        };
        events.push(GameEvent::message(text, MessageImportance::Info));
    }

    /// Puts a status effect on the player, announcing it when new.
    pub(crate) fn affect_player(
        &mut self,
        kind: StatusKind,
        duration: u32,
        magnitude: i32,
        events: &mut Vec<GameEvent>,
    ) {
        if self.player.effects.add(kind, duration, magnitude) {
            let importance = if kind.is_harmful() {
                MessageImportance::Warning
            } else {
                MessageImportance::Info
            };
            events.push(GameEvent::message(format!("You are {}!", kind), importance));
        }
    }

    fn refuel_light(&mut self, fuel: u32, events: &mut Vec<GameEvent>) {
        let Some(stack) = self.player.equipment.light.as_mut() else {
            return;
        };
        let total = stack.charges.unwrap_or(0).saturating_add(fuel);
        stack.charges = Some(total);
        self.player.light.fuel = total;
        events.push(GameEvent::message(
            "Your light has been refueled.",
            MessageImportance::Info,
        ));
    }

    /// Marks the cells around the player that a light of `radius` reaches as
    /// explored.
    fn light_area(&mut self, radius: u32, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let origin = self.player.position;
        let level = level_of_mut(&mut self.world)?;
        let r = radius as i32;
        for dy in -r..=r {
            for dx in -r..=r {
                let pos = origin + Position::new(dx, dy);
                if level.grid.in_bounds(pos)
                    && !level.visibility.is_known(pos)
                    && fov::line_of_sight(&level.grid, origin, pos)
                {
                    level.visibility.set(pos, Visibility::Remembered);
                }
            }
        }
        events.push(GameEvent::message(
            "You are surrounded by a white light.",
            MessageImportance::Info,
        ));
        Ok(())
    }

    /// Moves the player to a random free floor cell within `range`, preferring
    /// cells at least half the range away.
    pub(crate) fn teleport_player(
        &mut self,
        range: u32,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<()> {
        let origin = self.player.position;
        let level = level_of(&self.world)?;
        let candidates: Vec<Position> = level
            .grid
            .positions()
            .filter(|&pos| {
                pos != origin
                    && pos.chebyshev_distance(origin) <= range
                    && level.grid.get(pos) == Some(Terrain::Floor)
                    && level.monster_at(pos).is_none()
            })
            .collect();
        let far: Vec<Position> = candidates
            .iter()
            .copied()
            .filter(|pos| pos.chebyshev_distance(origin) * 2 >= range)
            .collect();
        let pool = if far.is_empty() { &candidates } else { &far };

        match self.rng.choose(pool).copied() {
            Some(destination) => {
                self.player.position = destination;
                events.push(GameEvent::message(
                    "You feel yourself yanked sideways!",
                    MessageImportance::Info,
                ));
                self.arrive_on_tile(events)?;
            }
            None => events.push(GameEvent::message(
                "You feel briefly disoriented.",
                MessageImportance::Info,
            )),
        }
        Ok(())
    }

    fn sleep_monsters(
        &mut self,
        radius: u32,
        duration: u32,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<()> {
        let origin = self.player.position;
        let level = level_of_mut(&mut self.world)?;
        let mut sleepers = Vec::new();
        for monster in level
            .monsters
            .iter_mut()
            .filter(|monster| monster.position.chebyshev_distance(origin) <= radius)
        {
            monster.effects.add(StatusKind::Asleep, duration, 0);
            sleepers.push(monster.the_name());
        }

        if sleepers.is_empty() {
            events.push(GameEvent::message(
                "Nothing seems to happen.",
                MessageImportance::Info,
            ));
        }
        for name in sleepers {
            events.push(GameEvent::message(
                format!("{} falls asleep.", capitalize(&name)),
                MessageImportance::Info,
            ));
        }
        Ok(())
    }

    fn detect_monsters(&mut self, radius: u32, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let origin = self.player.position;
        let level = level_of(&self.world)?;
        let sensed: BTreeSet<&str> = level
            .monsters
            .iter()
            .filter(|monster| monster.position.chebyshev_distance(origin) <= radius)
            .map(|monster| monster.name.as_str())
            .collect();
        let text = if sensed.is_empty() {
            "You sense no monsters.".to_string()
        } else {
            format!(
                "You sense the presence of: {}.",
                sensed.into_iter().collect::<Vec<_>>().join(", ")
            )
        };
        events.push(GameEvent::message(text, MessageImportance::Info));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{CharacterClass, Direction, GameConfig, Level, Monster, TileGrid};

    fn game_on(rows: &[&str], at: Position, class: CharacterClass) -> GameState {
        let content = Arc::new(ContentTables::builtin().unwrap());
        let mut game =
            GameState::new_game(11, "Tester", class, content, GameConfig::default()).unwrap();
        let grid = TileGrid::from_rows(1, rows).unwrap();
        game.world.add_level(Level::new(grid));
        game.world.current_depth = 1;
        game.player.depth = 1;
        game.player.deepest_depth = 1;
        game.player.position = at;
        game
    }

    fn place(game: &mut GameState, template: &str, at: Position) -> EntityId {
        let content = Arc::clone(&game.content);
        let mut monster =
            Monster::from_template(content.monster(template).unwrap(), at, &mut game.rng);
        monster.asleep = false;
        let id = monster.id;
        game.world.current_level_mut().unwrap().monsters.push(monster);
        id
    }

    #[test]
    fn test_bolt_stops_at_walls() {
        let mut game = game_on(
            &["#########", "#...#...#", "#########"],
            Position::new(1, 1),
            CharacterClass::Mage,
        );
        place(&mut game, "kobold", Position::new(6, 1));
        let victim = game.bolt_victim(Target::Direction(Direction::East)).unwrap();
        assert_eq!(victim, None);

        let near = place(&mut game, "kobold", Position::new(3, 1));
        let victim = game.bolt_victim(Target::Direction(Direction::East)).unwrap();
        assert_eq!(victim, Some(near));
    }

    #[test]
    fn test_learning_respects_level() {
        let mut game = game_on(&["###", "#.#", "###"], Position::new(1, 1), CharacterClass::Mage);
        game.player.known_spells.clear();
        let learned = game
            .learn_spells(&["magic_missile".to_string(), "sleep".to_string()])
            .unwrap();
        assert_eq!(learned, vec!["Magic Missile".to_string()]);
        assert!(!game.player.known_spells.contains("sleep"));
        assert!(game.learn_spells(&["no_such_spell".to_string()]).is_err());
    }

    #[test]
    fn test_unknown_spell_is_rejected_without_a_turn() {
        let mut game = game_on(&["###", "#.#", "###"], Position::new(1, 1), CharacterClass::Mage);
        let mana = game.player.mana;
        let err = game
            .submit_player_action(crate::game::PlayerAction::CastSpell {
                spell_id: "sleep".into(),
                target: None,
            })
            .unwrap_err();
        assert!(matches!(err, crate::GloomError::InvalidAction(_)));
        assert_eq!(game.player.mana, mana);
        assert_eq!(game.turn, 0);
    }

    #[test]
    fn test_flask_needs_a_light() {
        let mut game = game_on(&["###", "#.#", "###"], Position::new(1, 1), CharacterClass::Warrior);
        game.player.equipment.light = None;
        let slot = game
            .player
            .inventory
            .iter()
            .position(|stack| stack.item_id == "flask_of_oil")
            .unwrap();
        let mut events = Vec::new();
        assert!(game.use_item(slot, None, &mut events).is_err());
        assert!(events.is_empty());
    }

    #[test]
    fn test_sleep_reaches_adjacent_monsters() {
        let mut game = game_on(&["#####", "#...#", "#####"], Position::new(1, 1), CharacterClass::Mage);
        let near = place(&mut game, "kobold", Position::new(2, 1));
        let far = place(&mut game, "kobold", Position::new(3, 1));
        assert_ne!(near, far);
        let mut events = Vec::new();
        game.sleep_monsters(1, 10, &mut events).unwrap();
        let level = game.current_level().unwrap();
        assert!(level.monster(near).unwrap().effects.has(StatusKind::Asleep));
        assert!(!level.monster(far).unwrap().effects.has(StatusKind::Asleep));
    }
}
