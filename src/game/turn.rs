//! # Turn Engine
//!
//! Everything that happens after the player's action: the monster phases,
//! breeding, effect ticks, light fuel, the recall countdown and the field of
//! view recompute that always closes the turn.

use crate::content::{MonsterTemplate, SpellEffect};
use crate::game::state::{level_of, level_of_mut, ActionOutcome};
use crate::game::{
    capitalize, fov, monster_attack_bonus, monster_spell_cost, player_armor_class, resolve_attack,
    roll_damage, with_article, Arrival, DecideAction, EntityId, GameEvent, GameState, GameStatus,
    MessageImportance, Monster, MonsterIntent, Position, RecallTick, StatusKind, Terrain,
    TurnReport, WorldView, PLAYER_NAME,
};
use crate::utils::Dice;
use crate::GloomResult;
use log::{debug, info};
use std::sync::Arc;

impl GameState {
    /// Runs the rest of the turn after the player's action and builds the
    /// report. Every event text lands in the message log.
    pub(crate) fn finish_turn(
        &mut self,
        mut events: Vec<GameEvent>,
        outcome: ActionOutcome,
        player_acted: bool,
    ) -> GloomResult<TurnReport> {
        self.turn += 1;

        // arriving on a new depth gives the player a free turn
        if !outcome.depth_changed {
            let phases = self.entity_phases(outcome)?;
            for _ in 0..phases {
                self.run_monsters(&mut events)?;
            }
            self.breed_monsters()?;
        }

        self.tick_effects(&mut events)?;
        self.regenerate_mana();
        self.burn_light(&mut events);
        self.advance_recall(&mut events)?;
        self.warn_if_overweight(&mut events)?;
        self.update_fov()?;

        self.record_events(&events);
        Ok(TurnReport {
            turn: self.turn,
            player_acted,
            events,
            status: self.status,
        })
    }

    /// How many times the monsters act this turn.
    ///
    /// Haste skips every other phase and slowness adds one. Moving while
    /// overloaded builds up debt, and each whole unit of it is paid off as an
    /// extra phase.
    fn entity_phases(&mut self, outcome: ActionOutcome) -> GloomResult<u32> {
        let speed = self.player.effects.modifiers().speed;
        let mut phases = if speed > 0 && self.turn % 2 == 1 { 0 } else { 1 };
        if speed < 0 {
            phases += 1;
        }

        if outcome.moved {
            let modifier = self.player.speed_modifier(&self.content)?;
            self.player.encumbrance_debt += modifier - 1.0;
        }
        let owed = self.player.encumbrance_debt.floor();
        if owed >= 1.0 {
            self.player.encumbrance_debt -= owed;
            phases += owed as u32;
        }
        Ok(phases)
    }

    /// One action for every live monster, in spawn order.
    fn run_monsters(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let ids: Vec<EntityId> = level_of(&self.world)?
            .monsters
            .iter()
            .map(|monster| monster.id)
            .collect();
        for id in ids {
            if !self.player.is_alive() {
                break;
            }
            self.monster_turn(id, events)?;
        }
        Ok(())
    }

    fn monster_turn(&mut self, id: EntityId, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let content = Arc::clone(&self.content);
        let level = level_of(&self.world)?;
        // killed earlier in this phase
        let Some(monster) = level.monster(id) else {
            return Ok(());
        };
        let template = content.monster(&monster.template_id)?;

        if monster.asleep {
            let in_range = monster.position.chebyshev_distance(self.player.position)
                <= template.detection_range;
            if in_range && self.rng.chance(self.config.rules.wake_chance) {
                let visible = level.visibility.is_visible(monster.position);
                let name = monster.the_name();
                if let Some(monster) = level_of_mut(&mut self.world)?.monster_mut(id) {
                    monster.asleep = false;
                }
                if visible {
                    events.push(GameEvent::message(
                        format!("{} wakes up.", capitalize(&name)),
                        MessageImportance::Info,
                    ));
                }
            }
            return Ok(());
        }

        if monster.effects.prevents_action()
            || (monster.effects.has(StatusKind::Slowed) && self.turn % 2 == 1)
        {
            return Ok(());
        }
        let actions = if monster.effects.has(StatusKind::Hasted) { 2 } else { 1 };

        for _ in 0..actions {
            if !self.player.is_alive() {
                break;
            }
            let (intent, aware) = {
                let level = level_of(&self.world)?;
                let Some(monster) = level.monster(id) else {
                    return Ok(());
                };
                let view = WorldView {
                    grid: &level.grid,
                    player_position: self.player.position,
                    monsters: &level.monsters,
                    template,
                    content: content.as_ref(),
                    rules: &self.config.rules,
                };
                let intent = monster.behavior.decide_action(monster, &view, &mut self.rng);
                (intent, view.can_see_player(monster))
            };
            if let Some(monster) = level_of_mut(&mut self.world)?.monster_mut(id) {
                monster.aware = aware;
            }
            self.execute_intent(id, template, intent, events)?;
        }
        Ok(())
    }

    fn execute_intent(
        &mut self,
        id: EntityId,
        template: &MonsterTemplate,
        intent: MonsterIntent,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<()> {
        match intent {
            MonsterIntent::Idle => {}
            MonsterIntent::Step(to) => self.step_monster(id, to)?,
            MonsterIntent::MeleeAttack => self.monster_attack(id, &template.damage, None, events)?,
            MonsterIntent::RangedAttack => {
                if let Some(ranged) = &template.ranged {
                    self.monster_attack(id, &ranged.damage, Some(&ranged.name), events)?;
                }
            }
            MonsterIntent::Cast { spell_id } => self.monster_cast(id, &spell_id, events)?,
            MonsterIntent::Flee { step } => {
                let duration = self.config.rules.flee_duration;
                let level = level_of_mut(&mut self.world)?;
                let visible = level
                    .monster(id)
                    .map(|monster| level.visibility.is_visible(monster.position))
                    .unwrap_or(false);
                if let Some(monster) = level.monster_mut(id) {
                    if monster.effects.add(StatusKind::Fleeing, duration, 0) && visible {
                        events.push(GameEvent::message(
                            format!("{} turns to flee!", capitalize(&monster.the_name())),
                            MessageImportance::Info,
                        ));
                    }
                }
                if let Some(to) = step {
                    self.step_monster(id, to)?;
                }
            }
        }
        Ok(())
    }

    fn step_monster(&mut self, id: EntityId, to: Position) -> GloomResult<()> {
        let player = self.player.position;
        let level = level_of_mut(&mut self.world)?;
        if to != player && level.is_free(to) {
            if let Some(monster) = level.monster_mut(id) {
                monster.position = to;
            }
        }
        Ok(())
    }

    /// A melee blow, or a shot when `missile` names what is fired.
    fn monster_attack(
        &mut self,
        id: EntityId,
        dice: &Dice,
        missile: Option<&str>,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<()> {
        let content = Arc::clone(&self.content);
        let level = level_of(&self.world)?;
        let Some(monster) = level.monster(id) else {
            return Ok(());
        };
        let name = monster.the_name();
        let bonus = monster_attack_bonus(monster);
        let armor_class = player_armor_class(&self.player, &content)?;

        if let Some(missile) = missile {
            events.push(GameEvent::message(
                format!("{} fires {}.", capitalize(&name), with_article(missile)),
                MessageImportance::Combat,
            ));
        }
        let roll = resolve_attack(&mut self.rng, bonus, armor_class);
        events.push(GameEvent::Attack {
            attacker: name.clone(),
            defender: PLAYER_NAME.to_string(),
            by_player: false,
            hit: roll.hit,
            critical: roll.critical,
        });
        if roll.hit {
            let damage = roll_damage(&mut self.rng, dice, 0, roll.critical);
            self.hurt_player(damage, &name, events);
        }
        Ok(())
    }

    fn monster_cast(
        &mut self,
        id: EntityId,
        spell_id: &str,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<()> {
        let content = Arc::clone(&self.content);
        let spell = content.spell(spell_id)?;
        let cost = monster_spell_cost(&content, spell_id).unwrap_or(0);
        let name = {
            let Some(monster) = level_of_mut(&mut self.world)?.monster_mut(id) else {
                return Ok(());
            };
            monster.mana -= cost;
            monster.the_name()
        };
        events.push(GameEvent::message(
            format!("{} casts {}.", capitalize(&name), spell.name),
            MessageImportance::Combat,
        ));

        match &spell.effect {
            SpellEffect::Bolt { dice } => {
                let damage = self.rng.roll(dice).max(1);
                self.hurt_player(damage, &name, events);
            }
            SpellEffect::Heal { dice } => {
                let amount = self.rng.roll(dice).max(1);
                if let Some(monster) = level_of_mut(&mut self.world)?.monster_mut(id) {
                    monster.hp = (monster.hp + amount).min(monster.max_hp);
                }
            }
            SpellEffect::ApplyStatus {
                status,
                duration,
                magnitude,
            } => {
                if status.is_harmful() {
                    self.affect_player(*status, *duration, *magnitude, events);
                } else if let Some(monster) = level_of_mut(&mut self.world)?.monster_mut(id) {
                    monster.effects.add(*status, *duration, *magnitude);
                }
            }
            SpellEffect::SleepMonsters { duration, .. } => {
                self.affect_player(StatusKind::Asleep, (duration / 2).max(1), 0, events);
            }
            _ => debug!("{} has no monster form, cast by {}", spell_id, name),
        }
        Ok(())
    }

    /// Damages the player, ending the game at 0 HP. Damage wakes a sleeper.
    pub(crate) fn hurt_player(&mut self, amount: i32, source: &str, events: &mut Vec<GameEvent>) {
        self.player.hp -= amount;
        self.player.effects.remove(StatusKind::Asleep);
        events.push(GameEvent::Damage {
            target: PLAYER_NAME.to_string(),
            amount,
        });
        if !self.player.is_alive() && self.status == GameStatus::Playing {
            self.status = GameStatus::Dead;
            self.statistics.killed_by = Some(source.to_string());
            events.push(GameEvent::message("You die.", MessageImportance::Critical));
            info!(
                "Player killed by {} on turn {} at depth {}",
                source, self.turn, self.world.current_depth
            );
        }
    }

    /// Breeders clone themselves onto an adjacent floor cell until the level
    /// is full.
    fn breed_monsters(&mut self) -> GloomResult<()> {
        let content = Arc::clone(&self.content);
        let limit = self.config.rules.max_population_per_level;
        let player = self.player.position;
        let level = level_of_mut(&mut self.world)?;

        let mut breeders = Vec::new();
        for monster in &level.monsters {
            if content.monster(&monster.template_id)?.breed_chance > 0.0 {
                breeders.push((monster.template_id.clone(), monster.position));
            }
        }

        let mut born = 0;
        for (template_id, origin) in breeders {
            if level.monsters.len() >= limit {
                break;
            }
            let template = content.monster(&template_id)?;
            if !self.rng.chance(template.breed_chance) {
                continue;
            }
            let spots: Vec<Position> = origin
                .adjacent_positions()
                .into_iter()
                .filter(|&pos| {
                    pos != player
                        && level.grid.get(pos) == Some(Terrain::Floor)
                        && level.monster_at(pos).is_none()
                })
                .collect();
            let Some(&spot) = self.rng.choose(&spots) else {
                continue;
            };
            let mut child = Monster::from_template(template, spot, &mut self.rng);
            child.asleep = false;
            level.monsters.push(child);
            born += 1;
        }
        if born > 0 {
            debug!("{} monsters bred on depth {}", born, level.depth());
        }
        Ok(())
    }

    fn tick_effects(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let poison = self
            .player
            .effects
            .get(StatusKind::Poisoned)
            .map(|effect| effect.damage_per_turn());
        if let Some(damage) = poison.filter(|_| self.player.is_alive()) {
            self.hurt_player(damage, "poison", events);
        }
        for kind in self.player.effects.tick() {
            events.push(GameEvent::StatusExpired { kind });
        }

        let poisoned: Vec<(EntityId, i32)> = level_of(&self.world)?
            .monsters
            .iter()
            .filter_map(|monster| {
                let effect = monster.effects.get(StatusKind::Poisoned)?;
                Some((monster.id, effect.damage_per_turn()))
            })
            .collect();
        for (id, damage) in poisoned {
            let outcome = self.hurt_monster(id, damage, false)?;
            events.extend(outcome);
        }
        for monster in &mut level_of_mut(&mut self.world)?.monsters {
            monster.effects.tick();
        }
        Ok(())
    }

    fn regenerate_mana(&mut self) {
        let interval = self.config.rules.mana_regen_interval.max(1);
        if self.turn % interval == 0 && self.player.mana < self.player.max_mana {
            self.player.mana += 1;
        }
    }

    /// Burns one turn of fuel. The stack's charges mirror the fuel so an
    /// unequipped light keeps what it has left.
    fn burn_light(&mut self, events: &mut Vec<GameEvent>) {
        if !self.player.light.is_burning() {
            return;
        }
        let Some(stack) = self.player.equipment.light.as_mut() else {
            return;
        };
        self.player.light.fuel -= 1;
        stack.charges = Some(self.player.light.fuel);
        if self.player.light.fuel == 0 {
            events.push(GameEvent::message(
                "Your light has gone out.",
                MessageImportance::Warning,
            ));
        }
    }

    fn advance_recall(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        if self.is_over() {
            return Ok(());
        }
        match self.player.recall.tick() {
            RecallTick::Idle => {}
            RecallTick::Countdown(left) => {
                let interval = self.config.rules.recall_message_interval.max(1);
                if left % interval == 0 {
                    events.push(GameEvent::message(
                        format!("Recall in {} turns...", left),
                        MessageImportance::Info,
                    ));
                }
            }
            RecallTick::Fire => {
                let (target, text) = if self.world.current_depth > 0 {
                    (0, "You feel yourself yanked upwards!")
                } else {
                    (
                        self.player.deepest_depth.max(1),
                        "You feel yourself yanked downwards!",
                    )
                };
                events.push(GameEvent::message(text, MessageImportance::Warning));
                self.change_depth(target, Arrival::Entry, events)?;
            }
        }
        Ok(())
    }

    fn warn_if_overweight(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let interval = self.config.rules.overweight_warning_interval.max(1);
        if self.turn % interval == 0 && self.player.speed_modifier(&self.content)? > 1.0 {
            events.push(GameEvent::message(
                "You are carrying too much weight.",
                MessageImportance::Warning,
            ));
        }
        Ok(())
    }

    /// Whether the town is in daylight this turn.
    pub fn is_daytime(&self) -> bool {
        let day = self.config.rules.day_length.max(1);
        self.turn % day < day / 2
    }

    /// Sight radius for this turn: 0 when blind, the whole town by day,
    /// otherwise the light source.
    pub fn sight_radius(&self) -> GloomResult<u32> {
        if self.player.effects.has(StatusKind::Blind) {
            return Ok(0);
        }
        if self.world.current_depth == 0 && self.is_daytime() {
            let level = level_of(&self.world)?;
            return Ok(level.grid.width.max(level.grid.height));
        }
        Ok(self.player.light_radius(self.config.rules.unlit_light_radius))
    }

    /// Recomputes the field of view around the player.
    pub fn update_fov(&mut self) -> GloomResult<()> {
        let radius = self.sight_radius()?;
        let origin = self.player.position;
        let level = level_of_mut(&mut self.world)?;
        fov::compute(&level.grid, origin, radius, &mut level.visibility);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentTables;
    use crate::game::{CharacterClass, GameConfig, Level, PlayerAction, TileGrid};
    use crate::utils::GameRng;

    fn quiet_game(rows: &[&str], at: Position) -> GameState {
        let content = Arc::new(ContentTables::builtin().unwrap());
        let mut game =
            GameState::new_game(3, "Tester", CharacterClass::Warrior, content, GameConfig::default())
                .unwrap();
        let grid = TileGrid::from_rows(1, rows).unwrap();
        game.world.add_level(Level::new(grid));
        game.world.current_depth = 1;
        game.player.depth = 1;
        game.player.deepest_depth = 1;
        game.player.position = at;
        game
    }

    #[test]
    fn test_light_goes_out_once() {
        let mut game = quiet_game(&["#####", "#...#", "#####"], Position::new(1, 1));
        game.player.light.fuel = 2;
        game.player.equipment.light.as_mut().unwrap().charges = Some(2);

        let first = game.submit_player_action(PlayerAction::Wait).unwrap();
        assert!(!first.mentions("gone out"));
        let second = game.submit_player_action(PlayerAction::Wait).unwrap();
        assert!(second.mentions("Your light has gone out."));
        let third = game.submit_player_action(PlayerAction::Wait).unwrap();
        assert!(!third.mentions("gone out"));

        assert_eq!(game.player.equipment.light.as_ref().unwrap().charges, Some(0));
        assert_eq!(game.sight_radius().unwrap(), game.config.rules.unlit_light_radius);
    }

    #[test]
    fn test_poison_hurts_and_expires() {
        let mut game = quiet_game(&["#####", "#...#", "#####"], Position::new(1, 1));
        let hp = game.player.hp;
        game.player.effects.add(StatusKind::Poisoned, 2, 0);
        game.submit_player_action(PlayerAction::Wait).unwrap();
        let report = game.submit_player_action(PlayerAction::Wait).unwrap();
        assert_eq!(game.player.hp, hp - 2);
        assert!(report
            .events
            .contains(&GameEvent::StatusExpired { kind: StatusKind::Poisoned }));
    }

    #[test]
    fn test_poison_magnitude_is_damage_per_turn() {
        let mut game = quiet_game(&["#####", "#...#", "#####"], Position::new(1, 1));
        game.player.max_hp = 500;
        game.player.hp = 500;
        game.player.effects.add(StatusKind::Poisoned, 3, 7);
        let report = game.submit_player_action(PlayerAction::Wait).unwrap();
        assert_eq!(game.player.hp, 493);
        assert!(report.events.contains(&GameEvent::Damage {
            target: PLAYER_NAME.to_string(),
            amount: 7
        }));

        let template = game.content.monster("kobold").unwrap().clone();
        let mut kobold =
            Monster::from_template(&template, Position::new(3, 1), &mut GameRng::new(4));
        kobold.asleep = true;
        kobold.hp = 20;
        kobold.effects.add(StatusKind::Poisoned, 3, 4);
        let id = kobold.id;
        game.world.current_level_mut().unwrap().monsters.push(kobold);
        game.config.rules.wake_chance = 0.0;
        game.submit_player_action(PlayerAction::Wait).unwrap();
        assert_eq!(game.current_level().unwrap().monster(id).unwrap().hp, 16);
    }

    #[test]
    fn test_overweight_warning_every_fifty_turns() {
        let mut game = quiet_game(&["#####", "#...#", "#####"], Position::new(1, 1));
        let ration = game.content.item("ration_of_food").unwrap().weight;
        let extra = game.player.capacity() * 2 / ration + 1;
        game.player.inventory[0] = crate::game::ItemStack::new("ration_of_food", extra);
        game.player.max_hp = 500;
        game.player.hp = 500;
        game.turn = 0;

        let mut warned = Vec::new();
        for _ in 0..100 {
            let report = game.submit_player_action(PlayerAction::Wait).unwrap();
            if report.mentions("You are carrying too much weight.") {
                warned.push(report.turn);
            }
        }
        assert_eq!(warned, vec![50, 100]);
    }

    #[test]
    fn test_breeding_stops_at_population_cap() {
        let mut game = quiet_game(&["#######", "#.....#", "#######"], Position::new(1, 1));
        let monsters = include_str!("../../data/monsters.json")
            .replace("\"breed_chance\": 0.02", "\"breed_chance\": 1.0");
        game.content = Arc::new(
            ContentTables::from_json(
                &monsters,
                include_str!("../../data/items.json"),
                include_str!("../../data/spells.json"),
            )
            .unwrap(),
        );
        game.config.rules.max_population_per_level = 3;
        game.player.max_hp = 500;
        game.player.hp = 500;

        let template = game.content.monster("giant_rat").unwrap().clone();
        let mut rat = Monster::from_template(&template, Position::new(5, 1), &mut GameRng::new(1));
        rat.asleep = false;
        game.world.current_level_mut().unwrap().monsters.push(rat);

        for _ in 0..5 {
            game.submit_player_action(PlayerAction::Wait).unwrap();
        }
        let level = game.current_level().unwrap();
        assert_eq!(level.monsters.len(), 3);
        assert!(level
            .monsters
            .iter()
            .all(|monster| level.grid.get(monster.position) == Some(Terrain::Floor)));
    }

    #[test]
    fn test_sleeper_wakes_in_range() {
        let mut game = quiet_game(&["#######", "#.....#", "#######"], Position::new(1, 1));
        let template = game.content.monster("kobold").unwrap().clone();
        let mut kobold =
            Monster::from_template(&template, Position::new(3, 1), &mut GameRng::new(2));
        kobold.asleep = true;
        game.world.current_level_mut().unwrap().monsters.push(kobold);
        game.update_fov().unwrap();

        game.config.rules.wake_chance = 0.0;
        game.submit_player_action(PlayerAction::Wait).unwrap();
        assert!(game.current_level().unwrap().monsters[0].asleep);

        game.config.rules.wake_chance = 1.0;
        let report = game.submit_player_action(PlayerAction::Wait).unwrap();
        assert!(!game.current_level().unwrap().monsters[0].asleep);
        assert!(report.mentions("The kobold wakes up."));
    }

    #[test]
    fn test_haste_skips_odd_phases() {
        let mut game = quiet_game(&["#####", "#...#", "#####"], Position::new(1, 1));
        game.player.effects.add(StatusKind::Hasted, 10, 0);
        game.turn = 1;
        assert_eq!(game.entity_phases(ActionOutcome::default()).unwrap(), 0);
        game.turn = 2;
        assert_eq!(game.entity_phases(ActionOutcome::default()).unwrap(), 1);

        game.player.effects.remove(StatusKind::Hasted);
        game.player.effects.add(StatusKind::Slowed, 10, 0);
        assert_eq!(game.entity_phases(ActionOutcome::default()).unwrap(), 2);
    }

    #[test]
    fn test_encumbrance_debt_adds_phases() {
        let mut game = quiet_game(&["#####", "#...#", "#####"], Position::new(1, 1));
        // twice the capacity in rations
        let ration = game.content.item("ration_of_food").unwrap().weight;
        let extra = game.player.capacity() * 2 / ration + 1;
        game.player.inventory[0] = crate::game::ItemStack::new("ration_of_food", extra);
        assert_eq!(game.player.speed_modifier(&game.content).unwrap(), 2.0);

        let moved = ActionOutcome {
            moved: true,
            depth_changed: false,
        };
        game.turn = 2;
        assert_eq!(game.entity_phases(moved).unwrap(), 2);
    }

    #[test]
    fn test_blindness_and_daylight() {
        let mut game = quiet_game(&["#####", "#...#", "#####"], Position::new(1, 1));
        game.player.effects.add(StatusKind::Blind, 3, 0);
        assert_eq!(game.sight_radius().unwrap(), 0);

        game.player.effects.remove(StatusKind::Blind);
        game.world.current_depth = 0;
        game.turn = 10;
        assert!(game.is_daytime());
        let town = game.world.get_level(0).unwrap();
        let whole = town.grid.width.max(town.grid.height);
        assert_eq!(game.sight_radius().unwrap(), whole);
        game.turn = game.config.rules.day_length / 2 + 1;
        assert_eq!(game.sight_radius().unwrap(), game.player.light_radius(1));
    }
}
