//! # Game State Module
//!
//! The running session and the handlers for every player action.
//!
//! [`GameState`] owns the level cache, the player, the turn counter and the
//! message log, and holds the content tables behind an [`Arc`]. One call to
//! [`GameState::submit_player_action`] resolves a whole turn: the action is
//! checked and applied here, then the turn engine runs the monsters, ticks
//! effects and recomputes the field of view. A handler that rejects an action
//! returns before touching any state, so a failed action costs no turn.

use crate::content::{ContentTables, ItemEffect, ItemTemplate};
use crate::game::{
    capitalize, monster_armor_class, player_attack_bonus, player_damage_dice, resolve_attack,
    roll_damage, Ability, CharacterClass, Direction, DoorState, EntityId, EquipSlot, GameConfig,
    GameEvent, GameStatus, GroundItem, ItemStack, Level, LightSource, MessageImportance,
    MessageLog, Monster, Player, PlayerAction, Position, StatusKind, Target, Terrain, TurnReport,
    World, PLAYER_NAME,
};
use crate::generation::{
    generate_level, EncounterGenerator, Generator, ItemGenerator, TrapGenerator,
};
use crate::utils::GameRng;
use crate::{GloomError, GloomResult};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Gold every new character starts with.
pub const STARTING_GOLD: u32 = 100;

/// Running totals kept across the whole game and written into saves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameStatistics {
    /// Monsters killed by any cause
    pub monsters_killed: u32,
    /// Depths generated so far, the town included
    pub levels_explored: u32,
    pub items_picked_up: u32,
    pub damage_dealt: u64,
    pub damage_taken: u64,
    pub max_depth_reached: u32,
    pub steps_taken: u64,
    pub secrets_found: u32,
    pub traps_disarmed: u32,
    pub spells_cast: u32,
    /// What killed the player
    pub killed_by: Option<String>,
}

impl GameStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one turn event into the totals.
    pub fn record(&mut self, event: &GameEvent) {
        match event {
            GameEvent::PlayerMoved { .. } => self.steps_taken += 1,
            GameEvent::Damage { target, amount } if target == PLAYER_NAME => {
                self.damage_taken += (*amount).max(0) as u64
            }
            GameEvent::Damage { amount, .. } => {
                self.damage_dealt += (*amount).max(0) as u64
            }
            GameEvent::MonsterDied { .. } => self.monsters_killed += 1,
            GameEvent::SecretFound { .. } | GameEvent::TrapFound { .. } => {
                self.secrets_found += 1
            }
            GameEvent::TrapDisarmed { .. } => self.traps_disarmed += 1,
            GameEvent::DepthChanged { to, .. } => {
                self.max_depth_reached = self.max_depth_reached.max(*to)
            }
            _ => {}
        }
    }
}

/// What a resolved action did that the rest of the turn needs to know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ActionOutcome {
    /// The player walked to another cell
    pub moved: bool,
    /// The player arrived on another depth this turn
    pub depth_changed: bool,
}

impl ActionOutcome {
    fn moved() -> Self {
        Self {
            moved: true,
            depth_changed: false,
        }
    }

    pub(crate) fn new_depth() -> Self {
        Self {
            moved: false,
            depth_changed: true,
        }
    }
}

/// Where the player lands after a depth change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrival {
    /// The level's entry point
    Entry,
    /// The level's stairs down, or its entry when it has none
    StairsDown,
}

/// The whole session.
#[derive(Debug, Clone)]
pub struct GameState {
    /// Every depth generated so far
    pub world: World,
    pub player: Player,
    /// Turns elapsed since the game started
    pub turn: u64,
    pub log: MessageLog,
    pub statistics: GameStatistics,
    pub status: GameStatus,
    pub config: GameConfig,
    /// Monster, item and spell templates
    pub content: Arc<ContentTables>,
    pub(crate) rng: GameRng,
}

pub(crate) fn level_of(world: &World) -> GloomResult<&Level> {
    world
        .current_level()
        .ok_or_else(|| missing_level(world.current_depth))
}

pub(crate) fn level_of_mut(world: &mut World) -> GloomResult<&mut Level> {
    let depth = world.current_depth;
    world
        .current_level_mut()
        .ok_or_else(|| missing_level(depth))
}

fn missing_level(depth: u32) -> GloomError {
    GloomError::InvalidState(format!("depth {} is not loaded", depth))
}

pub(crate) fn invalid(text: impl Into<String>) -> GloomError {
    GloomError::InvalidAction(text.into())
}

/// The light a wielded light-source stack gives off.
pub(crate) fn light_source(template: &ItemTemplate, stack: &ItemStack) -> LightSource {
    match &template.effect {
        Some(ItemEffect::Light { radius, .. }) => LightSource {
            radius: *radius,
            fuel: stack.charges.unwrap_or(0),
        },
        _ => LightSource::unlit(),
    }
}

/// Items handed out at character creation. Ids missing from the content
/// tables are skipped.
fn starting_kit(class: CharacterClass) -> Vec<(&'static str, u32)> {
    let mut kit = vec![
        ("wooden_torch", 1),
        ("ration_of_food", 3),
        ("flask_of_oil", 2),
        ("potion_cure_light_wounds", 2),
        ("scroll_word_of_recall", 1),
    ];
    let extras: &[(&'static str, u32)] = match class {
        CharacterClass::Warrior => &[("short_sword", 1), ("soft_leather_armor", 1)],
        CharacterClass::Mage => &[("dagger", 1)],
        CharacterClass::Priest => &[("mace", 1)],
        CharacterClass::Rogue => &[("dagger", 1), ("soft_leather_armor", 1)],
    };
    kit.extend_from_slice(extras);
    if let Some(book) = class.starting_book() {
        kit.push((book, 1));
    }
    kit
}

fn nearest_free_cell(level: &Level, anchor: Position) -> Position {
    if level.is_free(anchor) {
        return anchor;
    }
    let reach = level.grid.width.max(level.grid.height) as i32;
    for radius in 1..=reach {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                if dx.abs().max(dy.abs()) != radius {
                    continue;
                }
                let pos = anchor + Position::new(dx, dy);
                if level.is_free(pos) {
                    return pos;
                }
            }
        }
    }
    anchor
}

fn blocked_message(terrain: Terrain) -> &'static str {
    match terrain {
        Terrain::QuartzVein | Terrain::MagmaVein => "There is a mineral vein in the way.",
        Terrain::Rubble => "There is rubble blocking your way.",
        _ => "There is a wall in the way.",
    }
}

fn terrain_name(terrain: Terrain) -> &'static str {
    match terrain {
        Terrain::QuartzVein => "quartz vein",
        Terrain::MagmaVein => "magma vein",
        Terrain::Rubble => "rubble",
        _ => "granite wall",
    }
}

impl GameState {
    /// Starts a new game with the character standing at the town's entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use gloomdeep::{CharacterClass, ContentTables, GameConfig, GameState};
    ///
    /// let content = Arc::new(ContentTables::builtin().unwrap());
    /// let game =
    ///     GameState::new_game(7, "Aria", CharacterClass::Mage, content, GameConfig::default())
    ///         .unwrap();
    /// assert_eq!(game.world.current_depth, 0);
    /// assert_eq!(game.turn, 0);
    /// assert!(game.player.known_spells.contains("magic_missile"));
    /// ```
    pub fn new_game(
        seed: u64,
        name: &str,
        class: CharacterClass,
        content: Arc<ContentTables>,
        config: GameConfig,
    ) -> GloomResult<Self> {
        let mut state = Self {
            world: World::new(seed),
            player: Player::new(name, class, Position::new(1, 1)),
            turn: 0,
            log: MessageLog::new(config.rules.message_log_capacity),
            statistics: GameStatistics::new(),
            status: GameStatus::Playing,
            rng: GameRng::new(seed),
            config,
            content,
        };

        let town = state.build_level(0)?;
        state.player.position = nearest_free_cell(&town, town.grid.entry);
        state.world.add_level(town);
        state.statistics.levels_explored = 1;

        state.give_starting_kit()?;
        state.update_fov()?;
        state.log.push(
            0,
            format!("Welcome to town, {} the {}.", name, class),
            MessageImportance::Info,
        );
        info!("New game: seed {}, {} the {}", seed, name, class);
        Ok(state)
    }

    fn give_starting_kit(&mut self) -> GloomResult<()> {
        let content = Arc::clone(&self.content);
        for (id, quantity) in starting_kit(self.player.class) {
            let Ok(template) = content.item(id) else {
                debug!("Starting item '{}' is not in the content tables", id);
                continue;
            };
            let stack = ItemStack::from_template(template, quantity);
            match EquipSlot::for_kind(template.kind) {
                Some(slot) if self.player.equipment.get(slot).is_none() => {
                    if slot == EquipSlot::Light {
                        self.player.light = light_source(template, &stack);
                    }
                    *self.player.equipment.slot_mut(slot) = Some(stack);
                }
                _ => self.player.add_to_inventory(stack)?,
            }
            if let Some(ItemEffect::LearnSpells { spells }) = &template.effect {
                self.learn_spells(spells)?;
            }
        }
        self.player.gold = STARTING_GOLD;
        Ok(())
    }

    /// The level the player is on.
    pub fn current_level(&self) -> GloomResult<&Level> {
        level_of(&self.world)
    }

    pub fn is_over(&self) -> bool {
        self.status != GameStatus::Playing
    }

    /// Resolves one full turn for `action`.
    ///
    /// An invalid action returns an error and leaves the state untouched. While
    /// the player is asleep or paralyzed the action is discarded but the turn
    /// still passes, which the report marks with `player_acted == false`.
    pub fn submit_player_action(&mut self, action: PlayerAction) -> GloomResult<TurnReport> {
        if self.is_over() {
            return Err(GloomError::GameOver);
        }

        let mut events = Vec::new();
        let player_acted = !self.player.effects.prevents_action();
        let outcome = if player_acted {
            self.perform(action, &mut events)?
        } else {
            debug!("Player cannot act, discarding {}", action.name());
            events.push(GameEvent::message(
                "You are unable to move.",
                MessageImportance::Warning,
            ));
            ActionOutcome::default()
        };

        self.finish_turn(events, outcome, player_acted)
    }

    fn perform(
        &mut self,
        action: PlayerAction,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<ActionOutcome> {
        match action {
            PlayerAction::Move(direction) => self.move_player(direction, events),
            PlayerAction::Attack(target) => {
                let id = self.melee_target(target)?;
                self.player_attack(id, events)?;
                Ok(ActionOutcome::default())
            }
            PlayerAction::UseItem { slot, target } => self.use_item(slot, target, events),
            PlayerAction::CastSpell { spell_id, target } => {
                self.cast_spell(&spell_id, target, events)
            }
            PlayerAction::Search => self.search(events),
            PlayerAction::OpenDoor(direction) => self.open_door(direction, events),
            PlayerAction::CloseDoor(direction) => self.close_door(direction, events),
            PlayerAction::Rest => self.rest(),
            PlayerAction::Wait => Ok(ActionOutcome::default()),
            PlayerAction::ActivateRecall => {
                self.toggle_recall(events)?;
                Ok(ActionOutcome::default())
            }
            PlayerAction::ChangeDepth => self.take_stairs(events),
            PlayerAction::PickUp => self.pick_up(events),
            PlayerAction::Drop(slot) => self.drop_item(slot, events),
            PlayerAction::Equip(slot) => self.equip(slot, events),
            PlayerAction::Unequip(slot) => self.unequip(slot, events),
            PlayerAction::Dig(direction) => self.dig(direction, events),
            PlayerAction::DisarmTrap(direction) => self.disarm_trap(direction, events),
        }
    }

    fn move_player(
        &mut self,
        direction: Direction,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<ActionOutcome> {
        let confused = self.player.effects.has(StatusKind::Confused);
        let direction = if confused {
            self.rng
                .choose(&Direction::all())
                .copied()
                .unwrap_or(direction)
        } else {
            direction
        };

        let from = self.player.position;
        let target = from.step(direction);
        let level = level_of(&self.world)?;

        if let Some(monster) = level.monster_at(target) {
            if monster.hostile {
                let id = monster.id;
                self.player_attack(id, events)?;
                return Ok(ActionOutcome::default());
            }
            let name = monster.the_name();
            if confused {
                events.push(GameEvent::message(
                    format!("You bump into {}.", name),
                    MessageImportance::Info,
                ));
                return Ok(ActionOutcome::default());
            }
            return Err(invalid(format!("{} is in your way.", capitalize(&name))));
        }

        let terrain = level.grid.get(target).unwrap_or(Terrain::Wall);
        if terrain.is_openable_door() {
            level_of_mut(&mut self.world)?
                .grid
                .set(target, Terrain::Door(DoorState::Open))?;
            events.push(GameEvent::DoorOpened { position: target });
            return Ok(ActionOutcome::default());
        }
        if !terrain.is_walkable() {
            if confused {
                events.push(GameEvent::message(
                    "You stumble into the wall.",
                    MessageImportance::Info,
                ));
                return Ok(ActionOutcome::default());
            }
            return Err(GloomError::Blocked(blocked_message(terrain).to_string()));
        }

        self.player.position = target;
        events.push(GameEvent::PlayerMoved { from, to: target });
        self.arrive_on_tile(events)?;
        self.spring_trap_here(events)?;
        Ok(ActionOutcome::moved())
    }

    /// Picks up gold and reports what else lies on the player's cell.
    pub(crate) fn arrive_on_tile(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let pos = self.player.position;
        let level = level_of_mut(&mut self.world)?;
        let gold = level.take_gold(pos);
        if gold > 0 {
            self.player.gold += gold;
            events.push(GameEvent::message(
                format!("You have found {} gold pieces.", gold),
                MessageImportance::Info,
            ));
        }

        let seen: Vec<String> = level
            .items_at(pos)
            .iter()
            .filter_map(|item| match item {
                GroundItem::Item(stack) => Some(stack.describe(&self.content)),
                GroundItem::Gold(_) => None,
            })
            .collect();
        if !seen.is_empty() {
            events.push(GameEvent::message(
                format!("You see {}.", seen.join(", ")),
                MessageImportance::Info,
            ));
        }
        Ok(())
    }

    fn melee_target(&self, target: Target) -> GloomResult<EntityId> {
        let level = level_of(&self.world)?;
        match target {
            Target::Direction(direction) => level
                .monster_at(self.player.position.step(direction))
                .map(|monster| monster.id)
                .ok_or_else(|| invalid("There is nothing there to attack.")),
            Target::Entity(id) => {
                let monster = level
                    .monster(id)
                    .ok_or_else(|| invalid("That creature is not here."))?;
                if monster.position.chebyshev_distance(self.player.position) > 1 {
                    return Err(invalid(format!(
                        "{} is out of reach.",
                        capitalize(&monster.the_name())
                    )));
                }
                Ok(id)
            }
        }
    }

    /// One melee blow from the player.
    fn player_attack(&mut self, id: EntityId, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let content = Arc::clone(&self.content);
        let level = level_of(&self.world)?;
        let monster = level
            .monster(id)
            .ok_or_else(|| invalid("That creature is not here."))?;
        let visible = level.visibility.is_visible(monster.position);
        let armor_class = monster_armor_class(monster);
        let name = monster.the_name();
        let bonus = player_attack_bonus(&self.player, &content, visible)?;
        let dice = player_damage_dice(&self.player, &content)?;

        let roll = resolve_attack(&mut self.rng, bonus, armor_class);
        events.push(GameEvent::Attack {
            attacker: PLAYER_NAME.to_string(),
            defender: name,
            by_player: true,
            hit: roll.hit,
            critical: roll.critical,
        });
        if roll.hit {
            let damage = roll_damage(
                &mut self.rng,
                &dice,
                self.player.modifier(Ability::Strength),
                roll.critical,
            );
            let outcome = self.hurt_monster(id, damage, true)?;
            events.extend(outcome);
        }
        Ok(())
    }

    /// Applies damage to a monster on the current level and resolves its
    /// death. The template is looked up before anything changes.
    pub(crate) fn hurt_monster(
        &mut self,
        id: EntityId,
        amount: i32,
        by_player: bool,
    ) -> GloomResult<Vec<GameEvent>> {
        let content = Arc::clone(&self.content);
        let level = level_of_mut(&mut self.world)?;
        let index = level
            .monsters
            .iter()
            .position(|monster| monster.id == id)
            .ok_or_else(|| invalid("That creature is not here."))?;
        content.monster(&level.monsters[index].template_id)?;

        let monster = &mut level.monsters[index];
        let died = monster.take_damage(amount);
        let mut events = vec![GameEvent::Damage {
            target: monster.the_name(),
            amount,
        }];
        if died {
            let monster = level.monsters.remove(index);
            events.extend(self.resolve_death(monster, by_player)?);
        }
        Ok(events)
    }

    /// Damages a monster on the current level, logging the outcome.
    ///
    /// Used by spells, wands and tests. Experience goes to the player.
    pub fn damage_monster(&mut self, id: EntityId, amount: i32) -> GloomResult<Vec<GameEvent>> {
        let events = self.hurt_monster(id, amount, true)?;
        self.record_events(&events);
        Ok(events)
    }

    /// Awards experience, rolls the drop table and gold, and leaves the loot on
    /// the death cell. The monster has already been removed.
    fn resolve_death(&mut self, monster: Monster, by_player: bool) -> GloomResult<Vec<GameEvent>> {
        let content = Arc::clone(&self.content);
        let template = content.monster(&monster.template_id)?;
        let name = monster.the_name();
        let mut events = vec![GameEvent::MonsterDied {
            id: monster.id,
            name: name.clone(),
            position: monster.position,
        }];

        if by_player {
            let xp = template.xp.saturating_mul(monster.level.max(1));
            for reached in self.player.gain_xp(xp) {
                events.push(GameEvent::message(
                    format!("Welcome to level {}.", reached),
                    MessageImportance::Warning,
                ));
            }
        }

        let mut dropped = Vec::new();
        let mut loot = Vec::new();
        for entry in &template.drops {
            if self.rng.percent(entry.percent) {
                let item = content.item(&entry.item)?;
                let stack = ItemStack::from_template(item, 1);
                dropped.push(stack.describe(&content));
                loot.push(GroundItem::Item(stack));
            }
        }
        if template.gold_max > 0 && self.rng.chance(template.gold_chance) {
            let roll = self
                .rng
                .range(template.gold_min as i32, template.gold_max as i32)
                .max(0) as u32;
            let amount = monster.level.max(1) * roll;
            if amount > 0 {
                dropped.push(format!("{} gold", amount));
                loot.push(GroundItem::Gold(amount));
            }
        }

        let level = level_of_mut(&mut self.world)?;
        for item in loot {
            level.add_ground_item(monster.position, item);
        }
        events.push(GameEvent::ItemDropped {
            source: name,
            items: dropped,
        });
        debug!(
            "{} died at {:?} on depth {}",
            monster.template_id,
            monster.position,
            self.world.current_depth
        );
        Ok(events)
    }

    fn search(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<ActionOutcome> {
        let origin = self.player.position;
        let far_chance = self.config.rules.search_far_chance;
        let level = level_of_mut(&mut self.world)?;

        let mut found = Vec::new();
        for dy in -2..=2 {
            for dx in -2..=2 {
                let pos = origin + Position::new(dx, dy);
                let secret_door =
                    level.grid.get(pos) == Some(Terrain::Door(DoorState::SecretHidden));
                let hidden_trap = level.trap_at(pos).filter(|trap| !trap.revealed).is_some();
                if !secret_door && !hidden_trap {
                    continue;
                }
                let adjacent = pos.chebyshev_distance(origin) <= 1;
                if !adjacent && !self.rng.chance(far_chance) {
                    continue;
                }
                if secret_door {
                    level.grid.set(pos, Terrain::Door(DoorState::SecretFound))?;
                    found.push(GameEvent::SecretFound { position: pos });
                }
                if let Some(trap) = level.trap_at_mut(pos).filter(|trap| !trap.revealed) {
                    trap.revealed = true;
                    found.push(GameEvent::TrapFound {
                        position: pos,
                        kind: trap.kind,
                    });
                }
            }
        }

        if found.is_empty() {
            events.push(GameEvent::message("You find nothing.", MessageImportance::Info));
        }
        events.extend(found);
        Ok(ActionOutcome::default())
    }

    fn open_door(
        &mut self,
        direction: Direction,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<ActionOutcome> {
        let target = self.player.position.step(direction);
        let level = level_of_mut(&mut self.world)?;
        match level.grid.get(target) {
            Some(terrain) if terrain.is_openable_door() => {
                level.grid.set(target, Terrain::Door(DoorState::Open))?;
                events.push(GameEvent::DoorOpened { position: target });
                Ok(ActionOutcome::default())
            }
            _ => Err(invalid("There is no closed door there.")),
        }
    }

    fn close_door(
        &mut self,
        direction: Direction,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<ActionOutcome> {
        let target = self.player.position.step(direction);
        let level = level_of_mut(&mut self.world)?;
        if level.grid.get(target) != Some(Terrain::Door(DoorState::Open)) {
            return Err(invalid("There is no open door there."));
        }
        if level.monster_at(target).is_some() {
            return Err(invalid("Something is in the way."));
        }
        if !level.items_at(target).is_empty() {
            return Err(invalid("There is an item in the doorway."));
        }
        level.grid.set(target, Terrain::Door(DoorState::Closed))?;
        events.push(GameEvent::DoorClosed { position: target });
        Ok(ActionOutcome::default())
    }

    fn rest(&mut self) -> GloomResult<ActionOutcome> {
        let level = level_of(&self.world)?;
        let threatened = level.monsters.iter().any(|monster| {
            monster.hostile && !monster.asleep && level.visibility.is_visible(monster.position)
        });
        if threatened {
            return Err(invalid("You cannot rest with enemies nearby."));
        }
        let bonus = self.player.modifier(Ability::Constitution).max(0);
        self.player.heal(1 + bonus);
        Ok(ActionOutcome::default())
    }

    /// Checks that a recall could be started from here.
    pub(crate) fn recall_allowed(&self) -> GloomResult<()> {
        if !self.player.recall.is_active()
            && self.world.current_depth == 0
            && self.player.deepest_depth == 0
        {
            return Err(invalid("You have not yet been into the dungeon."));
        }
        Ok(())
    }

    /// Starts a recall countdown, or cancels the pending one.
    pub(crate) fn toggle_recall(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        self.recall_allowed()?;
        if self.player.recall.is_active() {
            self.player.recall.cancel();
            events.push(GameEvent::message(
                "A tension leaves the air around you.",
                MessageImportance::Info,
            ));
        } else {
            self.player.recall.activate(self.config.rules.recall_turns);
            events.push(GameEvent::message(
                "The air about you becomes charged...",
                MessageImportance::Warning,
            ));
        }
        Ok(())
    }

    fn take_stairs(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<ActionOutcome> {
        let depth = self.world.current_depth;
        let terrain = level_of(&self.world)?.grid.get(self.player.position);
        match terrain {
            Some(Terrain::StairsDown) => self.change_depth(depth + 1, Arrival::Entry, events)?,
            Some(Terrain::StairsUp) if depth > 0 => {
                self.change_depth(depth - 1, Arrival::StairsDown, events)?
            }
            _ => return Err(invalid("There are no stairs here.")),
        }
        Ok(ActionOutcome::new_depth())
    }

    /// Moves the player to another depth, generating it on the first visit.
    pub(crate) fn change_depth(
        &mut self,
        target: u32,
        arrival: Arrival,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<()> {
        let from = self.world.current_depth;
        if !self.world.has_level(target) {
            let level = self.build_level(target)?;
            self.world.add_level(level);
            self.statistics.levels_explored += 1;
        }

        let level = self
            .world
            .get_level(target)
            .ok_or_else(|| missing_level(target))?;
        let anchor = match arrival {
            Arrival::Entry => level.grid.entry,
            Arrival::StairsDown => level.grid.stairs_down.unwrap_or(level.grid.entry),
        };
        let position = nearest_free_cell(level, anchor);

        self.world.current_depth = target;
        self.player.position = position;
        self.player.depth = target;
        self.player.deepest_depth = self.player.deepest_depth.max(target);
        events.push(GameEvent::DepthChanged { from, to: target });
        info!("Player moved from depth {} to depth {}", from, target);
        Ok(())
    }

    /// Generates the terrain, monsters and loot for a depth.
    pub(crate) fn build_level(&self, depth: u32) -> GloomResult<Level> {
        let generation = &self.config.generation;
        let (width, height) = generation.level_dimensions(depth);
        let seed = self.world.level_seed(depth);
        let grid = generate_level(width, height, depth, seed, generation);

        let mut rng = GameRng::new(seed.wrapping_add(1));
        let encounters = EncounterGenerator::new(&grid, &self.content);
        let monsters = encounters.generate(generation, &mut rng)?;
        encounters.validate(&monsters, generation)?;
        let loot = ItemGenerator::new(&grid, &self.content);
        let ground = loot.generate(generation, &mut rng)?;
        loot.validate(&ground, generation)?;
        let trapper = TrapGenerator::new(&grid);
        let traps = trapper.generate(generation, &mut rng)?;
        trapper.validate(&traps, generation)?;

        debug!(
            "Built depth {}: {}x{}, {} monsters, {} ground piles, {} traps",
            depth,
            grid.width,
            grid.height,
            monsters.len(),
            ground.len(),
            traps.len()
        );
        let mut level = Level::new(grid);
        level.monsters = monsters;
        level.ground = ground;
        level.traps = traps;
        Ok(level)
    }

    fn pick_up(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<ActionOutcome> {
        let content = Arc::clone(&self.content);
        let pos = self.player.position;
        let stack = level_of(&self.world)?
            .items_at(pos)
            .iter()
            .find_map(|item| match item {
                GroundItem::Item(stack) => Some(stack.clone()),
                GroundItem::Gold(_) => None,
            })
            .ok_or_else(|| invalid("There is nothing here to pick up."))?;
        let template = content.item(&stack.item_id)?;

        if !self.player.has_room_for(&stack) {
            return Err(invalid("You cannot carry that many items."));
        }
        let weight = self
            .player
            .carried_weight(&content)?
            .saturating_add(template.weight.saturating_mul(stack.quantity));
        if weight > self.player.capacity().saturating_mul(2) {
            return Err(invalid("That is too heavy for you to carry."));
        }

        let stack = level_of_mut(&mut self.world)?
            .take_first_item(pos)
            .ok_or_else(|| invalid("There is nothing here to pick up."))?;
        let description = stack.describe(&content);
        self.player.add_to_inventory(stack)?;
        self.statistics.items_picked_up += 1;
        events.push(GameEvent::message(
            format!("You have {}.", description),
            MessageImportance::Info,
        ));
        if weight > self.player.capacity() {
            events.push(GameEvent::message(
                "You are slowed by the weight of your pack.",
                MessageImportance::Warning,
            ));
        }
        Ok(ActionOutcome::default())
    }

    fn drop_item(&mut self, slot: usize, events: &mut Vec<GameEvent>) -> GloomResult<ActionOutcome> {
        let quantity = self
            .player
            .inventory
            .get(slot)
            .map(|stack| stack.quantity)
            .ok_or_else(|| invalid(format!("No item in slot {}.", slot)))?;
        level_of(&self.world)?;

        let stack = self.player.take_from_inventory(slot, quantity)?;
        let description = stack.describe(&self.content);
        let pos = self.player.position;
        level_of_mut(&mut self.world)?.add_ground_item(pos, GroundItem::Item(stack));
        events.push(GameEvent::message(
            format!("You drop {}.", description),
            MessageImportance::Info,
        ));
        Ok(ActionOutcome::default())
    }

    pub(crate) fn equip(
        &mut self,
        slot: usize,
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
        let equip_slot = EquipSlot::for_kind(template.kind)
            .ok_or_else(|| invalid(format!("You cannot equip {}.", stack.describe(&content))))?;

        // the swapped-out item needs a free stack once the slot is not emptied
        if let Some(previous) = self.player.equipment.get(equip_slot) {
            if stack.quantity > 1 && !self.player.has_room_for(previous) {
                return Err(invalid("You have no room in your pack for what you are using."));
            }
        }

        let item = self.player.take_from_inventory(slot, 1)?;
        let description = item.describe(&content);
        if equip_slot == EquipSlot::Light {
            self.player.light = light_source(template, &item);
        }
        let previous = self.player.equipment.slot_mut(equip_slot).replace(item);
        if let Some(previous) = previous {
            events.push(GameEvent::message(
                format!("You were using {}.", previous.describe(&content)),
                MessageImportance::Info,
            ));
            self.player.add_to_inventory(previous)?;
        }

        let text = match equip_slot {
            EquipSlot::Weapon => format!("You are wielding {}.", description),
            EquipSlot::Armor => format!("You are wearing {}.", description),
            EquipSlot::Light => format!("Your light source is {}.", description),
        };
        events.push(GameEvent::message(text, MessageImportance::Info));
        Ok(ActionOutcome::default())
    }

    fn unequip(
        &mut self,
        slot: EquipSlot,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<ActionOutcome> {
        let item = self
            .player
            .equipment
            .get(slot)
            .cloned()
            .ok_or_else(|| invalid("You are not using anything there."))?;
        if !self.player.has_room_for(&item) {
            return Err(invalid("You cannot carry that many items."));
        }

        *self.player.equipment.slot_mut(slot) = None;
        if slot == EquipSlot::Light {
            self.player.light = LightSource::unlit();
        }
        events.push(GameEvent::message(
            format!("You take off {}.", item.describe(&self.content)),
            MessageImportance::Info,
        ));
        self.player.add_to_inventory(item)?;
        Ok(ActionOutcome::default())
    }

    fn dig(&mut self, direction: Direction, events: &mut Vec<GameEvent>) -> GloomResult<ActionOutcome> {
        let content = Arc::clone(&self.content);
        let target = self.player.position.step(direction);
        let level = level_of(&self.world)?;
        let terrain = level
            .grid
            .get(target)
            .ok_or_else(|| invalid("You cannot dig there."))?;
        let hardness = terrain
            .hardness()
            .ok_or_else(|| invalid("There is nothing there to dig through."))?;
        if level.grid.is_border(target) {
            return Err(invalid("This seems to be permanent rock."));
        }

        let tool_bonus = match &self.player.equipment.weapon {
            Some(stack) => content.item(&stack.item_id)?.dig_bonus,
            None => 0,
        };
        let bonus = if tool_bonus > 0 { tool_bonus } else { 1 };
        let per_turn = (bonus - hardness as i32 / 2).max(1) as u32;
        let depth = self.world.current_depth;
        let gold_chance = self.config.rules.dig_gold_chance;

        let level = level_of_mut(&mut self.world)?;
        let key = Level::dig_key(target);
        let progress = level.dig_progress.entry(key.clone()).or_insert(0);
        *progress += per_turn;
        if *progress < hardness * 2 {
            events.push(GameEvent::message(
                format!("You dig into the {}.", terrain_name(terrain)),
                MessageImportance::Info,
            ));
            return Ok(ActionOutcome::default());
        }

        level.dig_progress.remove(&key);
        level.grid.set(target, Terrain::Floor)?;
        let text = if terrain == Terrain::Rubble {
            "You have removed the rubble."
        } else {
            "You have finished the tunnel."
        };
        events.push(GameEvent::message(text, MessageImportance::Info));

        let multiplier = match terrain {
            Terrain::QuartzVein => 2,
            Terrain::MagmaVein => 3,
            _ => 0,
        };
        if multiplier > 0 && self.rng.chance(gold_chance) {
            let amount = (self.rng.range(1, 10) as u32 + depth * 2) * multiplier;
            level.add_ground_item(target, GroundItem::Gold(amount));
            events.push(GameEvent::message(
                "You have found something!",
                MessageImportance::Info,
            ));
        }
        Ok(ActionOutcome::default())
    }

    /// Appends event texts to the message log and updates the statistics.
    pub(crate) fn record_events(&mut self, events: &[GameEvent]) {
        for event in events {
            self.statistics.record(event);
            if let Some(text) = event.text() {
                self.log.push(self.turn, text, event.importance());
            }
        }
    }
}
