//! # Traps
//!
//! Hidden floor traps. A trap is invisible until a search turns it up, fires
//! when the player walks onto it and is used up by firing. A revealed trap
//! can be disarmed from an adjacent cell.

use crate::game::state::{invalid, level_of, level_of_mut, ActionOutcome};
use crate::game::{
    Ability, CharacterClass, Direction, GameEvent, GameState, MessageImportance, Monster,
    Position, StatusKind, Terrain,
};
use crate::utils::Dice;
use crate::GloomResult;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Every kind of trap the generator can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrapKind {
    Dart,
    Pit,
    Alarm,
    PoisonNeedle,
    PoisonGas,
    Teleport,
    SpikedPit,
    SummonMonster,
    Paralysis,
    MagicDrain,
    Explosion,
}

impl TrapKind {
    pub const ALL: [TrapKind; 11] = [
        TrapKind::Dart,
        TrapKind::Pit,
        TrapKind::Alarm,
        TrapKind::PoisonNeedle,
        TrapKind::PoisonGas,
        TrapKind::Teleport,
        TrapKind::SpikedPit,
        TrapKind::SummonMonster,
        TrapKind::Paralysis,
        TrapKind::MagicDrain,
        TrapKind::Explosion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TrapKind::Dart => "dart trap",
            TrapKind::Pit => "pit trap",
            TrapKind::Alarm => "alarm trap",
            TrapKind::PoisonNeedle => "poison needle trap",
            TrapKind::PoisonGas => "poison gas trap",
            TrapKind::Teleport => "teleportation trap",
            TrapKind::SpikedPit => "spiked pit trap",
            TrapKind::SummonMonster => "summoning trap",
            TrapKind::Paralysis => "paralysis trap",
            TrapKind::MagicDrain => "mana drain trap",
            TrapKind::Explosion => "explosive trap",
        }
    }

    /// How hard the trap is to disarm.
    pub fn difficulty(self) -> i32 {
        match self {
            TrapKind::Alarm => 4,
            TrapKind::Dart => 5,
            TrapKind::Pit => 6,
            TrapKind::Teleport => 7,
            TrapKind::PoisonNeedle => 8,
            TrapKind::SpikedPit => 9,
            TrapKind::PoisonGas => 10,
            TrapKind::MagicDrain => 11,
            TrapKind::SummonMonster => 12,
            TrapKind::Paralysis => 13,
            TrapKind::Explosion => 14,
        }
    }

    /// Shallowest and deepest depth the trap appears on.
    pub fn depth_range(self) -> (u32, u32) {
        match self {
            TrapKind::Dart => (1, 20),
            TrapKind::Pit => (2, 25),
            TrapKind::Alarm => (3, 99),
            TrapKind::PoisonNeedle => (3, 30),
            TrapKind::PoisonGas => (5, 40),
            TrapKind::Teleport => (5, 99),
            TrapKind::SpikedPit => (8, 35),
            TrapKind::SummonMonster => (10, 99),
            TrapKind::Paralysis => (10, 45),
            TrapKind::MagicDrain => (12, 50),
            TrapKind::Explosion => (15, 99),
        }
    }

    /// Kinds that may be placed at `depth`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::TrapKind;
    ///
    /// assert_eq!(TrapKind::for_depth(1), vec![TrapKind::Dart]);
    /// assert!(TrapKind::for_depth(0).is_empty());
    /// assert!(TrapKind::for_depth(20).contains(&TrapKind::Explosion));
    /// ```
    pub fn for_depth(depth: u32) -> Vec<TrapKind> {
        Self::ALL
            .into_iter()
            .filter(|kind| {
                let (min, max) = kind.depth_range();
                (min..=max).contains(&depth)
            })
            .collect()
    }

    /// Damage dealt to whoever sets the trap off.
    fn damage(self) -> Option<Dice> {
        match self {
            TrapKind::Dart => Some(Dice::new(1, 4, 0)),
            TrapKind::Pit | TrapKind::PoisonGas => Some(Dice::new(2, 4, 0)),
            TrapKind::PoisonNeedle => Some(Dice::new(1, 6, 0)),
            TrapKind::SpikedPit | TrapKind::Explosion => Some(Dice::new(1, 11, 4)),
            _ => None,
        }
    }

    fn trigger_text(self) -> &'static str {
        match self {
            TrapKind::Dart => "A dart shoots out and hits you!",
            TrapKind::Pit => "You fall into a pit!",
            TrapKind::Alarm => "An alarm sounds! Monsters are alerted!",
            TrapKind::PoisonNeedle => "A poison needle pricks you!",
            TrapKind::PoisonGas => "Poison gas fills the air!",
            TrapKind::Teleport => "You are teleported!",
            TrapKind::SpikedPit => "You fall into a spiked pit!",
            TrapKind::SummonMonster => "The trap summons monsters!",
            TrapKind::Paralysis => "A cloud of spores surrounds you!",
            TrapKind::MagicDrain => "Your mana is drained!",
            TrapKind::Explosion => "The trap explodes!",
        }
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One trap on a level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trap {
    pub position: Position,
    pub kind: TrapKind,
    /// Found by searching; hidden traps draw as plain floor
    #[serde(default)]
    pub revealed: bool,
}

impl Trap {
    pub fn hidden(position: Position, kind: TrapKind) -> Self {
        Self {
            position,
            kind,
            revealed: false,
        }
    }
}

/// Percent chance to disarm a trap: 50 plus 5 per point of skill over the
/// trap's difficulty, kept within 10 to 90. Skill is DEX, plus 5 for rogues.
///
/// # Examples
///
/// ```
/// use gloomdeep::{disarm_chance, CharacterClass, TrapKind};
///
/// assert_eq!(disarm_chance(10, CharacterClass::Warrior, TrapKind::Dart), 75);
/// assert_eq!(disarm_chance(10, CharacterClass::Rogue, TrapKind::Dart), 90);
/// assert_eq!(disarm_chance(3, CharacterClass::Mage, TrapKind::Explosion), 10);
/// ```
pub fn disarm_chance(dexterity: i32, class: CharacterClass, kind: TrapKind) -> i32 {
    let skill = dexterity + if class == CharacterClass::Rogue { 5 } else { 0 };
    (50 + (skill - kind.difficulty()) * 5).clamp(10, 90)
}

impl GameState {
    /// Fires the trap under the player, if any. The trap is used up.
    pub(crate) fn spring_trap_here(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let pos = self.player.position;
        let Some(trap) = level_of_mut(&mut self.world)?.remove_trap(pos) else {
            return Ok(());
        };
        events.push(GameEvent::TrapTriggered {
            position: pos,
            kind: trap.kind,
        });
        self.trap_effect(trap.kind, events)
    }

    fn trap_effect(&mut self, kind: TrapKind, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        debug!("{} fired at depth {}", kind, self.world.current_depth);
        events.push(GameEvent::message(
            kind.trigger_text(),
            MessageImportance::Warning,
        ));

        match kind {
            TrapKind::PoisonNeedle => self.poison_player(20, events),
            TrapKind::PoisonGas => self.poison_player(30, events),
            TrapKind::Paralysis => self.affect_player(StatusKind::Paralyzed, 5, 0, events),
            TrapKind::Alarm => {
                for monster in &mut level_of_mut(&mut self.world)?.monsters {
                    monster.asleep = false;
                    monster.effects.remove(StatusKind::Asleep);
                    monster.aware = true;
                }
            }
            TrapKind::MagicDrain => {
                let drained = self.rng.range(5, 15).min(self.player.mana);
                self.player.mana -= drained;
            }
            TrapKind::Teleport => {
                let level = level_of(&self.world)?;
                let range = level.grid.width.max(level.grid.height);
                self.teleport_player(range, events)?;
            }
            TrapKind::SummonMonster => self.summon_around_player(events)?,
            _ => {}
        }

        if let Some(dice) = kind.damage() {
            let damage = self.rng.roll(&dice).max(1);
            self.hurt_player(damage, kind.name(), events);
        }
        Ok(())
    }

    fn poison_player(&mut self, duration: u32, events: &mut Vec<GameEvent>) {
        if self.player.effects.has(StatusKind::ResistPoison) {
            events.push(GameEvent::message(
                "You resist the poison.",
                MessageImportance::Info,
            ));
            return;
        }
        self.affect_player(StatusKind::Poisoned, duration, 0, events);
    }

    /// One or two awake monsters of the current depth appear next to the
    /// player.
    fn summon_around_player(&mut self, events: &mut Vec<GameEvent>) -> GloomResult<()> {
        let content = Arc::clone(&self.content);
        let depth = self.world.current_depth;
        let pool: Vec<_> = content
            .monsters_for_depth(depth)
            .into_iter()
            .filter(|template| template.hostile)
            .collect();
        let count = self.rng.range(1, 2);
        let mut spots: Vec<Position> = {
            let level = level_of(&self.world)?;
            self.player
                .position
                .adjacent_positions()
                .into_iter()
                .filter(|&pos| level.grid.get(pos) == Some(Terrain::Floor) && level.is_free(pos))
                .collect()
        };
        self.rng.shuffle(&mut spots);

        let mut summoned = 0;
        for spot in spots.into_iter().take(count as usize) {
            let Some(&template) = self.rng.choose(&pool) else {
                break;
            };
            let mut monster = Monster::from_template(template, spot, &mut self.rng);
            monster.asleep = false;
            monster.aware = true;
            level_of_mut(&mut self.world)?.monsters.push(monster);
            summoned += 1;
        }
        if summoned == 0 {
            events.push(GameEvent::message(
                "Nothing answers the call.",
                MessageImportance::Info,
            ));
        }
        Ok(())
    }

    /// Tries to disarm a revealed trap next to the player. Success removes
    /// it; failure sets it off.
    pub(crate) fn disarm_trap(
        &mut self,
        direction: Direction,
        events: &mut Vec<GameEvent>,
    ) -> GloomResult<ActionOutcome> {
        let target = self.player.position.step(direction);
        let trap = level_of(&self.world)?
            .trap_at(target)
            .filter(|trap| trap.revealed)
            .copied()
            .ok_or_else(|| invalid("There is no trap there."))?;

        let dexterity = self.player.stats.score(Ability::Dexterity);
        let chance = disarm_chance(dexterity, self.player.class, trap.kind);
        level_of_mut(&mut self.world)?.remove_trap(target);
        if self.rng.percent(chance as u32) {
            events.push(GameEvent::TrapDisarmed {
                position: target,
                kind: trap.kind,
            });
        } else {
            events.push(GameEvent::message(
                format!("You fail to disarm the {}.", trap.kind),
                MessageImportance::Warning,
            ));
            events.push(GameEvent::TrapTriggered {
                position: target,
                kind: trap.kind,
            });
            self.trap_effect(trap.kind, events)?;
        }
        Ok(ActionOutcome::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::ContentTables;
    use crate::game::{GameConfig, Level, PlayerAction, TileGrid};
    use crate::GloomError;

    fn trapped_game(kind: TrapKind, at: Position, revealed: bool) -> GameState {
        let content = Arc::new(ContentTables::builtin().unwrap());
        let mut game =
            GameState::new_game(21, "Tester", CharacterClass::Warrior, content, GameConfig::default())
                .unwrap();
        let grid = TileGrid::from_rows(12, &["#######", "#.....#", "#.....#", "#######"]).unwrap();
        let mut level = Level::new(grid);
        level.traps.push(Trap {
            position: at,
            kind,
            revealed,
        });
        game.world.add_level(level);
        game.world.current_depth = 12;
        game.player.depth = 12;
        game.player.deepest_depth = 12;
        game.player.position = Position::new(1, 1);
        game.player.max_hp = 500;
        game.player.hp = 500;
        game.update_fov().unwrap();
        game
    }

    #[test]
    fn test_depth_ranges_are_consistent() {
        for kind in TrapKind::ALL {
            let (min, max) = kind.depth_range();
            assert!(min >= 1 && min < max, "{}", kind);
            assert!(TrapKind::for_depth(min).contains(&kind));
            assert!(!TrapKind::for_depth(max + 1).contains(&kind));
        }
    }

    #[test]
    fn test_walking_onto_hidden_trap_fires_once() {
        let mut game = trapped_game(TrapKind::Dart, Position::new(2, 1), false);
        let report = game
            .submit_player_action(PlayerAction::Move(Direction::East))
            .unwrap();
        assert!(report.mentions("A dart shoots out and hits you!"));
        assert!(game.player.hp < 500 && game.player.hp >= 496);
        assert!(game.current_level().unwrap().traps.is_empty());

        game.submit_player_action(PlayerAction::Move(Direction::West))
            .unwrap();
        let hp = game.player.hp;
        let again = game
            .submit_player_action(PlayerAction::Move(Direction::East))
            .unwrap();
        assert!(!again.mentions("dart"));
        assert_eq!(game.player.hp, hp);
    }

    #[test]
    fn test_poison_needle_respects_resistance() {
        let mut game = trapped_game(TrapKind::PoisonNeedle, Position::new(2, 1), false);
        game.player.effects.add(StatusKind::ResistPoison, 50, 0);
        let report = game
            .submit_player_action(PlayerAction::Move(Direction::East))
            .unwrap();
        assert!(report.mentions("You resist the poison."));
        assert!(!game.player.effects.has(StatusKind::Poisoned));

        let mut game = trapped_game(TrapKind::PoisonNeedle, Position::new(2, 1), false);
        game.submit_player_action(PlayerAction::Move(Direction::East))
            .unwrap();
        assert_eq!(game.player.effects.remaining(StatusKind::Poisoned), 19);
    }

    #[test]
    fn test_paralysis_trap_costs_turns() {
        let mut game = trapped_game(TrapKind::Paralysis, Position::new(2, 1), false);
        game.submit_player_action(PlayerAction::Move(Direction::East))
            .unwrap();
        assert!(game.player.effects.prevents_action());
        let report = game.submit_player_action(PlayerAction::Wait).unwrap();
        assert!(!report.player_acted);
    }

    #[test]
    fn test_alarm_wakes_the_level() {
        let mut game = trapped_game(TrapKind::Alarm, Position::new(2, 1), false);
        let template = game.content.monster("kobold").unwrap().clone();
        let mut kobold = Monster::from_template(&template, Position::new(5, 2), &mut game.rng);
        kobold.asleep = true;
        let id = kobold.id;
        game.world.current_level_mut().unwrap().monsters.push(kobold);

        game.submit_player_action(PlayerAction::Move(Direction::East))
            .unwrap();
        let kobold = game.current_level().unwrap().monster(id).unwrap().clone();
        assert!(!kobold.asleep);
        assert!(kobold.aware);
    }

    #[test]
    fn test_mana_drain_stops_at_zero() {
        let mut game = trapped_game(TrapKind::MagicDrain, Position::new(2, 1), false);
        game.player.max_mana = 3;
        game.player.mana = 3;
        game.submit_player_action(PlayerAction::Move(Direction::East))
            .unwrap();
        assert_eq!(game.player.mana, 0);
    }

    #[test]
    fn test_summoned_monsters_stand_next_to_player() {
        let mut game = trapped_game(TrapKind::SummonMonster, Position::new(2, 1), false);
        game.submit_player_action(PlayerAction::Move(Direction::East))
            .unwrap();
        let level = game.current_level().unwrap();
        let pos = game.player.position;
        assert!(!level.monsters.is_empty() || game.log.contains("Nothing answers the call."));
        for monster in &level.monsters {
            assert!(monster.position.chebyshev_distance(pos) <= 2);
            assert!(monster.hostile);
        }
    }

    #[test]
    fn test_hidden_trap_cannot_be_disarmed() {
        let mut game = trapped_game(TrapKind::Dart, Position::new(2, 1), false);
        let turn = game.turn;
        let err = game
            .submit_player_action(PlayerAction::DisarmTrap(Direction::East))
            .unwrap_err();
        assert!(matches!(err, GloomError::InvalidAction(_)));
        assert_eq!(game.turn, turn);
        assert_eq!(game.current_level().unwrap().traps.len(), 1);
    }

    #[test]
    fn test_disarm_removes_revealed_trap() {
        let mut game = trapped_game(TrapKind::Alarm, Position::new(2, 1), true);
        game.player.class = CharacterClass::Rogue;
        game.player.stats.dexterity = 18;
        let hp = game.player.hp;

        let report = game
            .submit_player_action(PlayerAction::DisarmTrap(Direction::East))
            .unwrap();
        assert!(game.current_level().unwrap().traps.is_empty());
        assert_eq!(game.player.position, Position::new(1, 1));
        let disarmed = report
            .events
            .iter()
            .any(|event| matches!(event, GameEvent::TrapDisarmed { .. }));
        let fired = report.mentions("An alarm sounds!");
        assert!(disarmed != fired);
        assert_eq!(game.player.hp, hp);
        assert_eq!(game.statistics.traps_disarmed, u32::from(disarmed));
    }
}
