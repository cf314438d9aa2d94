//! # Combat
//!
//! d20 attack rolls against armor class, and damage dice.
//!
//! A natural 20 always hits and doubles the dice count; a natural 1 always
//! misses. Everything else compares the total against the defender's AC.

use crate::content::ContentTables;
use crate::game::{Ability, Monster, Player};
use crate::utils::{proficiency_bonus, Dice, GameRng};
use crate::GloomResult;

/// Base armor class before any bonuses.
pub const BASE_ARMOR_CLASS: i32 = 10;

/// Damage of an unarmed blow.
pub const UNARMED_DAMAGE: Dice = Dice {
    count: 1,
    sides: 2,
    bonus: 0,
};

/// Outcome of one to-hit roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackRoll {
    pub natural: i32,
    pub total: i32,
    pub hit: bool,
    pub critical: bool,
}

/// Rolls d20 + `bonus` against `armor_class`.
///
/// # Examples
///
/// ```
/// use gloomdeep::{resolve_attack, GameRng};
///
/// let mut rng = GameRng::new(1);
/// let roll = resolve_attack(&mut rng, 100, 10);
/// assert!(roll.natural == 1 || roll.hit);
/// ```
pub fn resolve_attack(rng: &mut GameRng, bonus: i32, armor_class: i32) -> AttackRoll {
    let natural = rng.d20();
    evaluate_attack(natural, bonus, armor_class)
}

/// Applies the natural-roll rules to an already rolled d20.
pub fn evaluate_attack(natural: i32, bonus: i32, armor_class: i32) -> AttackRoll {
    let total = natural + bonus;
    let (hit, critical) = match natural {
        20 => (true, true),
        1 => (false, false),
        _ => (total >= armor_class, false),
    };
    AttackRoll {
        natural,
        total,
        hit,
        critical,
    }
}

/// Player to-hit bonus against a target. Unseen targets are harder to hit.
pub fn player_attack_bonus(
    player: &Player,
    content: &ContentTables,
    target_visible: bool,
) -> GloomResult<i32> {
    let weapon_bonus = match &player.equipment.weapon {
        Some(stack) => content.item(&stack.item_id)?.to_hit,
        None => 0,
    };
    let unseen = if target_visible { 0 } else { -2 };
    Ok(player.modifier(Ability::Strength)
        + proficiency_bonus(player.level)
        + weapon_bonus
        + player.effects.modifiers().attack
        + unseen)
}

/// Player AC: 10 + DEX modifier + worn armor + status defense.
pub fn player_armor_class(player: &Player, content: &ContentTables) -> GloomResult<i32> {
    let armor = match &player.equipment.armor {
        Some(stack) => content.item(&stack.item_id)?.armor,
        None => 0,
    };
    Ok(BASE_ARMOR_CLASS
        + player.modifier(Ability::Dexterity)
        + armor
        + player.effects.modifiers().defense)
}

pub fn monster_armor_class(monster: &Monster) -> i32 {
    BASE_ARMOR_CLASS + monster.defense + monster.effects.modifiers().defense
}

pub fn monster_attack_bonus(monster: &Monster) -> i32 {
    monster.attack + monster.effects.modifiers().attack
}

/// The wielded weapon's dice, or a bare fist.
pub fn player_damage_dice(player: &Player, content: &ContentTables) -> GloomResult<Dice> {
    match &player.equipment.weapon {
        Some(stack) => Ok(content.item(&stack.item_id)?.damage.unwrap_or(UNARMED_DAMAGE)),
        None => Ok(UNARMED_DAMAGE),
    }
}

/// Rolls damage: dice count doubled on a critical, plus `bonus`, at least 1.
pub fn roll_damage(rng: &mut GameRng, dice: &Dice, bonus: i32, critical: bool) -> i32 {
    let dice = if critical { dice.doubled() } else { *dice };
    (rng.roll(&dice) + bonus).max(1)
}
