//! # Entities
//!
//! The player character, monsters and the item stacks they carry.
//!
//! Monsters are plain data records built from a content template; the turn
//! engine owns all the logic that moves them around. The player carries its
//! inventory, equipment, spells and light source directly.

use crate::config::MAX_INVENTORY_STACKS;
use crate::content::{ContentTables, ItemEffect, ItemKind, ItemTemplate, MonsterTemplate};
use crate::game::{new_entity_id, Behavior, EntityId, Position, RecallState, StatusEffects};
use crate::utils::{ability_modifier, GameRng};
use crate::{GloomError, GloomResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Experience needed to reach each level after the first.
pub const XP_TABLE: [u32; 19] = [
    300, 900, 2700, 6500, 14000, 23000, 34000, 48000, 64000, 85000, 100000, 120000, 140000,
    165000, 195000, 225000, 265000, 305000, 355000,
];

/// Highest character level.
pub const MAX_LEVEL: u32 = XP_TABLE.len() as u32 + 1;

/// Total experience required to reach `level`, or `None` past the cap.
pub fn xp_for_level(level: u32) -> Option<u32> {
    match level {
        0 | 1 => Some(0),
        _ => XP_TABLE.get(level as usize - 2).copied(),
    }
}

/// Weight the player can carry without slowing down, in tenths of a pound.
///
/// # Examples
///
/// ```
/// use gloomdeep::carrying_capacity;
///
/// // STR 10 carries 400 lb
/// assert_eq!(carrying_capacity(10), 4000);
/// ```
pub fn carrying_capacity(strength: i32) -> u32 {
    (3000 + strength.max(0) * 100) as u32
}

/// Speed multiplier from carried weight.
///
/// 1.0 up to capacity, growing linearly with the excess and capped at 2.0
/// once the load reaches twice the capacity.
pub fn encumbrance_modifier(weight: u32, capacity: u32) -> f64 {
    if capacity == 0 {
        return 2.0;
    }
    let excess = weight.saturating_sub(capacity) as f64;
    1.0 + (excess / capacity as f64).min(1.0)
}

/// The six primary attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ability {
    Strength,
    Intelligence,
    Wisdom,
    Dexterity,
    Constitution,
    Charisma,
}

/// Primary attribute scores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub strength: i32,
    pub intelligence: i32,
    pub wisdom: i32,
    pub dexterity: i32,
    pub constitution: i32,
    pub charisma: i32,
}

impl Stats {
    /// Starting scores for a class.
    pub fn for_class(class: CharacterClass) -> Self {
        let [strength, intelligence, wisdom, dexterity, constitution, charisma] = match class {
            CharacterClass::Warrior => [16, 8, 10, 14, 15, 10],
            CharacterClass::Mage => [10, 16, 12, 13, 12, 10],
            CharacterClass::Priest => [12, 10, 16, 10, 13, 12],
            CharacterClass::Rogue => [12, 13, 10, 16, 12, 12],
        };
        Self {
            strength,
            intelligence,
            wisdom,
            dexterity,
            constitution,
            charisma,
        }
    }

    pub fn score(&self, ability: Ability) -> i32 {
        match ability {
            Ability::Strength => self.strength,
            Ability::Intelligence => self.intelligence,
            Ability::Wisdom => self.wisdom,
            Ability::Dexterity => self.dexterity,
            Ability::Constitution => self.constitution,
            Ability::Charisma => self.charisma,
        }
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        ability_modifier(self.score(ability))
    }
}

/// Player character classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CharacterClass {
    Warrior,
    Mage,
    Priest,
    Rogue,
}

impl CharacterClass {
    /// The attribute that powers this class's spells, if it casts at all.
    pub fn spell_stat(self) -> Option<Ability> {
        match self {
            CharacterClass::Warrior => None,
            CharacterClass::Mage | CharacterClass::Rogue => Some(Ability::Intelligence),
            CharacterClass::Priest => Some(Ability::Wisdom),
        }
    }

    /// Hit points gained at first level before the CON modifier.
    pub fn base_hit_points(self) -> i32 {
        match self {
            CharacterClass::Warrior => 12,
            CharacterClass::Rogue => 9,
            CharacterClass::Priest => 8,
            CharacterClass::Mage => 6,
        }
    }

    /// Spellbook handed out with the starting kit.
    pub fn starting_book(self) -> Option<&'static str> {
        match self {
            CharacterClass::Mage | CharacterClass::Rogue => Some("magic_for_beginners"),
            CharacterClass::Priest => Some("beginners_handbook"),
            CharacterClass::Warrior => None,
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CharacterClass::Warrior => "Warrior",
            CharacterClass::Mage => "Mage",
            CharacterClass::Priest => "Priest",
            CharacterClass::Rogue => "Rogue",
        };
        f.write_str(name)
    }
}

impl FromStr for CharacterClass {
    type Err = GloomError;

    fn from_str(s: &str) -> GloomResult<Self> {
        match s.to_lowercase().as_str() {
            "warrior" => Ok(CharacterClass::Warrior),
            "mage" => Ok(CharacterClass::Mage),
            "priest" => Ok(CharacterClass::Priest),
            "rogue" => Ok(CharacterClass::Rogue),
            other => Err(GloomError::InvalidAction(format!(
                "unknown class '{}'",
                other
            ))),
        }
    }
}

/// A stack of identical items.
///
/// `charges` holds wand and staff charges, and the remaining fuel of a light
/// source. Stacks only merge when both the id and the charges match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: String,
    pub quantity: u32,
    #[serde(default)]
    pub charges: Option<u32>,
}

impl ItemStack {
    pub fn new(item_id: impl Into<String>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
            charges: None,
        }
    }

    /// A fresh stack as generated: full charges, or full fuel for a light.
    pub fn from_template(template: &ItemTemplate, quantity: u32) -> Self {
        let charges = match (&template.effect, template.kind) {
            (_, kind) if kind.uses_charges() => template.charges,
            (Some(ItemEffect::Light { fuel, .. }), ItemKind::Light) => Some(*fuel),
            _ => None,
        };
        Self {
            item_id: template.id.clone(),
            quantity,
            charges,
        }
    }

    pub fn can_merge(&self, other: &ItemStack) -> bool {
        self.item_id == other.item_id && self.charges == other.charges
    }

    /// Player-facing description such as "3 x Flask of oil" or "a Dagger".
    pub fn describe(&self, content: &ContentTables) -> String {
        let name = content
            .item(&self.item_id)
            .map(|template| template.name.clone())
            .unwrap_or_else(|_| self.item_id.clone());
        let mut text = if self.quantity == 1 {
            let article = match name.chars().next() {
                Some(c) if "AEIOUaeiou".contains(c) => "an",
                _ => "a",
            };
            format!("{} {}", article, name)
        } else {
            format!("{} x {}", self.quantity, name)
        };
        if let Some(charges) = self.charges {
            if content
                .item(&self.item_id)
                .map(|t| t.kind.uses_charges())
                .unwrap_or(false)
            {
                text.push_str(&format!(" ({} charges)", charges));
            } else {
                text.push_str(&format!(" ({} turns)", charges));
            }
        }
        text
    }
}

/// Equipment slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipSlot {
    Weapon,
    Armor,
    Light,
}

impl EquipSlot {
    /// The slot an item kind is worn in.
    pub fn for_kind(kind: ItemKind) -> Option<EquipSlot> {
        match kind {
            ItemKind::Weapon | ItemKind::Tool => Some(EquipSlot::Weapon),
            ItemKind::Armor => Some(EquipSlot::Armor),
            ItemKind::Light => Some(EquipSlot::Light),
            _ => None,
        }
    }
}

/// Worn and wielded items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    #[serde(default)]
    pub weapon: Option<ItemStack>,
    #[serde(default)]
    pub armor: Option<ItemStack>,
    #[serde(default)]
    pub light: Option<ItemStack>,
}

impl Equipment {
    pub fn get(&self, slot: EquipSlot) -> Option<&ItemStack> {
        match slot {
            EquipSlot::Weapon => self.weapon.as_ref(),
            EquipSlot::Armor => self.armor.as_ref(),
            EquipSlot::Light => self.light.as_ref(),
        }
    }

    pub fn slot_mut(&mut self, slot: EquipSlot) -> &mut Option<ItemStack> {
        match slot {
            EquipSlot::Weapon => &mut self.weapon,
            EquipSlot::Armor => &mut self.armor,
            EquipSlot::Light => &mut self.light,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemStack> {
        [&self.weapon, &self.armor, &self.light]
            .into_iter()
            .filter_map(|slot| slot.as_ref())
    }
}

/// The light the player carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightSource {
    pub radius: u32,
    pub fuel: u32,
}

impl LightSource {
    pub fn unlit() -> Self {
        Self { radius: 0, fuel: 0 }
    }

    pub fn is_burning(&self) -> bool {
        self.fuel > 0 && self.radius > 0
    }

    /// Sight radius granted, falling back to `unlit` once the fuel is gone.
    pub fn effective_radius(&self, unlit: u32) -> u32 {
        if self.is_burning() {
            self.radius.max(unlit)
        } else {
            unlit
        }
    }
}

impl Default for LightSource {
    fn default() -> Self {
        Self::unlit()
    }
}

/// The player character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub name: String,
    pub class: CharacterClass,
    pub stats: Stats,
    pub level: u32,
    pub xp: u32,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub mana: i32,
    #[serde(default)]
    pub max_mana: i32,
    pub position: Position,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub deepest_depth: u32,
    #[serde(default)]
    pub inventory: Vec<ItemStack>,
    #[serde(default)]
    pub equipment: Equipment,
    #[serde(default)]
    pub known_spells: BTreeSet<String>,
    /// Spells cast successfully at least once
    #[serde(default)]
    pub cast_spells: BTreeSet<String>,
    #[serde(default)]
    pub effects: StatusEffects,
    #[serde(default)]
    pub light: LightSource,
    #[serde(default)]
    pub gold: u32,
    #[serde(default)]
    pub recall: RecallState,
    /// Accumulated extra time owed from moving while overloaded
    #[serde(default)]
    pub encumbrance_debt: f64,
}

impl Player {
    /// Creates a first-level character standing at `position`.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{CharacterClass, Player, Position};
    ///
    /// let player = Player::new("Aria", CharacterClass::Mage, Position::new(3, 3));
    /// assert_eq!(player.level, 1);
    /// assert!(player.max_mana > 0);
    /// assert_eq!(player.hp, player.max_hp);
    /// ```
    pub fn new(name: impl Into<String>, class: CharacterClass, position: Position) -> Self {
        let stats = Stats::for_class(class);
        let max_hp = (class.base_hit_points() + stats.modifier(Ability::Constitution)).max(1);
        let mut player = Self {
            name: name.into(),
            class,
            stats,
            level: 1,
            xp: 0,
            hp: max_hp,
            max_hp,
            mana: 0,
            max_mana: 0,
            position,
            depth: 0,
            deepest_depth: 0,
            inventory: Vec::new(),
            equipment: Equipment::default(),
            known_spells: BTreeSet::new(),
            cast_spells: BTreeSet::new(),
            effects: StatusEffects::new(),
            light: LightSource::unlit(),
            gold: 0,
            recall: RecallState::default(),
            encumbrance_debt: 0.0,
        };
        player.recompute_mana();
        player.mana = player.max_mana;
        player
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    pub fn modifier(&self, ability: Ability) -> i32 {
        self.stats.modifier(ability)
    }

    /// Modifier of the class's casting attribute, 0 for non-casters.
    pub fn spell_stat_modifier(&self) -> i32 {
        self.class
            .spell_stat()
            .map(|ability| self.modifier(ability))
            .unwrap_or(0)
    }

    /// Recomputes maximum mana from level and casting attribute.
    pub fn recompute_mana(&mut self) {
        self.max_mana = match self.class.spell_stat() {
            Some(_) => (self.level as i32 * (2 + self.spell_stat_modifier()).max(1) + 1) / 2,
            None => 0,
        };
        self.mana = self.mana.min(self.max_mana);
    }

    /// Restores hit points, never past the maximum. Returns the amount healed.
    pub fn heal(&mut self, amount: i32) -> i32 {
        let before = self.hp;
        self.hp = (self.hp + amount.max(0)).min(self.max_hp);
        self.hp - before
    }

    /// Adds experience and applies any level gains. Returns the levels reached.
    pub fn gain_xp(&mut self, amount: u32) -> Vec<u32> {
        self.xp = self.xp.saturating_add(amount);
        let mut reached = Vec::new();
        while self.level < MAX_LEVEL {
            match xp_for_level(self.level + 1) {
                Some(needed) if self.xp >= needed => {
                    self.level += 1;
                    self.max_hp += (6 + self.modifier(Ability::Constitution)).max(4);
                    self.hp = self.max_hp;
                    self.recompute_mana();
                    self.mana = self.max_mana;
                    reached.push(self.level);
                }
                _ => break,
            }
        }
        reached
    }

    /// Unencumbered carrying capacity in tenths of a pound.
    pub fn capacity(&self) -> u32 {
        carrying_capacity(self.stats.strength)
    }

    /// Total weight of the pack and worn equipment.
    pub fn carried_weight(&self, content: &ContentTables) -> GloomResult<u32> {
        let mut total = 0u32;
        for stack in self.inventory.iter().chain(self.equipment.iter()) {
            let template = content.item(&stack.item_id)?;
            total = total.saturating_add(template.weight.saturating_mul(stack.quantity));
        }
        Ok(total)
    }

    /// Current speed multiplier from carried weight.
    pub fn speed_modifier(&self, content: &ContentTables) -> GloomResult<f64> {
        Ok(encumbrance_modifier(
            self.carried_weight(content)?,
            self.capacity(),
        ))
    }

    /// Whether a stack can go into the pack without exceeding the stack limit.
    pub fn has_room_for(&self, stack: &ItemStack) -> bool {
        self.inventory.len() < MAX_INVENTORY_STACKS
            || self.inventory.iter().any(|held| held.can_merge(stack))
    }

    /// Puts a stack into the pack, merging with a matching stack.
    pub fn add_to_inventory(&mut self, stack: ItemStack) -> GloomResult<()> {
        if let Some(held) = self.inventory.iter_mut().find(|held| held.can_merge(&stack)) {
            held.quantity += stack.quantity;
            return Ok(());
        }
        if self.inventory.len() >= MAX_INVENTORY_STACKS {
            return Err(GloomError::InvalidAction(
                "You cannot carry that many items.".to_string(),
            ));
        }
        self.inventory.push(stack);
        Ok(())
    }

    /// Takes `quantity` items out of an inventory slot.
    pub fn take_from_inventory(&mut self, slot: usize, quantity: u32) -> GloomResult<ItemStack> {
        let held = self
            .inventory
            .get_mut(slot)
            .ok_or_else(|| GloomError::InvalidAction(format!("No item in slot {}.", slot)))?;
        if quantity == 0 || quantity > held.quantity {
            return Err(GloomError::InvalidAction(format!(
                "Slot {} does not hold {} items.",
                slot, quantity
            )));
        }
        if quantity == held.quantity {
            return Ok(self.inventory.remove(slot));
        }
        held.quantity -= quantity;
        Ok(ItemStack {
            item_id: held.item_id.clone(),
            quantity,
            charges: held.charges,
        })
    }

    /// Effective sight radius from the light source.
    pub fn light_radius(&self, unlit: u32) -> u32 {
        self.light.effective_radius(unlit)
    }

    /// Item ids in the pack and worn equipment.
    pub fn referenced_items(&self) -> impl Iterator<Item = &str> {
        self.inventory
            .iter()
            .chain(self.equipment.iter())
            .map(|stack| stack.item_id.as_str())
    }
}

impl Default for Player {
    fn default() -> Self {
        Self::new("Adventurer", CharacterClass::Warrior, Position::new(1, 1))
    }
}

fn default_hostile() -> bool {
    true
}

/// A live monster on some level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monster {
    pub id: EntityId,
    pub template_id: String,
    pub name: String,
    pub glyph: char,
    pub position: Position,
    pub hp: i32,
    pub max_hp: i32,
    #[serde(default)]
    pub mana: i32,
    pub level: u32,
    pub attack: i32,
    pub defense: i32,
    #[serde(default)]
    pub effects: StatusEffects,
    /// Has noticed the player
    #[serde(default)]
    pub aware: bool,
    /// Generated asleep and not yet woken
    #[serde(default)]
    pub asleep: bool,
    #[serde(default)]
    pub pack_id: Option<u32>,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default = "default_hostile")]
    pub hostile: bool,
}

impl Monster {
    /// Rolls a new monster from its template.
    pub fn from_template(template: &MonsterTemplate, position: Position, rng: &mut GameRng) -> Self {
        let max_hp = rng.roll(&template.hp).max(1);
        Self {
            id: new_entity_id(rng),
            template_id: template.id.clone(),
            name: template.name.clone(),
            glyph: template.glyph,
            position,
            hp: max_hp,
            max_hp,
            mana: template.mana,
            level: template.level,
            attack: template.attack,
            defense: template.defense,
            effects: StatusEffects::new(),
            aware: false,
            asleep: rng.chance(template.sleep_chance),
            pack_id: None,
            behavior: template.behavior,
            hostile: template.hostile,
        }
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Whether the monster gets to do anything this turn.
    pub fn can_act(&self) -> bool {
        !self.asleep && !self.effects.prevents_action()
    }

    /// Remaining hit points as a fraction of the maximum.
    pub fn hp_fraction(&self) -> f64 {
        if self.max_hp <= 0 {
            0.0
        } else {
            self.hp.max(0) as f64 / self.max_hp as f64
        }
    }

    /// Applies damage and wakes the monster. Returns true when it died.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        self.hp -= amount.max(0);
        self.asleep = false;
        self.effects.remove(crate::game::StatusKind::Asleep);
        self.aware = true;
        !self.is_alive()
    }

    /// "the giant rat", for narration.
    pub fn the_name(&self) -> String {
        format!("the {}", self.name.to_lowercase())
    }
}
