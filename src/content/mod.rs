//! # Content Tables
//!
//! Monster, item and spell templates keyed by id.
//!
//! Tables are loaded from three JSON documents, cross-checked once at load
//! time, and then handed to the game state. A template id that does not
//! resolve is a hard load error rather than something discovered mid-game.

use crate::game::{Behavior, CharacterClass, StatusKind};
use crate::utils::Dice;
use crate::{GloomError, GloomResult};
use log::{debug, info};
use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::marker::PhantomData;
use std::path::Path;

const BUILTIN_MONSTERS: &str = include_str!("../../data/monsters.json");
const BUILTIN_ITEMS: &str = include_str!("../../data/items.json");
const BUILTIN_SPELLS: &str = include_str!("../../data/spells.json");

fn default_true() -> bool {
    true
}

fn default_detection_range() -> u32 {
    8
}

fn default_max_depth() -> u32 {
    u32::MAX
}

/// A ranged attack a monster can make.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangedAttack {
    pub name: String,
    pub damage: Dice,
    pub range: u32,
}

/// One entry of a monster's drop table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropEntry {
    pub item: String,
    /// Chance in percent
    pub percent: u32,
}

/// Static description of a monster kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonsterTemplate {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub glyph: char,
    pub level: u32,
    pub hp: Dice,
    pub attack: i32,
    pub defense: i32,
    pub damage: Dice,
    #[serde(default)]
    pub ranged: Option<RangedAttack>,
    #[serde(default)]
    pub spells: Vec<String>,
    #[serde(default)]
    pub mana: i32,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default)]
    pub min_depth: u32,
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,
    #[serde(default = "default_true")]
    pub hostile: bool,
    #[serde(default = "default_detection_range")]
    pub detection_range: u32,
    pub xp: u32,
    #[serde(default)]
    pub drops: Vec<DropEntry>,
    #[serde(default)]
    pub gold_chance: f64,
    #[serde(default)]
    pub gold_min: u32,
    #[serde(default)]
    pub gold_max: u32,
    /// Chance per turn to spawn a copy of itself
    #[serde(default)]
    pub breed_chance: f64,
    /// Chance to be generated asleep
    #[serde(default)]
    pub sleep_chance: f64,
    /// Chance to break and run once badly hurt
    #[serde(default)]
    pub flee_chance: f64,
}

impl MonsterTemplate {
    /// Whether this monster may be generated at `depth`.
    pub fn fits_depth(&self, depth: u32) -> bool {
        depth >= self.min_depth && depth <= self.max_depth
    }
}

/// Broad item categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Weapon,
    Armor,
    Light,
    Potion,
    Scroll,
    Flask,
    Wand,
    Staff,
    Spellbook,
    Food,
    /// Digging tools, wielded in the weapon slot
    Tool,
}

impl ItemKind {
    /// Kinds that are used up by a single use.
    pub fn is_consumable(self) -> bool {
        matches!(
            self,
            ItemKind::Potion | ItemKind::Scroll | ItemKind::Flask | ItemKind::Food
        )
    }

    /// Kinds whose uses are counted in charges.
    pub fn uses_charges(self) -> bool {
        matches!(self, ItemKind::Wand | ItemKind::Staff)
    }
}

/// What happens when an item is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEffect {
    Heal { dice: Dice },
    RestoreMana { amount: i32 },
    ApplyStatus { status: StatusKind, duration: u32, #[serde(default)] magnitude: i32 },
    CureStatus { status: StatusKind },
    Recall,
    Light { radius: u32, fuel: u32 },
    LearnSpells { spells: Vec<String> },
    Bolt { dice: Dice },
    Teleport { range: u32 },
}

impl ItemEffect {
    /// Effects that need a direction or a target monster.
    pub fn needs_target(&self) -> bool {
        matches!(self, ItemEffect::Bolt { .. })
    }
}

/// Static description of an item kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemTemplate {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    /// Weight in tenths of a pound
    pub weight: u32,
    #[serde(default)]
    pub value: u32,
    #[serde(default)]
    pub damage: Option<Dice>,
    #[serde(default)]
    pub armor: i32,
    #[serde(default)]
    pub to_hit: i32,
    #[serde(default)]
    pub dig_bonus: i32,
    #[serde(default)]
    pub charges: Option<u32>,
    #[serde(default)]
    pub effect: Option<ItemEffect>,
    #[serde(default)]
    pub min_depth: u32,
}

/// Per-class casting requirements of a spell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassSpellInfo {
    pub min_level: u32,
    pub mana: i32,
    /// Base failure chance in percent
    pub base_failure: i32,
}

/// What a spell does when it succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpellEffect {
    Bolt { dice: Dice },
    Heal { dice: Dice },
    ApplyStatus { status: StatusKind, duration: u32, #[serde(default)] magnitude: i32 },
    Recall,
    Light { radius: u32, fuel: u32 },
    Teleport { range: u32 },
    SleepMonsters { radius: u32, duration: u32 },
    DetectMonsters { radius: u32 },
}

impl SpellEffect {
    pub fn needs_target(&self) -> bool {
        matches!(self, SpellEffect::Bolt { .. })
    }
}

/// Static description of a spell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellTemplate {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub classes: BTreeMap<CharacterClass, ClassSpellInfo>,
    pub effect: SpellEffect,
}

/// The three content tables.
#[derive(Debug, Clone, Default)]
pub struct ContentTables {
    monsters: BTreeMap<String, MonsterTemplate>,
    items: BTreeMap<String, ItemTemplate>,
    spells: BTreeMap<String, SpellTemplate>,
}

/// A JSON object whose keys must be unique.
///
/// serde_json keeps the last value of a repeated key; content tables treat a
/// repeated id as an error instead.
struct DistinctTable<T>(BTreeMap<String, T>);

impl<'de, T: Deserialize<'de>> Deserialize<'de> for DistinctTable<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TableVisitor<T>(PhantomData<T>);

        impl<'de, T: Deserialize<'de>> Visitor<'de> for TableVisitor<T> {
            type Value = DistinctTable<T>;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of templates keyed by id")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
                let mut table = BTreeMap::new();
                while let Some((id, template)) = map.next_entry::<String, T>()? {
                    if table.contains_key(&id) {
                        return Err(serde::de::Error::custom(format!("duplicate id '{}'", id)));
                    }
                    table.insert(id, template);
                }
                Ok(DistinctTable(table))
            }
        }

        deserializer.deserialize_map(TableVisitor(PhantomData))
    }
}

fn parse_table<T>(kind: &str, json: &str) -> GloomResult<BTreeMap<String, T>>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_str::<DistinctTable<T>>(json)
        .map(|table| table.0)
        .map_err(|e| GloomError::InvalidContent(format!("{} table: {}", kind, e)))
}

impl ContentTables {
    /// Parses and validates the three tables.
    pub fn from_json(monsters: &str, items: &str, spells: &str) -> GloomResult<Self> {
        let mut monsters: BTreeMap<String, MonsterTemplate> = parse_table("monster", monsters)?;
        let mut items: BTreeMap<String, ItemTemplate> = parse_table("item", items)?;
        let mut spells: BTreeMap<String, SpellTemplate> = parse_table("spell", spells)?;

        for (id, template) in monsters.iter_mut() {
            template.id = id.clone();
        }
        for (id, template) in items.iter_mut() {
            template.id = id.clone();
        }
        for (id, template) in spells.iter_mut() {
            template.id = id.clone();
        }

        let tables = Self {
            monsters,
            items,
            spells,
        };
        tables.validate()?;
        info!(
            "Loaded content: {} monsters, {} items, {} spells",
            tables.monsters.len(),
            tables.items.len(),
            tables.spells.len()
        );
        Ok(tables)
    }

    /// The sample content pack compiled into the crate.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::ContentTables;
    ///
    /// let content = ContentTables::builtin().unwrap();
    /// assert!(content.item("wooden_torch").is_ok());
    /// assert!(content.monster("no_such_monster").is_err());
    /// ```
    pub fn builtin() -> GloomResult<Self> {
        Self::from_json(BUILTIN_MONSTERS, BUILTIN_ITEMS, BUILTIN_SPELLS)
    }

    /// Loads `monsters.json`, `items.json` and `spells.json` from a directory.
    pub fn load_dir(dir: &Path) -> GloomResult<Self> {
        debug!("Loading content from {}", dir.display());
        let monsters = fs::read_to_string(dir.join("monsters.json"))?;
        let items = fs::read_to_string(dir.join("items.json"))?;
        let spells = fs::read_to_string(dir.join("spells.json"))?;
        Self::from_json(&monsters, &items, &spells)
    }

    /// Checks every cross reference between the tables.
    pub fn validate(&self) -> GloomResult<()> {
        for monster in self.monsters.values() {
            if monster.min_depth > monster.max_depth {
                return Err(GloomError::InvalidContent(format!(
                    "monster '{}' has an empty depth range",
                    monster.id
                )));
            }
            for drop in &monster.drops {
                self.item(&drop.item)?;
            }
            for spell in &monster.spells {
                self.spell(spell)?;
            }
            if monster.behavior == Behavior::Ranged && monster.ranged.is_none() {
                return Err(GloomError::InvalidContent(format!(
                    "ranged monster '{}' has no ranged attack",
                    monster.id
                )));
            }
            if monster.behavior == Behavior::Spellcaster && monster.spells.is_empty() {
                return Err(GloomError::InvalidContent(format!(
                    "spellcaster '{}' knows no spells",
                    monster.id
                )));
            }
        }

        for item in self.items.values() {
            if matches!(item.kind, ItemKind::Weapon | ItemKind::Tool) && item.damage.is_none() {
                return Err(GloomError::InvalidContent(format!(
                    "wieldable '{}' has no damage dice",
                    item.id
                )));
            }
            if item.kind.uses_charges() && (item.charges.is_none() || item.effect.is_none()) {
                return Err(GloomError::InvalidContent(format!(
                    "'{}' needs both charges and an effect",
                    item.id
                )));
            }
            if let Some(ItemEffect::LearnSpells { spells }) = &item.effect {
                for spell in spells {
                    self.spell(spell)?;
                }
            }
        }

        for spell in self.spells.values() {
            if spell.classes.is_empty() {
                return Err(GloomError::InvalidContent(format!(
                    "spell '{}' is not castable by any class",
                    spell.id
                )));
            }
        }

        Ok(())
    }

    pub fn monster(&self, id: &str) -> GloomResult<&MonsterTemplate> {
        self.monsters.get(id).ok_or_else(|| GloomError::MissingContent {
            kind: "monster",
            id: id.to_string(),
        })
    }

    pub fn item(&self, id: &str) -> GloomResult<&ItemTemplate> {
        self.items.get(id).ok_or_else(|| GloomError::MissingContent {
            kind: "item",
            id: id.to_string(),
        })
    }

    pub fn spell(&self, id: &str) -> GloomResult<&SpellTemplate> {
        self.spells.get(id).ok_or_else(|| GloomError::MissingContent {
            kind: "spell",
            id: id.to_string(),
        })
    }

    /// Monsters that may be generated at a depth, in id order.
    pub fn monsters_for_depth(&self, depth: u32) -> Vec<&MonsterTemplate> {
        self.monsters
            .values()
            .filter(|monster| monster.fits_depth(depth))
            .collect()
    }

    /// Items that may lie on the floor at a depth, in id order.
    pub fn items_for_depth(&self, depth: u32) -> Vec<&ItemTemplate> {
        self.items
            .values()
            .filter(|item| item.min_depth <= depth)
            .collect()
    }

    /// Spells a class can learn up to and including `level`.
    pub fn spells_for_class(&self, class: CharacterClass, level: u32) -> Vec<&SpellTemplate> {
        self.spells
            .values()
            .filter(|spell| {
                spell
                    .classes
                    .get(&class)
                    .map(|info| info.min_level <= level)
                    .unwrap_or(false)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::EquipSlot;

    const SPELLS: &str = r#"{
        "spark": {
            "name": "Spark",
            "classes": { "Mage": { "min_level": 1, "mana": 1, "base_failure": 20 } },
            "effect": { "type": "bolt", "dice": "1d6" }
        }
    }"#;

    const ITEMS: &str = r#"{
        "stick": { "name": "Stick", "kind": "weapon", "weight": 20, "damage": "1d3" },
        "primer": {
            "name": "Primer", "kind": "spellbook", "weight": 10,
            "effect": { "type": "learn_spells", "spells": ["spark"] }
        }
    }"#;

    const MONSTERS: &str = r#"{
        "rat": {
            "name": "Rat", "glyph": "r", "level": 1, "hp": "1d4", "attack": 1,
            "defense": 0, "damage": "1d2", "xp": 1,
            "drops": [{ "item": "stick", "percent": 50 }]
        }
    }"#;

    #[test]
    fn test_builtin_pack_loads() {
        let content = ContentTables::builtin().unwrap();
        assert!(!content.monsters_for_depth(1).is_empty());
        assert!(!content.monsters_for_depth(0).is_empty());
        assert!(!content.monsters_for_depth(60).is_empty());
        assert!(!content.spells_for_class(CharacterClass::Mage, 1).is_empty());
        assert!(content.spells_for_class(CharacterClass::Warrior, 50).is_empty());
    }

    #[test]
    fn test_small_tables_load_with_defaults() {
        let content = ContentTables::from_json(MONSTERS, ITEMS, SPELLS).unwrap();
        let rat = content.monster("rat").unwrap();
        assert_eq!(rat.id, "rat");
        assert_eq!(rat.behavior, Behavior::MeleePursue);
        assert!(rat.hostile);
        assert_eq!(rat.detection_range, 8);
        assert!(rat.fits_depth(40));
        assert_eq!(content.item("primer").unwrap().kind, ItemKind::Spellbook);
    }

    #[test]
    fn test_unknown_drop_is_rejected() {
        let monsters = MONSTERS.replace("\"stick\"", "\"club\"");
        let err = ContentTables::from_json(&monsters, ITEMS, SPELLS).unwrap_err();
        assert!(matches!(err, GloomError::MissingContent { kind: "item", .. }));
    }

    #[test]
    fn test_unknown_spell_in_book_is_rejected() {
        let items = ITEMS.replace("[\"spark\"]", "[\"fireball\"]");
        let err = ContentTables::from_json(MONSTERS, &items, SPELLS).unwrap_err();
        assert!(matches!(err, GloomError::MissingContent { kind: "spell", .. }));
    }

    #[test]
    fn test_bad_dice_is_rejected() {
        let monsters = MONSTERS.replace("\"1d4\"", "\"one die\"");
        let err = ContentTables::from_json(&monsters, ITEMS, SPELLS).unwrap_err();
        assert!(matches!(err, GloomError::InvalidContent(_)));
    }

    #[test]
    fn test_weapon_without_damage_is_rejected() {
        let items = ITEMS.replace(", \"damage\": \"1d3\"", "");
        assert!(ContentTables::from_json(MONSTERS, &items, SPELLS).is_err());
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let items = ITEMS.replacen(
            "\"stick\": {",
            "\"stick\": { \"name\": \"Twig\", \"kind\": \"weapon\", \"weight\": 5, \"damage\": \"1\" },\n        \"stick\": {",
            1,
        );
        let err = ContentTables::from_json(MONSTERS, &items, SPELLS).unwrap_err();
        assert!(err.to_string().contains("duplicate id 'stick'"));
    }

    #[test]
    fn test_tools_dig_and_wield() {
        let content = ContentTables::builtin().unwrap();
        let pick = content.item("pick").unwrap();
        assert_eq!(pick.kind, ItemKind::Tool);
        assert!(pick.dig_bonus > 0);
        assert_eq!(EquipSlot::for_kind(pick.kind), Some(EquipSlot::Weapon));
    }
}
