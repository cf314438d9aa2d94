//! Runtime tunables for the turn engine.
//!
//! Every field has a default, so a config file only needs the values it
//! changes.

use crate::config;
use crate::generation::GenerationConfig;
use crate::GloomResult;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Rules applied while turns are resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Turns between Word of Recall activation and the teleport
    pub recall_turns: u32,
    /// A countdown message is logged whenever the remaining turns divide by this
    pub recall_message_interval: u32,
    /// Turns between "you are carrying too much" warnings
    pub overweight_warning_interval: u64,
    pub message_log_capacity: usize,
    pub max_inventory_stacks: usize,
    /// Light radius with no burning light source
    pub unlit_light_radius: u32,
    /// Turns per point of mana regained
    pub mana_regen_interval: u64,
    /// Length of a full town day/night cycle in turns
    pub day_length: u64,
    /// Monsters below this fraction of their hit points consider fleeing
    pub flee_threshold: f64,
    /// How long a monster stays `Fleeing`
    pub flee_duration: u32,
    /// Chance per turn that a caster in range casts instead of moving
    pub cast_chance: f64,
    /// Maximum distance a monster casts at
    pub cast_range: u32,
    /// Chance per turn that a sleeping monster near the player wakes
    pub wake_chance: f64,
    /// Breeders stop multiplying past this many monsters on a level
    pub max_population_per_level: usize,
    /// Chance a dug-out vein yields gold
    pub dig_gold_chance: f64,
    /// Chance that a search also reveals secret doors two cells away
    pub search_far_chance: f64,
    /// Log messages included in a render snapshot
    pub snapshot_messages: usize,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            recall_turns: config::RECALL_TURNS,
            recall_message_interval: 5,
            overweight_warning_interval: 50,
            message_log_capacity: config::MESSAGE_LOG_CAPACITY,
            max_inventory_stacks: config::MAX_INVENTORY_STACKS,
            unlit_light_radius: config::UNLIT_LIGHT_RADIUS,
            mana_regen_interval: 10,
            day_length: 10_000,
            flee_threshold: 0.25,
            flee_duration: 10,
            cast_chance: 0.3,
            cast_range: 6,
            wake_chance: 1.0 / 3.0,
            max_population_per_level: 100,
            dig_gold_chance: 0.4,
            search_far_chance: 0.5,
            snapshot_messages: 5,
        }
    }
}

/// Everything tunable about a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub generation: GenerationConfig,
    pub rules: RulesConfig,
}

impl GameConfig {
    /// Parses a config document; missing sections and fields take defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::GameConfig;
    ///
    /// let config = GameConfig::from_json(r#"{ "rules": { "recall_turns": 5 } }"#).unwrap();
    /// assert_eq!(config.rules.recall_turns, 5);
    /// assert_eq!(config.rules.flee_duration, 10);
    /// assert_eq!(config.generation.max_rooms, 15);
    /// ```
    pub fn from_json(json: &str) -> GloomResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: &Path) -> GloomResult<Self> {
        let json = fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        info!("Loaded game config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let rules = RulesConfig::default();
        assert_eq!(rules.recall_turns, 20);
        assert_eq!(rules.recall_message_interval, 5);
        assert_eq!(rules.overweight_warning_interval, 50);
        assert_eq!(rules.message_log_capacity, 50);
        assert_eq!(rules.max_inventory_stacks, 22);
        assert_eq!(rules.unlit_light_radius, 1);
    }

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(GameConfig::from_json("{}").unwrap(), GameConfig::default());
    }

    #[test]
    fn test_bad_document_is_an_error() {
        assert!(GameConfig::from_json("{ \"rules\": 3 }").is_err());
    }

    #[test]
    fn test_reads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "generation": { "max_rooms": 4 } }"#).unwrap();
        let config = GameConfig::from_json_file(&path).unwrap();
        assert_eq!(config.generation.max_rooms, 4);
        assert_eq!(config.rules, RulesConfig::default());
    }
}
