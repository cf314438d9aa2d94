//! # Status Effects
//!
//! Timed effects attached to the player or a monster. Stat modifiers are read
//! from the active set each time they are needed, so an expiring effect
//! reverts its modifier simply by being removed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every kind of status effect the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    Blessed,
    Hasted,
    Protected,
    Slowed,
    Fleeing,
    Asleep,
    Paralyzed,
    Fear,
    Cursed,
    Confused,
    Blind,
    Poisoned,
    ResistFire,
    ResistCold,
    ResistPoison,
}

/// Attack, defense and speed adjustments granted by an effect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatModifiers {
    pub attack: i32,
    pub defense: i32,
    pub speed: i32,
}

impl StatusKind {
    /// Modifiers this effect applies while active.
    pub fn modifiers(self) -> StatModifiers {
        let (attack, defense, speed) = match self {
            StatusKind::Blessed => (2, 5, 0),
            StatusKind::Hasted => (0, 0, 2),
            StatusKind::Protected => (0, 3, 0),
            StatusKind::Slowed => (0, 0, -2),
            StatusKind::Fear => (-2, -2, 0),
            StatusKind::Cursed => (-3, -3, 0),
            StatusKind::Confused => (-2, 0, 0),
            StatusKind::Blind => (-4, -4, 0),
            _ => (0, 0, 0),
        };
        StatModifiers {
            attack,
            defense,
            speed,
        }
    }

    /// Effects that stop their bearer from taking any action.
    pub fn prevents_action(self) -> bool {
        matches!(self, StatusKind::Asleep | StatusKind::Paralyzed)
    }

    /// Harmful effects, the ones a cure or a saving throw cares about.
    pub fn is_harmful(self) -> bool {
        matches!(
            self,
            StatusKind::Slowed
                | StatusKind::Fleeing
                | StatusKind::Asleep
                | StatusKind::Paralyzed
                | StatusKind::Fear
                | StatusKind::Cursed
                | StatusKind::Confused
                | StatusKind::Blind
                | StatusKind::Poisoned
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            StatusKind::Blessed => "blessed",
            StatusKind::Hasted => "hasted",
            StatusKind::Protected => "protected",
            StatusKind::Slowed => "slowed",
            StatusKind::Fleeing => "fleeing",
            StatusKind::Asleep => "asleep",
            StatusKind::Paralyzed => "paralyzed",
            StatusKind::Fear => "afraid",
            StatusKind::Cursed => "cursed",
            StatusKind::Confused => "confused",
            StatusKind::Blind => "blind",
            StatusKind::Poisoned => "poisoned",
            StatusKind::ResistFire => "resistant to fire",
            StatusKind::ResistCold => "resistant to cold",
            StatusKind::ResistPoison => "resistant to poison",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One active effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEffect {
    pub kind: StatusKind,
    pub remaining: u32,
    #[serde(default)]
    pub magnitude: i32,
}

impl StatusEffect {
    /// Modifiers of this effect. A magnitude of 0 uses the kind's defaults;
    /// a positive magnitude replaces the size of every non-zero default and
    /// keeps its sign.
    pub fn modifiers(&self) -> StatModifiers {
        let base = self.kind.modifiers();
        if self.magnitude <= 0 {
            return base;
        }
        let scale = |value: i32| value.signum() * self.magnitude;
        StatModifiers {
            attack: scale(base.attack),
            defense: scale(base.defense),
            speed: scale(base.speed),
        }
    }

    /// Damage dealt each turn by a damage-over-time effect, at least 1.
    pub fn damage_per_turn(&self) -> i32 {
        self.magnitude.max(1)
    }
}

/// The set of effects on one creature, at most one per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusEffects {
    effects: Vec<StatusEffect>,
}

impl StatusEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an effect. Re-applying an active kind keeps the longer duration
    /// and the stronger magnitude. Returns true when the effect is new.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{StatusEffects, StatusKind};
    ///
    /// let mut effects = StatusEffects::new();
    /// assert!(effects.add(StatusKind::Hasted, 5, 0));
    /// assert!(!effects.add(StatusKind::Hasted, 3, 0));
    /// assert_eq!(effects.remaining(StatusKind::Hasted), 5);
    /// ```
    pub fn add(&mut self, kind: StatusKind, duration: u32, magnitude: i32) -> bool {
        if duration == 0 {
            return false;
        }
        if let Some(existing) = self.effects.iter_mut().find(|e| e.kind == kind) {
            existing.remaining = existing.remaining.max(duration);
            existing.magnitude = existing.magnitude.max(magnitude);
            return false;
        }
        self.effects.push(StatusEffect {
            kind,
            remaining: duration,
            magnitude,
        });
        true
    }

    /// Removes an effect. Returns true when it was active.
    pub fn remove(&mut self, kind: StatusKind) -> bool {
        let before = self.effects.len();
        self.effects.retain(|e| e.kind != kind);
        before != self.effects.len()
    }

    pub fn has(&self, kind: StatusKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    pub fn get(&self, kind: StatusKind) -> Option<&StatusEffect> {
        self.effects.iter().find(|e| e.kind == kind)
    }

    /// Turns left on an effect, 0 when inactive.
    pub fn remaining(&self, kind: StatusKind) -> u32 {
        self.effects
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.remaining)
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusEffect> {
        self.effects.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Whether any active effect stops its bearer from acting.
    pub fn prevents_action(&self) -> bool {
        self.effects.iter().any(|e| e.kind.prevents_action())
    }

    /// Summed modifiers of every active effect.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{StatusEffects, StatusKind};
    ///
    /// let mut effects = StatusEffects::new();
    /// effects.add(StatusKind::Cursed, 5, 4);
    /// assert_eq!(effects.modifiers().attack, -4);
    /// ```
    pub fn modifiers(&self) -> StatModifiers {
        self.effects
            .iter()
            .fold(StatModifiers::default(), |acc, effect| {
                let m = effect.modifiers();
                StatModifiers {
                    attack: acc.attack + m.attack,
                    defense: acc.defense + m.defense,
                    speed: acc.speed + m.speed,
                }
            })
    }

    /// Counts every effect down by one turn and returns the kinds that expired.
    pub fn tick(&mut self) -> Vec<StatusKind> {
        let mut expired = Vec::new();
        self.effects.retain_mut(|effect| {
            effect.remaining = effect.remaining.saturating_sub(1);
            if effect.remaining == 0 {
                expired.push(effect.kind);
                false
            } else {
                true
            }
        });
        expired
    }
}
