//! # Actions and Events
//!
//! The closed set of player actions the turn engine accepts, and the events
//! it reports back for each resolved turn.

use crate::game::{Direction, EntityId, EquipSlot, Position, StatusKind, TrapKind};
use serde::{Deserialize, Serialize};

/// Who or where an attack, bolt or spell is aimed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Target {
    Direction(Direction),
    Entity(EntityId),
}

/// Everything the player can do in one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerAction {
    Move(Direction),
    Attack(Target),
    UseItem { slot: usize, target: Option<Target> },
    CastSpell { spell_id: String, target: Option<Target> },
    Search,
    OpenDoor(Direction),
    CloseDoor(Direction),
    Rest,
    Wait,
    ActivateRecall,
    /// Take the stairs under the player
    ChangeDepth,
    PickUp,
    Drop(usize),
    Equip(usize),
    Unequip(EquipSlot),
    Dig(Direction),
    /// Disarm a revealed trap on an adjacent cell
    DisarmTrap(Direction),
}

impl PlayerAction {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            PlayerAction::Move(_) => "move",
            PlayerAction::Attack(_) => "attack",
            PlayerAction::UseItem { .. } => "use item",
            PlayerAction::CastSpell { .. } => "cast spell",
            PlayerAction::Search => "search",
            PlayerAction::OpenDoor(_) => "open door",
            PlayerAction::CloseDoor(_) => "close door",
            PlayerAction::Rest => "rest",
            PlayerAction::Wait => "wait",
            PlayerAction::ActivateRecall => "activate recall",
            PlayerAction::ChangeDepth => "change depth",
            PlayerAction::PickUp => "pick up",
            PlayerAction::Drop(_) => "drop",
            PlayerAction::Equip(_) => "equip",
            PlayerAction::Unequip(_) => "unequip",
            PlayerAction::Dig(_) => "dig",
            PlayerAction::DisarmTrap(_) => "disarm trap",
        }
    }
}

/// How prominently a message should be shown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MessageImportance {
    #[default]
    Info,
    Combat,
    Warning,
    Critical,
}

/// Something that happened during a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    PlayerMoved {
        from: Position,
        to: Position,
    },
    Attack {
        attacker: String,
        defender: String,
        by_player: bool,
        hit: bool,
        critical: bool,
    },
    Damage {
        target: String,
        amount: i32,
    },
    MonsterDied {
        id: EntityId,
        name: String,
        position: Position,
    },
    /// What a dead monster left on the floor; empty when nothing dropped
    ItemDropped {
        source: String,
        items: Vec<String>,
    },
    DoorOpened {
        position: Position,
    },
    DoorClosed {
        position: Position,
    },
    SecretFound {
        position: Position,
    },
    TrapFound {
        position: Position,
        kind: TrapKind,
    },
    TrapTriggered {
        position: Position,
        kind: TrapKind,
    },
    TrapDisarmed {
        position: Position,
        kind: TrapKind,
    },
    DepthChanged {
        from: u32,
        to: u32,
    },
    StatusExpired {
        kind: StatusKind,
    },
    Message {
        text: String,
        importance: MessageImportance,
    },
}

/// How events name the player.
pub const PLAYER_NAME: &str = "you";

pub(crate) fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// "a bolt", "an arrow".
pub(crate) fn with_article(noun: &str) -> String {
    match noun.chars().next() {
        Some(c) if "aeiouAEIOU".contains(c) => format!("an {}", noun),
        _ => format!("a {}", noun),
    }
}

impl GameEvent {
    /// Shorthand for a plain message event.
    pub fn message(text: impl Into<String>, importance: MessageImportance) -> Self {
        GameEvent::Message {
            text: text.into(),
            importance,
        }
    }

    /// Log line for this event, if it produces one.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::GameEvent;
    ///
    /// let event = GameEvent::ItemDropped { source: "the kobold".into(), items: vec![] };
    /// assert_eq!(event.text().unwrap(), "The kobold leaves nothing behind.");
    /// ```
    pub fn text(&self) -> Option<String> {
        let text = match self {
            GameEvent::PlayerMoved { .. } => return None,
            GameEvent::Attack {
                attacker,
                defender,
                hit,
                critical,
                ..
            } => {
                let you = attacker == PLAYER_NAME;
                match (hit, critical) {
                    (true, true) if you => format!("You critically hit {}!", defender),
                    (true, true) => format!("{} critically hits {}!", capitalize(attacker), defender),
                    (true, false) if you => format!("You hit {}.", defender),
                    (true, false) => format!("{} hits {}.", capitalize(attacker), defender),
                    (false, _) if you => format!("You miss {}.", defender),
                    (false, _) => format!("{} misses {}.", capitalize(attacker), defender),
                }
            }
            GameEvent::Damage { target, amount } if target == PLAYER_NAME => {
                format!("You take {} damage.", amount)
            }
            GameEvent::Damage { target, amount } => {
                format!("{} takes {} damage.", capitalize(target), amount)
            }
            GameEvent::MonsterDied { name, .. } => format!("{} dies.", capitalize(name)),
            GameEvent::ItemDropped { source, items } => {
                if items.is_empty() {
                    format!("{} leaves nothing behind.", capitalize(source))
                } else {
                    format!("{} drops {}.", capitalize(source), items.join(", "))
                }
            }
            GameEvent::DoorOpened { .. } => "You open the door.".to_string(),
            GameEvent::DoorClosed { .. } => "You close the door.".to_string(),
            GameEvent::SecretFound { .. } => "You find a secret door!".to_string(),
            GameEvent::TrapFound { kind, .. } => {
                format!("You find {}!", with_article(kind.name()))
            }
            GameEvent::TrapTriggered { kind, .. } => format!("You set off the {}!", kind),
            GameEvent::TrapDisarmed { kind, .. } => format!("You disarm the {}.", kind),
            GameEvent::DepthChanged { to, .. } => {
                if *to == 0 {
                    "You arrive in town.".to_string()
                } else {
                    format!("You enter depth {} ({} ft).", to, to * 50)
                }
            }
            GameEvent::StatusExpired { kind } => format!("You are no longer {}.", kind),
            GameEvent::Message { text, .. } => text.clone(),
        };
        Some(text)
    }

    pub fn importance(&self) -> MessageImportance {
        match self {
            GameEvent::Attack { .. } | GameEvent::Damage { .. } | GameEvent::MonsterDied { .. } => {
                MessageImportance::Combat
            }
            GameEvent::DepthChanged { .. } | GameEvent::TrapTriggered { .. } => {
                MessageImportance::Warning
            }
            GameEvent::Message { importance, .. } => *importance,
            _ => MessageImportance::Info,
        }
    }
}

/// Whether the session still accepts actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameStatus {
    #[default]
    Playing,
    Dead,
    Ended,
}

/// Result of one submitted action.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnReport {
    /// Turn counter after this turn
    pub turn: u64,
    /// False when the player could not act and the action was discarded
    pub player_acted: bool,
    pub events: Vec<GameEvent>,
    pub status: GameStatus,
}

impl TurnReport {
    /// Whether any event's text contains `needle`.
    pub fn mentions(&self, needle: &str) -> bool {
        self.events
            .iter()
            .filter_map(GameEvent::text)
            .any(|text| text.contains(needle))
    }
}
