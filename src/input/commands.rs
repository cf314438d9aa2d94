//! # Command Words
//!
//! Text commands for scripted play and the line-based CLI, e.g.
//! `move ne`, `use 3 w`, `cast magic_missile e`, `disarm s` or `drop 0`.

use crate::game::{Direction, EquipSlot, PlayerAction, Target};
use crate::{GloomError, GloomResult};
use std::path::PathBuf;

/// A parsed command: either a turn action or a request to the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Act(PlayerAction),
    Inventory,
    Help,
    /// Save to the given path, or the session's default save path
    Save(Option<PathBuf>),
    Quit,
}

/// One-line summaries for the help screen.
pub const COMMAND_HELP: &[&str] = &[
    "n s e w ne nw se sw    move (or attack what stands there)",
    "attack <dir>           attack without moving",
    "use <slot> [dir]       use an inventory item",
    "cast <spell> [dir]     cast a known spell",
    "search / rest / wait   spend a turn",
    "open|close <dir>       work a door",
    "dig <dir>              tunnel with the wielded tool",
    "disarm <dir>           disarm a trap you have found",
    "stairs / recall        change depth",
    "get / drop <slot>      pick up or drop items",
    "wield <slot> / remove <weapon|armor|light>",
    "inventory / save [path] / help / quit",
];

fn unknown(word: &str) -> GloomError {
    GloomError::InvalidAction(format!("Unknown command '{}'.", word))
}

/// Parses a direction word: `n`, `north`, `ne`, `northeast` and so on.
pub fn parse_direction(word: &str) -> Option<Direction> {
    let direction = match word.to_ascii_lowercase().as_str() {
        "n" | "north" | "up" => Direction::North,
        "s" | "south" | "down" => Direction::South,
        "e" | "east" | "right" => Direction::East,
        "w" | "west" | "left" => Direction::West,
        "ne" | "northeast" => Direction::Northeast,
        "nw" | "northwest" => Direction::Northwest,
        "se" | "southeast" => Direction::Southeast,
        "sw" | "southwest" => Direction::Southwest,
        _ => return None,
    };
    Some(direction)
}

fn parse_slot_word(word: &str) -> Option<EquipSlot> {
    match word.to_ascii_lowercase().as_str() {
        "weapon" | "tool" => Some(EquipSlot::Weapon),
        "armor" | "armour" | "body" => Some(EquipSlot::Armor),
        "light" => Some(EquipSlot::Light),
        _ => None,
    }
}

fn direction_arg(verb: &str, arg: Option<&str>) -> GloomResult<Direction> {
    let arg = arg.ok_or_else(|| {
        GloomError::InvalidAction(format!("'{}' needs a direction.", verb))
    })?;
    parse_direction(arg)
        .ok_or_else(|| GloomError::InvalidAction(format!("'{}' is not a direction.", arg)))
}

fn slot_arg(verb: &str, arg: Option<&str>) -> GloomResult<usize> {
    let arg = arg.ok_or_else(|| {
        GloomError::InvalidAction(format!("'{}' needs an inventory slot.", verb))
    })?;
    arg.parse()
        .map_err(|_| GloomError::InvalidAction(format!("'{}' is not an inventory slot.", arg)))
}

fn optional_target(arg: Option<&str>) -> GloomResult<Option<Target>> {
    match arg {
        None => Ok(None),
        Some(word) => parse_direction(word)
            .map(|direction| Some(Target::Direction(direction)))
            .ok_or_else(|| GloomError::InvalidAction(format!("'{}' is not a direction.", word))),
    }
}

/// Parses one command line.
///
/// # Examples
///
/// ```
/// use gloomdeep::{parse_command, Command, Direction, PlayerAction};
///
/// let command = parse_command("move ne").unwrap();
/// assert_eq!(command, Command::Act(PlayerAction::Move(Direction::Northeast)));
/// assert!(parse_command("dance").is_err());
/// ```
pub fn parse_command(line: &str) -> GloomResult<Command> {
    let mut words = line.split_whitespace();
    let verb = words.next().ok_or_else(|| unknown(""))?;
    let first = words.next();
    let second = words.next();

    if let Some(direction) = parse_direction(verb) {
        return Ok(Command::Act(PlayerAction::Move(direction)));
    }

    let action = match verb.to_ascii_lowercase().as_str() {
        "move" | "go" | "walk" => PlayerAction::Move(direction_arg(verb, first)?),
        "attack" | "fight" => PlayerAction::Attack(Target::Direction(direction_arg(verb, first)?)),
        "use" | "quaff" | "read" | "aim" | "eat" => PlayerAction::UseItem {
            slot: slot_arg(verb, first)?,
            target: optional_target(second)?,
        },
        "cast" => PlayerAction::CastSpell {
            spell_id: first
                .ok_or_else(|| GloomError::InvalidAction("'cast' needs a spell.".to_string()))?
                .to_string(),
            target: optional_target(second)?,
        },
        "search" => PlayerAction::Search,
        "open" => PlayerAction::OpenDoor(direction_arg(verb, first)?),
        "close" => PlayerAction::CloseDoor(direction_arg(verb, first)?),
        "rest" => PlayerAction::Rest,
        "wait" | "." => PlayerAction::Wait,
        "recall" => PlayerAction::ActivateRecall,
        "stairs" | "descend" | "ascend" | ">" | "<" => PlayerAction::ChangeDepth,
        "get" | "pickup" | "take" | "," => PlayerAction::PickUp,
        "drop" => PlayerAction::Drop(slot_arg(verb, first)?),
        "wield" | "wear" | "equip" => PlayerAction::Equip(slot_arg(verb, first)?),
        "remove" | "unequip" | "takeoff" => {
            let word = first.ok_or_else(|| {
                GloomError::InvalidAction(format!("'{}' needs weapon, armor or light.", verb))
            })?;
            let slot = parse_slot_word(word).ok_or_else(|| {
                GloomError::InvalidAction(format!("'{}' is not an equipment slot.", word))
            })?;
            PlayerAction::Unequip(slot)
        }
        "dig" | "tunnel" => PlayerAction::Dig(direction_arg(verb, first)?),
        "disarm" => PlayerAction::DisarmTrap(direction_arg(verb, first)?),
        "inventory" | "inv" | "i" => return Ok(Command::Inventory),
        "help" | "?" => return Ok(Command::Help),
        "save" => return Ok(Command::Save(first.map(PathBuf::from))),
        "quit" | "exit" | "q" => return Ok(Command::Quit),
        _ => return Err(unknown(verb)),
    };
    Ok(Command::Act(action))
}

/// Parses a script of commands separated by `;` or newlines. Blank entries
/// and `#` comments are skipped.
pub fn parse_script(script: &str) -> GloomResult<Vec<Command>> {
    script
        .split(|c| c == ';' || c == '\n')
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(parse_command)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_direction_moves() {
        assert_eq!(
            parse_command("sw").unwrap(),
            Command::Act(PlayerAction::Move(Direction::Southwest))
        );
        assert_eq!(
            parse_command("North").unwrap(),
            Command::Act(PlayerAction::Move(Direction::North))
        );
    }

    #[test]
    fn test_item_and_spell_commands() {
        assert_eq!(
            parse_command("use 2 e").unwrap(),
            Command::Act(PlayerAction::UseItem {
                slot: 2,
                target: Some(Target::Direction(Direction::East)),
            })
        );
        assert_eq!(
            parse_command("cast magic_missile").unwrap(),
            Command::Act(PlayerAction::CastSpell {
                spell_id: "magic_missile".to_string(),
                target: None,
            })
        );
        assert_eq!(
            parse_command("remove light").unwrap(),
            Command::Act(PlayerAction::Unequip(EquipSlot::Light))
        );
    }

    #[test]
    fn test_disarm_takes_a_direction() {
        assert_eq!(
            parse_command("disarm se").unwrap(),
            Command::Act(PlayerAction::DisarmTrap(Direction::Southeast))
        );
        assert!(parse_command("disarm").is_err());
    }

    #[test]
    fn test_missing_arguments_are_errors() {
        assert!(parse_command("open").is_err());
        assert!(parse_command("drop x").is_err());
        assert!(parse_command("use 1 sideways").is_err());
        assert!(parse_command("").is_err());
    }

    #[test]
    fn test_script_skips_comments() {
        let commands = parse_script("# warm up\nsearch; wait\n\nsave game.json; quit").unwrap();
        assert_eq!(
            commands,
            vec![
                Command::Act(PlayerAction::Search),
                Command::Act(PlayerAction::Wait),
                Command::Save(Some(PathBuf::from("game.json"))),
                Command::Quit,
            ]
        );
    }
}
