//! # Input Module
//!
//! Key and command-word parsing for player interactions.

pub mod commands;

pub use commands::*;

use crate::game::{Direction, PlayerAction};

/// Maps single key presses to commands.
///
/// Keys that need an argument (doors, digging, item slots) have no binding
/// here; they go through [`parse_command`].
pub struct InputHandler {
    /// Whether to enable Vi-style movement keys (hjklyubn)
    pub vi_keys_enabled: bool,
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHandler {
    /// Creates a new input handler.
    ///
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::{Command, Direction, InputHandler, PlayerAction};
    ///
    /// let input_handler = InputHandler::new();
    /// assert_eq!(
    ///     input_handler.key_to_command('l'),
    ///     Some(Command::Act(PlayerAction::Move(Direction::East)))
    /// );
    /// ```
    pub fn new() -> Self {
        Self {
            vi_keys_enabled: true,
        }
    }

    /// The command bound to a key, if any.
    pub fn key_to_command(&self, key: char) -> Option<Command> {
        if let Some(direction) = self.key_direction(key) {
            return Some(Command::Act(PlayerAction::Move(direction)));
        }

        let action = match key {
            '.' | '5' => PlayerAction::Wait,
            'R' => PlayerAction::Rest,
            's' => PlayerAction::Search,
            ',' | 'g' => PlayerAction::PickUp,
            '<' | '>' => PlayerAction::ChangeDepth,
            'r' => PlayerAction::ActivateRecall,
            'i' => return Some(Command::Inventory),
            '?' => return Some(Command::Help),
            'S' => return Some(Command::Save(None)),
            'Q' => return Some(Command::Quit),
            _ => return None,
        };
        Some(Command::Act(action))
    }

    /// Numpad digits always move; vi keys only when enabled.
    fn key_direction(&self, key: char) -> Option<Direction> {
        let direction = match key {
            '8' => Direction::North,
            '2' => Direction::South,
            '6' => Direction::East,
            '4' => Direction::West,
            '9' => Direction::Northeast,
            '7' => Direction::Northwest,
            '3' => Direction::Southeast,
            '1' => Direction::Southwest,
            _ if !self.vi_keys_enabled => return None,
            'k' => Direction::North,
            'j' => Direction::South,
            'l' => Direction::East,
            'h' => Direction::West,
            'u' => Direction::Northeast,
            'y' => Direction::Northwest,
            'n' => Direction::Southeast,
            'b' => Direction::Southwest,
            _ => return None,
        };
        Some(direction)
    }

    /// Parses a line typed at the prompt. Command words come first; a single
    /// character that is not a word falls back to its key binding.
    pub fn parse_line(&self, line: &str) -> crate::GloomResult<Command> {
        let trimmed = line.trim();
        let parsed = parse_command(trimmed);
        if parsed.is_ok() {
            return parsed;
        }
        let mut chars = trimmed.chars();
        match (chars.next(), chars.next()) {
            (Some(key), None) => self.key_to_command(key).map_or(parsed, Ok),
            _ => parsed,
        }
    }
}
