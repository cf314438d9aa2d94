//! # Display Management
//!
//! Text rendering of a [`RenderSnapshot`]: a viewport of the map centred on
//! the player, a status panel and the message area.

use crate::game::{GameState, GameStatus, Position};
use crate::rendering::{RenderSnapshot, Tone};
use crate::GloomResult;
use std::fmt::Write;

const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Draws snapshots as plain text.
pub struct AsciiRenderer {
    /// Map viewport width in cells
    pub map_width: i32,
    /// Map viewport height in cells
    pub map_height: i32,
    /// Dim remembered cells with ANSI escapes
    pub use_color: bool,
}

impl Default for AsciiRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl AsciiRenderer {
    /// # Examples
    ///
    /// ```
    /// use gloomdeep::AsciiRenderer;
    ///
    /// let renderer = AsciiRenderer::new();
    /// assert!(!renderer.use_color);
    /// ```
    pub fn new() -> Self {
        Self {
            map_width: 80,
            map_height: 22,
            use_color: false,
        }
    }

    /// Top-left corner of a viewport centred on `focus`, kept inside the map.
    fn viewport_origin(&self, snapshot: &RenderSnapshot, focus: Position) -> Position {
        let clamp = |center: i32, view: i32, size: i32| {
            if size <= view {
                0
            } else {
                (center - view / 2).clamp(0, size - view)
            }
        };
        Position::new(
            clamp(focus.x, self.map_width, snapshot.width as i32),
            clamp(focus.y, self.map_height, snapshot.height as i32),
        )
    }

    /// Renders the map viewport.
    pub fn render_map(&self, snapshot: &RenderSnapshot) -> Vec<String> {
        let origin = self.viewport_origin(snapshot, snapshot.player);
        let rows = self.map_height.min(snapshot.height as i32);
        let cols = self.map_width.min(snapshot.width as i32);

        (0..rows)
            .map(|dy| {
                let mut line = String::new();
                let mut dimmed = false;
                for dx in 0..cols {
                    let Some(cell) = snapshot.cell(Position::new(origin.x + dx, origin.y + dy))
                    else {
                        continue;
                    };
                    let dim = self.use_color && cell.tone == Tone::Remembered;
                    if dim != dimmed {
                        line.push_str(if dim { DIM } else { RESET });
                        dimmed = dim;
                    }
                    line.push(cell.glyph);
                }
                if dimmed {
                    line.push_str(RESET);
                }
                line.trim_end().to_string()
            })
            .collect()
    }

    /// Renders the status panel lines.
    pub fn render_status(&self, snapshot: &RenderSnapshot) -> Vec<String> {
        let hud = &snapshot.hud;
        let place = if hud.depth == 0 {
            "Town".to_string()
        } else {
            format!("{} ft (L{})", hud.depth * 50, hud.depth)
        };
        let mut lines = vec![
            format!(
                "{} the {}  Lvl {}  XP {}  Gold {}",
                hud.name, hud.class, hud.level, hud.xp, hud.gold
            ),
            format!(
                "HP {}/{}  Mana {}/{}  {}  Turn {}  Light {}",
                hud.hp, hud.max_hp, hud.mana, hud.max_mana, place, hud.turn, hud.light_radius
            ),
        ];

        let mut extras = Vec::new();
        if hud.speed_modifier > 1.0 {
            extras.push(format!("Burdened x{:.2}", hud.speed_modifier));
        }
        if let Some(turns) = hud.recall {
            extras.push(format!("Recall {}", turns));
        }
        extras.extend(hud.effects.iter().cloned());
        if !extras.is_empty() {
            lines.push(extras.join("  "));
        }

        for monster in &snapshot.monsters {
            lines.push(format!(
                "{} {} ({:.0}%)",
                monster.glyph,
                monster.name,
                monster.hp_fraction * 100.0
            ));
        }
        lines
    }

    /// Renders the complete screen: messages, map, then status.
    pub fn render(&self, snapshot: &RenderSnapshot) -> String {
        let mut out = String::new();
        for message in &snapshot.messages {
            let _ = writeln!(out, "{}", message);
        }
        let _ = writeln!(out);
        for line in self.render_map(snapshot) {
            let _ = writeln!(out, "{}", line);
        }
        let _ = writeln!(out);
        for line in self.render_status(snapshot) {
            let _ = writeln!(out, "{}", line);
        }
        match snapshot.status {
            GameStatus::Playing => {}
            GameStatus::Dead => {
                let _ = writeln!(out, "*** You have died. ***");
            }
            GameStatus::Ended => {
                let _ = writeln!(out, "*** The game is over. ***");
            }
        }
        out
    }

    /// Snapshots and renders a game in one step.
    pub fn render_game(&self, game: &GameState) -> GloomResult<String> {
        Ok(self.render(&game.snapshot()?))
    }
}
