//! # Rendering Module
//!
//! Render snapshots of the game state and the ASCII renderer that prints
//! them. The snapshot is plain data, so any front end can draw it.

pub mod display;

pub use display::*;

use crate::content::ItemKind;
use crate::game::{GameState, GameStatus, GroundItem, Position, Visibility};
use crate::GloomResult;
use serde::{Deserialize, Serialize};

/// How a cell is lit in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tone {
    Unseen,
    /// Seen before; shown dimmed with terrain only
    Remembered,
    Visible,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderCell {
    pub glyph: char,
    pub tone: Tone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleMonster {
    pub position: Position,
    pub glyph: char,
    pub name: String,
    pub hp_fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibleItem {
    pub position: Position,
    pub glyph: char,
    pub name: String,
}

/// Status line numbers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hud {
    pub name: String,
    pub class: String,
    pub hp: i32,
    pub max_hp: i32,
    pub mana: i32,
    pub max_mana: i32,
    pub level: u32,
    pub xp: u32,
    pub gold: u32,
    pub depth: u32,
    pub turn: u64,
    pub speed_modifier: f64,
    pub light_radius: u32,
    /// Turns until a pending recall fires
    pub recall: Option<u32>,
    pub effects: Vec<String>,
}

/// Everything a front end needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSnapshot {
    pub width: u32,
    pub height: u32,
    /// Row-major cells with the player, visible monsters and items drawn in
    pub cells: Vec<Vec<RenderCell>>,
    pub player: Position,
    pub monsters: Vec<VisibleMonster>,
    pub items: Vec<VisibleItem>,
    pub hud: Hud,
    /// Most recent log lines, oldest first
    pub messages: Vec<String>,
    pub status: GameStatus,
}

impl RenderSnapshot {
    /// The map as plain strings, unseen cells as spaces.
    pub fn glyph_rows(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.glyph).collect())
            .collect()
    }

    pub fn cell(&self, pos: Position) -> Option<RenderCell> {
        if pos.x < 0 || pos.y < 0 {
            return None;
        }
        self.cells
            .get(pos.y as usize)
            .and_then(|row| row.get(pos.x as usize))
            .copied()
    }
}

/// Map glyph for an item lying on the floor.
pub fn item_glyph(kind: ItemKind) -> char {
    match kind {
        ItemKind::Weapon => '|',
        ItemKind::Armor => '[',
        ItemKind::Light | ItemKind::Flask => '~',
        ItemKind::Potion => '!',
        ItemKind::Scroll => '?',
        ItemKind::Wand | ItemKind::Staff => '-',
        ItemKind::Spellbook => '=',
        ItemKind::Food => ',',
        ItemKind::Tool => '\\',
    }
}

const GOLD_GLYPH: char = '$';
const PLAYER_GLYPH: char = '@';
const TRAP_GLYPH: char = '^';

impl GameState {
    /// Builds the render snapshot for the current turn.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use gloomdeep::{CharacterClass, ContentTables, GameConfig, GameState};
    ///
    /// let content = Arc::new(ContentTables::builtin().unwrap());
    /// let game = GameState::new_game(5, "Aria", CharacterClass::Priest, content, GameConfig::default())
    ///     .unwrap();
    /// let snapshot = game.snapshot().unwrap();
    /// assert_eq!(snapshot.hud.depth, 0);
    /// assert!(snapshot.glyph_rows().iter().any(|row| row.contains('@')));
    /// ```
    pub fn snapshot(&self) -> GloomResult<RenderSnapshot> {
        let level = self.current_level()?;
        let grid = &level.grid;

        let mut cells: Vec<Vec<RenderCell>> = (0..grid.height as i32)
            .map(|y| {
                (0..grid.width as i32)
                    .map(|x| {
                        let pos = Position::new(x, y);
                        let tone = match level.visibility.get(pos) {
                            Visibility::Unseen => Tone::Unseen,
                            Visibility::Remembered => Tone::Remembered,
                            Visibility::Visible => Tone::Visible,
                        };
                        let glyph = match (tone, grid.get(pos)) {
                            (Tone::Unseen, _) | (_, None) => ' ',
                            (_, Some(terrain)) => terrain.display_glyph(),
                        };
                        RenderCell { glyph, tone }
                    })
                    .collect()
            })
            .collect();

        let mut items = Vec::new();
        for pile in &level.ground {
            if !level.visibility.is_visible(pile.position) {
                continue;
            }
            // the top of the pile is what shows
            if let Some(top) = pile.items.last() {
                let (glyph, name) = match top {
                    GroundItem::Gold(amount) => (GOLD_GLYPH, format!("{} gold", amount)),
                    GroundItem::Item(stack) => {
                        let template = self.content.item(&stack.item_id)?;
                        (item_glyph(template.kind), stack.describe(&self.content))
                    }
                };
                items.push(VisibleItem {
                    position: pile.position,
                    glyph,
                    name,
                });
            }
        }

        let monsters: Vec<VisibleMonster> = level
            .monsters
            .iter()
            .filter(|monster| level.visibility.is_visible(monster.position))
            .map(|monster| VisibleMonster {
                position: monster.position,
                glyph: monster.glyph,
                name: monster.name.clone(),
                hp_fraction: monster.hp_fraction(),
            })
            .collect();

        let mut draw = |pos: Position, glyph: char| {
            if !grid.in_bounds(pos) {
                return;
            }
            cells[pos.y as usize][pos.x as usize].glyph = glyph;
        };
        // found traps stay on the map once seen
        for trap in &level.traps {
            if trap.revealed && level.visibility.is_known(trap.position) {
                draw(trap.position, TRAP_GLYPH);
            }
        }
        for item in &items {
            draw(item.position, item.glyph);
        }
        for monster in &monsters {
            draw(monster.position, monster.glyph);
        }
        draw(self.player.position, PLAYER_GLYPH);

        let player = &self.player;
        let hud = Hud {
            name: player.name.clone(),
            class: player.class.to_string(),
            hp: player.hp,
            max_hp: player.max_hp,
            mana: player.mana,
            max_mana: player.max_mana,
            level: player.level,
            xp: player.xp,
            gold: player.gold,
            depth: self.world.current_depth,
            turn: self.turn,
            speed_modifier: player.speed_modifier(&self.content)?,
            light_radius: self.sight_radius()?,
            recall: player.recall.remaining,
            effects: player
                .effects
                .iter()
                .map(|effect| format!("{} ({})", effect.kind, effect.remaining))
                .collect(),
        };

        let messages = self
            .log
            .recent(self.config.rules.snapshot_messages)
            .into_iter()
            .map(|entry| entry.text.clone())
            .collect();

        Ok(RenderSnapshot {
            width: grid.width,
            height: grid.height,
            cells,
            player: player.position,
            monsters,
            items,
            hud,
            messages,
            status: self.status,
        })
    }
}
