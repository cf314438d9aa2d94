//! # Gloomdeep
//!
//! The simulation core of a single-player, turn-based dungeon crawler.
//!
//! ## Architecture Overview
//!
//! Gloomdeep is split into a small number of modules that communicate through
//! plain data:
//!
//! - **Generation**: room-and-corridor dungeons, the fixed town, mineral veins
//!   and depth-scaled monster/item placement
//! - **Game**: the tile grid, field of view, entities, status effects and the
//!   turn engine that resolves one player action per turn
//! - **Content**: monster, item and spell tables loaded from JSON and injected
//!   into the game state
//! - **Rendering / Input**: a render-ready snapshot plus key and command parsing
//!   for thin front ends such as the bundled CLI
//!
//! A full turn (player action, monster actions, effect ticks, FOV) completes
//! inside a single call to [`GameState::submit_player_action`].

pub mod content;
pub mod game;
pub mod generation;
pub mod input;
pub mod rendering;
pub mod utils;

// Core module re-exports
pub use content::*;
pub use game::*;
pub use generation::*;
pub use input::*;
pub use rendering::*;
pub use utils::*;

/// Core error type for the Gloomdeep engine.
#[derive(thiserror::Error, Debug)]
pub enum GloomError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Game state is invalid
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Action cannot be performed
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Movement ran into something solid
    #[error("Blocked: {0}")]
    Blocked(String),

    /// Generation failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// A template id was referenced but is not present in the content tables
    #[error("Missing {kind} template '{id}'")]
    MissingContent { kind: &'static str, id: String },

    /// Content data is malformed
    #[error("Invalid content: {0}")]
    InvalidContent(String),

    /// A save record could not be reconstructed
    #[error("Corrupt save: {0}")]
    CorruptSave(String),

    /// The session has ended and no further actions are accepted
    #[error("The game is over")]
    GameOver,
}

/// Result type used throughout the Gloomdeep codebase.
pub type GloomResult<T> = Result<T, GloomError>;

/// Version information for the game.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Game configuration constants.
pub mod config {
    /// Smallest dungeon width the generator will produce
    pub const MIN_DUNGEON_WIDTH: u32 = 20;

    /// Smallest dungeon height the generator will produce
    pub const MIN_DUNGEON_HEIGHT: u32 = 12;

    /// Largest dungeon width the generator will produce
    pub const MAX_DUNGEON_WIDTH: u32 = 300;

    /// Largest dungeon height the generator will produce
    pub const MAX_DUNGEON_HEIGHT: u32 = 120;

    /// Default dungeon width in tiles
    pub const DEFAULT_DUNGEON_WIDTH: u32 = 100;

    /// Default dungeon height in tiles
    pub const DEFAULT_DUNGEON_HEIGHT: u32 = 65;

    /// Maximum number of distinct stacks the player can carry
    pub const MAX_INVENTORY_STACKS: usize = 22;

    /// Maximum number of entries kept in the message log
    pub const MESSAGE_LOG_CAPACITY: usize = 50;

    /// Light radius of a player without a burning light source
    pub const UNLIT_LIGHT_RADIUS: u32 = 1;

    /// Turns between Word of Recall activation and the teleport
    pub const RECALL_TURNS: u32 = 20;

    /// Format version written into save records
    pub const SAVE_FORMAT_VERSION: u32 = 1;
}
