//! # Gloomdeep Main Entry Point
//!
//! Builds or loads a session, feeds it commands from a script or stdin, and
//! prints the ASCII render after every turn.

use clap::Parser;
use gloomdeep::{
    load_from_path, parse_script, save_to_path, AsciiRenderer, CharacterClass, Command,
    ContentTables, GameConfig, GameState, GloomError, GloomResult, InputHandler, COMMAND_HELP,
};
#[cfg(not(feature = "dev-tools"))]
use log::{info, warn};
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;
#[cfg(feature = "dev-tools")]
use tracing::{info, warn};

/// Command line arguments for Gloomdeep.
#[derive(Parser, Debug)]
#[command(name = "gloomdeep")]
#[command(about = "A turn-based dungeon crawler played from the terminal")]
#[command(version)]
struct Args {
    /// Random seed for the world
    #[arg(short, long)]
    seed: Option<u64>,

    /// Character name
    #[arg(short, long, default_value = "Adventurer")]
    name: String,

    /// Character class (warrior, mage, priest, rogue)
    #[arg(short, long, default_value = "warrior")]
    class: String,

    /// JSON file with generation and rules settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding monsters.json, items.json and spells.json
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Save file to resume from
    #[arg(long)]
    load: Option<PathBuf>,

    /// Save file written on exit and by the `save` command
    #[arg(long)]
    save: Option<PathBuf>,

    /// Commands separated by ';' instead of reading stdin
    #[arg(long)]
    commands: Option<String>,

    /// Dim remembered map cells with ANSI escapes
    #[arg(long)]
    color: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> GloomResult<()> {
    let args = Args::parse();
    initialize_logging(&args.log_level);
    info!("Starting Gloomdeep v{}", gloomdeep::VERSION);

    let content = Arc::new(match &args.data_dir {
        Some(dir) => ContentTables::load_dir(dir)?,
        None => ContentTables::builtin()?,
    });

    let mut game = match &args.load {
        Some(path) => load_from_path(path, content)?,
        None => {
            let config = match &args.config {
                Some(path) => GameConfig::from_json_file(path)?,
                None => GameConfig::default(),
            };
            let class: CharacterClass = args.class.parse()?;
            let seed = args.seed.unwrap_or_else(rand::random);
            GameState::new_game(seed, &args.name, class, content, config)?
        }
    };

    let mut renderer = AsciiRenderer::new();
    renderer.use_color = args.color;
    println!("{}", renderer.render_game(&game)?);

    let session = Session {
        renderer,
        save_path: args.save.clone(),
    };
    match &args.commands {
        Some(script) => {
            for command in parse_script(script)? {
                if !session.run(&mut game, command)? {
                    break;
                }
            }
        }
        None => {
            let input = InputHandler::new();
            for line in io::stdin().lock().lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let command = match input.parse_line(&line) {
                    Ok(command) => command,
                    Err(err) => {
                        println!("{}", describe(&err));
                        continue;
                    }
                };
                if !session.run(&mut game, command)? {
                    break;
                }
            }
        }
    }

    if let Some(path) = &args.save {
        save_to_path(&game, path)?;
    }
    info!(
        "Session ended on turn {} at depth {} ({:?})",
        game.turn, game.world.current_depth, game.status
    );
    Ok(())
}

/// Initializes the logging system based on the specified log level.
/// `RUST_LOG` takes precedence when set.
fn initialize_logging(log_level: &str) {
    #[cfg(feature = "dev-tools")]
    {
        use tracing_subscriber::EnvFilter;

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(io::stderr)
            .init();
    }

    #[cfg(not(feature = "dev-tools"))]
    {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
            .format_target(false)
            .init();
    }
}

/// Player-facing text for a rejected command.
fn describe(err: &GloomError) -> String {
    match err {
        GloomError::InvalidAction(text) | GloomError::Blocked(text) => text.clone(),
        other => other.to_string(),
    }
}

struct Session {
    renderer: AsciiRenderer,
    save_path: Option<PathBuf>,
}

impl Session {
    /// Runs one command. Returns false once the session should stop.
    fn run(&self, game: &mut GameState, command: Command) -> GloomResult<bool> {
        match command {
            Command::Act(action) => {
                match game.submit_player_action(action) {
                    Ok(_) => println!("{}", self.renderer.render_game(game)?),
                    Err(GloomError::GameOver) => return Ok(false),
                    Err(err @ (GloomError::InvalidAction(_) | GloomError::Blocked(_))) => {
                        println!("{}", describe(&err))
                    }
                    Err(err) => return Err(err),
                }
                Ok(!game.is_over())
            }
            Command::Inventory => {
                print_inventory(game);
                Ok(true)
            }
            Command::Help => {
                for line in COMMAND_HELP {
                    println!("{}", line);
                }
                Ok(true)
            }
            Command::Save(path) => {
                match path.as_deref().or(self.save_path.as_deref()) {
                    Some(path) => self.save(game, path)?,
                    None => println!("No save file given; use `save <path>` or --save."),
                }
                Ok(true)
            }
            Command::Quit => Ok(false),
        }
    }

    fn save(&self, game: &GameState, path: &Path) -> GloomResult<()> {
        match save_to_path(game, path) {
            Ok(()) => {
                println!("Saved to {}.", path.display());
                Ok(())
            }
            Err(GloomError::Io(err)) => {
                warn!("Could not write {}: {}", path.display(), err);
                println!("Could not save: {}", err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

fn print_inventory(game: &GameState) {
    let player = &game.player;
    if player.inventory.is_empty() {
        println!("Your pack is empty.");
    }
    for (slot, stack) in player.inventory.iter().enumerate() {
        println!("{:>2}) {}", slot, stack.describe(&game.content));
    }
    let worn = [
        ("weapon", &player.equipment.weapon),
        ("armor", &player.equipment.armor),
        ("light", &player.equipment.light),
    ];
    for (slot, stack) in worn {
        if let Some(stack) = stack {
            println!("  {:<6} {}", slot, stack.describe(&game.content));
        }
    }
    println!("  gold   {}", player.gold);
}
