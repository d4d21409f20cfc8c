//! Confab CLI - binary entry point.
//!
//! # Commands
//!
//! - `confab chat` runs an interactive loop against a local echo backend so
//!   the pacing, reasoning, tool-status and settle behavior can be watched
//!   in a plain terminal.
//! - `confab turns <log.json>` reconstructs turns from a saved message log
//!   and prints them with a context-usage estimate.
//!
//! # Event Loop
//!
//! `chat` ticks the flow at the configured flush interval:
//!
//! 1. Wait for the next line of input or the next frame tick
//! 2. On input: run a slash command or send the line
//! 3. On tick: `flow.tick(now)` drains backend messages and advances the pacer
//! 4. Print whatever text was revealed since the last frame

mod chat;
mod echo;
mod inspect;

use std::{
    fs::{self, File, OpenOptions},
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use confab_engine::ConfabConfig;

#[derive(Parser)]
#[command(name = "confab")]
#[command(about = "Conversational assistant runtime")]
#[command(version)]
struct Cli {
    /// Write logs here instead of ~/.confab/logs/confab.log
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the local echo backend
    Chat(ChatArgs),
    /// Reconstruct turns from a JSON message log
    Turns(TurnsArgs),
}

#[derive(Args, Debug)]
pub(crate) struct ChatArgs {
    /// Api config id (overrides the config file)
    #[arg(long)]
    api_config: Option<String>,

    /// Agent id (overrides the config file)
    #[arg(long)]
    agent: Option<String>,

    /// Delay between streamed chunks of the echo backend, in milliseconds
    #[arg(long, default_value_t = 40)]
    chunk_delay_ms: u64,
}

#[derive(Args, Debug)]
pub(crate) struct TurnsArgs {
    /// Path to a JSON array of messages
    path: PathBuf,

    /// Context window to estimate against (tokens)
    #[arg(long)]
    context_window: Option<u32>,

    /// Print every turn instead of only the newest
    #[arg(long)]
    all: bool,
}

/// Install file logging. Logs never go to stdout, which carries the reply.
fn init_tracing(log_file: Option<PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let mut skipped = Vec::new();
    let opened = log_file_candidates(log_file)
        .into_iter()
        .find_map(|path| match open_append(&path) {
            Ok(file) => Some((path, file)),
            Err(err) => {
                skipped.push(format!("{}: {err}", path.display()));
                None
            }
        });

    let Some((path, file)) = opened else {
        return;
    };
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file)),
        )
        .with(filter)
        .init();

    tracing::info!(path = %path.display(), "Logging initialized");
    for location in skipped {
        tracing::warn!("Skipped log location {location}");
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

/// `--log-file`, then `logs/confab.log` beside the config, then `./.confab/logs/`.
fn log_file_candidates(explicit: Option<PathBuf>) -> Vec<PathBuf> {
    let beside_config = ConfabConfig::path()
        .and_then(|config| config.parent().map(|dir| dir.join("logs").join("confab.log")));
    explicit
        .into_iter()
        .chain(beside_config)
        .chain([PathBuf::from(".confab").join("logs").join("confab.log")])
        .collect()
}

fn load_config() -> ConfabConfig {
    match ConfabConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(err) => {
            eprintln!("Ignoring config: {err}");
            ConfabConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file);

    let config = load_config();

    match cli.command {
        Command::Chat(args) => chat::run(&args, &config).await,
        Command::Turns(args) => inspect::run(&args, &config),
    }
}
