//! Binary entry point for lorebot.
//!
//! This binary runs the Slack event server and a few maintenance commands.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow print_stderr in main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]
#![allow(clippy::multiple_crate_versions)]

use clap::{Parser, Subcommand};
use lorebot::config::LorebotConfig;
use lorebot::observability::{self, LoggingConfig};
use lorebot::server::{self, AppState};
use lorebot::services::Engine;
use lorebot::slack::SlackClient;
use lorebot::storage::SqliteStore;
use std::process::ExitCode;
use std::sync::Arc;

/// Lorebot - a question/answer knowledge-capture bot for Slack workspaces.
#[derive(Parser)]
#[command(name = "lorebot")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the event server.
    Serve {
        /// Address to bind, e.g. 0.0.0.0:3000.
        #[arg(long)]
        addr: Option<String>,
    },

    /// Show store status.
    Status,

    /// Delete every stored answer.
    Reset {
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

/// Main entry point.
#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before config so token overrides are visible
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        },
    };

    if let Err(e) = observability::init(&LoggingConfig::from_env(cli.verbose)) {
        eprintln!("Failed to initialize observability: {e}");
        return ExitCode::FAILURE;
    }

    match run_command(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Loads configuration from the given path or the default location.
fn load_config(path: Option<&str>) -> anyhow::Result<LorebotConfig> {
    let mut config = match path {
        Some(path) => LorebotConfig::load_from_file(std::path::Path::new(path))?,
        None => return Ok(LorebotConfig::load_default()),
    };
    config.apply_env();
    Ok(config)
}

/// Runs the selected command.
async fn run_command(cli: Cli, config: LorebotConfig) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { addr } => cmd_serve(config, addr).await,
        Commands::Status => cmd_status(&config),
        Commands::Reset { yes } => cmd_reset(&config, yes),
    }
}

/// Opens the store at the configured path.
fn open_store(config: &LorebotConfig) -> anyhow::Result<SqliteStore> {
    std::fs::create_dir_all(&config.data_dir)?;
    Ok(SqliteStore::new(config.db_path())?)
}

async fn cmd_serve(config: LorebotConfig, addr: Option<String>) -> anyhow::Result<()> {
    let store = Arc::new(open_store(&config)?);
    let chat = Arc::new(SlackClient::new(config.slack.bot_token.clone()));
    let engine = Arc::new(Engine::new(store, chat, &config));

    let addr = addr.unwrap_or_else(|| config.bind_addr.clone());
    let state = Arc::new(AppState {
        engine,
        verification_token: config.slack.verification_token.clone(),
    });

    server::serve(state, &addr).await?;
    Ok(())
}

fn cmd_status(config: &LorebotConfig) -> anyhow::Result<()> {
    let store = open_store(config)?;
    use lorebot::storage::AnswerStore;
    let count = store.count()?;
    println!("database: {}", config.db_path().display());
    println!("answers:  {count}");
    Ok(())
}

fn cmd_reset(config: &LorebotConfig, yes: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!("refusing to delete without --yes");
    }
    let store = open_store(config)?;
    use lorebot::storage::AnswerStore;
    store.clear()?;
    println!("all answers deleted");
    Ok(())
}
