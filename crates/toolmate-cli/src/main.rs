//! CLI entry point for Toolmate.
//!
//! This binary provides the `toolmate` command: an interactive planning
//! REPL plus one-shot subcommands for planning, prompt inspection, tool
//! ranking and status.

mod cli;
mod commands;
mod config;
mod display;
mod helpers;
mod repl;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::helpers::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing).
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let loaded = AppConfig::load(cli.common.config.as_deref())?;
    let mut config = loaded.config;
    init_tracing(&config.logging.level);

    match &loaded.source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => warn!(
            path = config::DEFAULT_CONFIG_PATH,
            "config file not found, using defaults"
        ),
    }

    if let Some(path) = cli.common.catalog {
        config.catalog.path = path;
    }

    match cli.command {
        Commands::Run => repl::cmd_run(&config).await,
        Commands::Plan { query } => commands::cmd_plan(&config, &query).await,
        Commands::Prompt {
            query,
            update_plan,
            instruction,
        } => commands::cmd_prompt(
            &config,
            &query,
            update_plan.as_deref(),
            instruction.as_deref(),
        ),
        Commands::Tools { query, top_n } => commands::cmd_tools(&config, &query, top_n),
        Commands::Status => commands::cmd_status(&config, loaded.source.as_deref()),
    }
}
