//! CLI argument definitions for Toolmate.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Toolmate: plan tool workflows from plain-language requests.
#[derive(Parser)]
#[command(
    name = "toolmate",
    version,
    about = "Toolmate: plan tool workflows from plain-language requests",
    long_about = "Turns a free-text request into an ordered plan of tool calls drawn from a \
                  tool catalog, and lets you revise the plan conversationally."
)]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct CommonArgs {
    /// Path to the TOML configuration file.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the tool catalog (JSON array of tool descriptors).
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the interactive planning REPL.
    Run,

    /// Plan a single request and print the result.
    Plan {
        /// The request to plan.
        query: String,
    },

    /// Print the prompt that would be sent to the model, without sending it.
    Prompt {
        /// The request (for updates: the original request of the thread).
        query: String,

        /// JSON file holding the current plan; switches to the update prompt.
        #[arg(long, requires = "instruction")]
        update_plan: Option<PathBuf>,

        /// The update instruction to apply to the current plan.
        #[arg(long, requires = "update_plan")]
        instruction: Option<String>,
    },

    /// Rank the catalog against a request and print the candidate tools.
    Tools {
        /// The request to rank tools for.
        query: String,

        /// Maximum number of tools to list (defaults to the planner's top_n).
        #[arg(long, short = 'n')]
        top_n: Option<usize>,
    },

    /// Show catalog, configuration and provider status.
    Status,
}
