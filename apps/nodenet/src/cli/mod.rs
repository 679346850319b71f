//! # nodenet CLI Module
//!
//! ## Available Commands
//!
//! - `kinds` - List registered group kinds
//! - `run` - Run a scenario and print the roster
//! - `verify` - Run a scenario with consistency checks after every tick
//! - `serve` - Run a scenario, then serve the roster over HTTP

mod commands;

use clap::{Parser, Subcommand};
use nodenet_core::NetworkError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// nodenet - connected-component grouping for entity-owned node networks
#[derive(Parser, Debug)]
#[command(name = "nodenet")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Print per-tick remake reports
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Registry configuration (TOML); the builtin kinds when omitted
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List registered group kinds
    Kinds,

    /// Run a scenario and print the resulting groups
    Run {
        /// Path to the scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,
    },

    /// Run a scenario, checking every invariant after each tick
    Verify {
        /// Path to the scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,
    },

    /// Run a scenario, then serve the roster over HTTP
    Serve {
        /// Path to the scenario file (JSON)
        #[arg(short, long)]
        scenario: PathBuf,

        /// Host to bind to
        #[arg(short = 'H', long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), NetworkError> {
    let config = cli.config.as_deref();
    let output = Output {
        json: cli.json,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Kinds => cmd_kinds(config, output),
        Commands::Run { scenario } => cmd_run(config, &scenario, output),
        Commands::Verify { scenario } => cmd_verify(config, &scenario, output),
        Commands::Serve {
            scenario,
            host,
            port,
        } => cmd_serve(config, &scenario, &host, port).await,
    }
}
