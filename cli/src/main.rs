// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # switchboard
//!
//! Runs an agency declared in a YAML manifest: a chart of agents that
//! delegate to each other along permitted edges, exposed as one streamed,
//! cancellable interaction.
//!
//! ## Commands
//!
//! - `switchboard serve` - HTTP/SSE server for the agency
//! - `switchboard run <MESSAGE>` - one interaction streamed to the terminal
//! - `switchboard structure` - print the chart
//! - `switchboard config show|validate` - manifest management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use switchboard_cli::commands::{self, ConfigCommand, RunArgs, ServeArgs, StructureArgs};

/// switchboard - multi-agent agencies over a declared communication graph
#[derive(Parser)]
#[command(name = "switchboard")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to agency manifest (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SWITCHBOARD_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SWITCHBOARD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the agency over HTTP with SSE streaming
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Send one message and stream the run to the terminal
    #[command(name = "run")]
    Run(RunArgs),

    /// Print agents, entry points and permitted edges
    #[command(name = "structure")]
    Structure(StructureArgs),

    /// Manifest management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // API keys are usually referenced as env:VAR in the manifest
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Serve(args)) => commands::serve::execute(args, cli.config).await,
        Some(Commands::Run(args)) => commands::run::execute(args, cli.config).await,
        Some(Commands::Structure(args)) => commands::structure::execute(args, cli.config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    Ok(())
}
