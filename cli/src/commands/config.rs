// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Manifest management commands
//!
//! Commands: show, validate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use switchboard_core::domain::directory::AgentDirectory;
use switchboard_swarm::{AgencyManifest, PersistenceConfig};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective manifest
    Show {
        /// Show manifest paths checked
        #[arg(long)]
        paths: bool,

        /// Print the manifest as YAML after overrides
        #[arg(long)]
        yaml: bool,
    },

    /// Validate a manifest and its chart
    Validate {
        /// Path to manifest (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool, as_yaml: bool) -> Result<()> {
    if show_paths {
        println!("{}", "Manifest discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. SWITCHBOARD_CONFIG_PATH: {}",
            std::env::var("SWITCHBOARD_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./switchboard.yaml");
        println!("  4. ~/.switchboard/config.yaml");
        println!();
    }

    let manifest = AgencyManifest::load_or_default(config_override)
        .context("Failed to load agency manifest")?;

    if as_yaml {
        print!("{}", manifest.to_yaml_string()?);
        return Ok(());
    }

    println!("{} {}", "Agency:".bold(), manifest.metadata.name);
    println!();

    println!("{}", "Providers:".bold());
    for provider in &manifest.spec.providers {
        let state = if provider.enabled { "" } else { " (disabled)" };
        println!("  {} ({}){}", provider.name.bold(), provider.provider_type, state);
        println!("    Endpoint: {}", provider.endpoint);
        for model in &provider.models {
            println!("      - {} → {}", model.alias, model.model);
        }
    }
    println!();

    println!("{}", "Agents:".bold());
    for agent in &manifest.spec.agents {
        println!("  {} [model: {}]", agent.name.bold(), agent.model);
        if !agent.description.is_empty() {
            println!("    {}", agent.description.dimmed());
        }
        for tool in &agent.tools {
            println!("    tool: {} ({} {})", tool.name, tool.method, tool.url);
        }
    }
    println!();

    let runtime = &manifest.spec.runtime;
    println!("{}", "Runtime:".bold());
    println!("  Max turns: {}", runtime.max_turns);
    println!("  Max delegation depth: {}", runtime.max_depth);
    println!("  Consumer timeout: {} ms", runtime.consumer_timeout_ms);
    match &manifest.spec.persistence {
        PersistenceConfig::Memory => println!("  Persistence: memory"),
        PersistenceConfig::JsonFile { path } => {
            println!("  Persistence: json files in {}", path.display())
        }
    }
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating manifest...");

    let manifest = AgencyManifest::load_or_default(config_path)
        .context("Failed to load agency manifest")?;

    manifest
        .validate()
        .context("Manifest validation failed")?;
    let graph = manifest.build_graph().context("Invalid agency chart")?;

    println!("{}", "✓ Manifest is valid".green());
    println!(
        "  {} agents, {} edges, entry points: {}",
        graph.len(),
        graph.structure().edges.len(),
        graph.entry_points().join(", ")
    );

    Ok(())
}
