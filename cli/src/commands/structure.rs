// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Print the agency chart

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use switchboard_core::domain::directory::AgentDirectory;
use switchboard_swarm::AgencyManifest;

#[derive(Args)]
pub struct StructureArgs {
    /// Print the structure as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StructureArgs, config_override: Option<PathBuf>) -> Result<()> {
    let manifest = AgencyManifest::load_or_default(config_override)
        .context("Failed to load agency manifest")?;
    manifest.validate().context("Manifest validation failed")?;
    let graph = manifest.build_graph().context("Invalid agency chart")?;
    let structure = graph.structure();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&structure)?);
        return Ok(());
    }

    println!("{} {}", "Agency:".bold(), manifest.metadata.name);
    println!("{} {}", "Entry points:".bold(), graph.entry_points().join(", "));
    println!();

    for node in &structure.nodes {
        let marker = if node.entry_point { "●" } else { "○" };
        if node.description.is_empty() {
            println!("{} {}", marker, node.name.bold());
        } else {
            println!("{} {} — {}", marker, node.name.bold(), node.description.dimmed());
        }
        for edge in structure.edges.iter().filter(|e| e.sender == node.name) {
            println!("    → {} {}", edge.recipient, format!("({})", edge.action).dimmed());
        }
    }

    Ok(())
}
