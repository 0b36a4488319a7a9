// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the switchboard CLI

pub mod config;
pub mod run;
pub mod serve;
pub mod structure;

pub use self::config::ConfigCommand;
pub use self::run::RunArgs;
pub use self::serve::ServeArgs;
pub use self::structure::StructureArgs;

use anyhow::{Context, Result};
use std::path::PathBuf;
use switchboard_swarm::{Agency, AgencyManifest};

/// Load, validate and build the agency every runtime command works on.
pub fn load_agency(config_override: Option<PathBuf>) -> Result<(AgencyManifest, Agency)> {
    let manifest = AgencyManifest::load_or_default(config_override)
        .context("Failed to load agency manifest")?;
    let agency = Agency::from_manifest(&manifest).context("Failed to build agency")?;
    Ok((manifest, agency))
}
