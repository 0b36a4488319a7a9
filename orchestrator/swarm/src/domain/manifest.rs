// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Agency Manifest
//
// Declarative description of one agency:
// - Kubernetes-style envelope (apiVersion/kind/metadata/spec)
// - Completion providers and model aliases
// - Agents with instructions, model alias and remote endpoint tools
// - The chart (entry points and permitted edges)
// - Runtime limits, persistence backend, HTTP server settings

use crate::domain::graph::{ChartRef, CommunicationGraph, ConfigurationError};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use switchboard_core::domain::agent::Agent;
use switchboard_core::domain::config::{ProviderConfig, RuntimeSettings};
use switchboard_core::domain::llm::GenerationOptions;
use switchboard_core::domain::tool::RemoteEndpointTool;

pub const API_VERSION: &str = "switchboard/v1";
pub const KIND: &str = "Agency";

const SUPPORTED_PROVIDER_TYPES: &[&str] = &["openai", "openai-compatible"];

/// Top-level agency manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgencyManifest {
    /// API version (must be "switchboard/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "Agency")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: AgencySpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable agency name
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgencySpec {
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub agents: Vec<AgentSpec>,

    /// Entry points (`- Name`) and permitted edges (`- [Sender, Recipient]`)
    #[serde(default)]
    pub chart: Vec<ChartRef>,

    #[serde(default)]
    pub runtime: RuntimeSettings,

    #[serde(default)]
    pub persistence: PersistenceConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub instructions: String,

    /// Model alias resolved by the provider registry
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerationOptions>,

    /// Hold the agent's guard exclusively while one of its delegations runs
    #[serde(default)]
    pub serial_delegation: bool,

    /// Remote endpoint actions, already described as JSON schemas
    #[serde(default)]
    pub tools: Vec<RemoteEndpointTool>,
}

impl AgentSpec {
    pub fn build(&self) -> Arc<Agent> {
        let mut builder = Agent::builder(&self.name)
            .description(&self.description)
            .instructions(&self.instructions)
            .model(&self.model)
            .serial_delegation(self.serial_delegation);
        if let Some(options) = &self.options {
            builder = builder.options(options.clone());
        }
        for tool in &self.tools {
            builder = builder.remote_tool(tool.clone());
        }
        builder.build()
    }
}

/// Where conversation logs are kept between process restarts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PersistenceConfig {
    /// Process-local only
    #[default]
    Memory,
    /// One JSON file per conversation under `path`
    JsonFile { path: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_model() -> String {
    "default".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for AgencyManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "switchboard".to_string(),
                version: None,
                labels: None,
            },
            spec: AgencySpec::default(),
        }
    }
}

impl AgencyManifest {
    /// Load a manifest from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest {:?}", path))?;
        Self::from_yaml_str(&content).with_context(|| format!("Failed to parse manifest {:?}", path))
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let manifest = serde_yaml::from_str(yaml)?;
        Ok(manifest)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover a manifest using precedence order
    /// 1. SWITCHBOARD_CONFIG_PATH environment variable
    /// 2. ./switchboard.yaml (working directory)
    /// 3. ~/.switchboard/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SWITCHBOARD_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            tracing::warn!("SWITCHBOARD_CONFIG_PATH points to missing file {:?}", path);
        }

        let cwd = PathBuf::from("./switchboard.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".switchboard").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load with discovery, falling back to an empty manifest
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading manifest from explicit path: {:?}", path);
            let mut manifest = Self::from_yaml_file(&path)?;
            manifest.apply_env_overrides();
            return Ok(manifest);
        }

        let mut manifest = match Self::discover_config() {
            Some(path) => {
                tracing::info!("Loading manifest from discovered path: {:?}", path);
                Self::from_yaml_file(path)?
            }
            None => {
                tracing::warn!("No manifest found in standard locations. Using empty defaults.");
                Self::default()
            }
        };
        manifest.apply_env_overrides();
        Ok(manifest)
    }

    /// Environment variables win over file values for runtime limits
    pub fn apply_env_overrides(&mut self) {
        self.spec.runtime.apply_env_overrides();

        if let Ok(path) = std::env::var("SWITCHBOARD_PERSISTENCE_PATH") {
            tracing::info!("Environment override: SWITCHBOARD_PERSISTENCE_PATH={}", path);
            self.spec.persistence = PersistenceConfig::JsonFile { path: path.into() };
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.trim().is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let mut aliases = HashSet::new();
        for provider in &self.spec.providers {
            if provider.name.is_empty() {
                anyhow::bail!("Provider name cannot be empty");
            }
            if !SUPPORTED_PROVIDER_TYPES.contains(&provider.provider_type.as_str()) {
                anyhow::bail!(
                    "Unsupported provider type '{}' for provider '{}'",
                    provider.provider_type,
                    provider.name
                );
            }
            if provider.endpoint.is_empty() {
                anyhow::bail!("Provider endpoint cannot be empty for: {}", provider.name);
            }
            if provider.models.is_empty() {
                anyhow::bail!("Provider must have at least one model: {}", provider.name);
            }
            for model in &provider.models {
                if model.alias.is_empty() {
                    anyhow::bail!("Model alias cannot be empty in provider: {}", provider.name);
                }
                if model.model.is_empty() {
                    anyhow::bail!("Model identifier cannot be empty for alias: {}", model.alias);
                }
                if provider.enabled {
                    aliases.insert(model.alias.as_str());
                }
            }
        }

        let mut names = HashSet::new();
        for agent in &self.spec.agents {
            if agent.name.trim().is_empty() {
                anyhow::bail!("Agent name cannot be empty");
            }
            if !names.insert(agent.name.as_str()) {
                anyhow::bail!("Agent '{}' is declared more than once", agent.name);
            }
            // Providers may also be supplied in code, in which case aliases are not checked here.
            if !self.spec.providers.is_empty() && !aliases.contains(agent.model.as_str()) {
                anyhow::bail!(
                    "Agent '{}' uses model alias '{}' which no enabled provider declares",
                    agent.name,
                    agent.model
                );
            }
        }

        if self.spec.chart.is_empty() {
            anyhow::bail!("spec.chart must contain at least one agent");
        }

        if let PersistenceConfig::JsonFile { path } = &self.spec.persistence {
            if path.as_os_str().is_empty() {
                anyhow::bail!("spec.persistence.path cannot be empty");
            }
        }

        self.spec.runtime.validate()?;
        Ok(())
    }

    /// Build the declared agents and wire them into a graph.
    pub fn build_graph(&self) -> Result<CommunicationGraph, ConfigurationError> {
        let agents: Vec<Arc<Agent>> = self.spec.agents.iter().map(AgentSpec::build).collect();
        CommunicationGraph::from_named_chart(&agents, &self.spec.chart)
    }
}
