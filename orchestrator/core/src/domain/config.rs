// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Runtime limits and completion provider configuration.
//!
//! These types are embedded in the agency manifest (`spec.runtime`,
//! `spec.providers`) and also usable directly when building an agency in code.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits applied to every run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Model turns allowed per agent invocation
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Delegation hops allowed below the top-level agent. Always enforced.
    #[serde(default = "default_max_depth")]
    pub max_depth: u32,

    /// Capacity of the bounded event channel between producer and consumer
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// How long the producer waits for a stalled consumer before closing the stream
    #[serde(default = "default_consumer_timeout_ms")]
    pub consumer_timeout_ms: u64,

    /// Finished runs remembered to answer late cancel requests
    #[serde(default = "default_finished_run_cache")]
    pub finished_run_cache: usize,

    /// Conversations kept open in memory; older ones are reloaded on demand
    #[serde(default = "default_open_conversations")]
    pub open_conversations: usize,
}

fn default_max_turns() -> u32 {
    25
}

fn default_max_depth() -> u32 {
    8
}

fn default_channel_capacity() -> usize {
    64
}

fn default_consumer_timeout_ms() -> u64 {
    30_000
}

fn default_finished_run_cache() -> usize {
    256
}

fn default_open_conversations() -> usize {
    128
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_depth: default_max_depth(),
            channel_capacity: default_channel_capacity(),
            consumer_timeout_ms: default_consumer_timeout_ms(),
            finished_run_cache: default_finished_run_cache(),
            open_conversations: default_open_conversations(),
        }
    }
}

impl RuntimeSettings {
    pub fn consumer_timeout(&self) -> Duration {
        Duration::from_millis(self.consumer_timeout_ms)
    }

    /// Apply environment variable overrides
    /// Lets container deployments tune limits without editing the manifest
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_number::<u32>("SWITCHBOARD_MAX_TURNS") {
            self.max_turns = v;
        }
        if let Some(v) = env_number::<u32>("SWITCHBOARD_MAX_DEPTH") {
            self.max_depth = v;
        }
        if let Some(v) = env_number::<u64>("SWITCHBOARD_CONSUMER_TIMEOUT_MS") {
            self.consumer_timeout_ms = v;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_turns == 0 {
            anyhow::bail!("runtime.max_turns must be greater than 0");
        }
        if self.max_depth == 0 {
            anyhow::bail!("runtime.max_depth must be greater than 0");
        }
        if self.channel_capacity == 0 {
            anyhow::bail!("runtime.channel_capacity must be greater than 0");
        }
        if self.consumer_timeout_ms == 0 {
            anyhow::bail!("runtime.consumer_timeout_ms must be greater than 0");
        }
        if self.finished_run_cache == 0 {
            anyhow::bail!("runtime.finished_run_cache must be greater than 0");
        }
        if self.open_conversations == 0 {
            anyhow::bail!("runtime.open_conversations must be greater than 0");
        }
        Ok(())
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(value) => {
            tracing::info!("Environment override: {}={}", name, raw);
            Some(value)
        }
        Err(_) => {
            tracing::warn!("Invalid value for {}: '{}'. Ignoring.", name, raw);
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique provider name (e.g., "openai", "local-vllm")
    pub name: String,

    /// Provider type: "openai" or "openai-compatible"
    #[serde(rename = "type")]
    pub provider_type: String,

    /// API endpoint URL
    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Whether this provider is active
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Available models on this provider
    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model alias referenced by agents (e.g., "default", "fast", "smart")
    pub alias: String,

    /// Actual model identifier for the provider API
    pub model: String,
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_yaml() {
        let settings: RuntimeSettings = serde_yaml::from_str("{}").unwrap();
        assert_eq!(settings, RuntimeSettings::default());
        assert_eq!(settings.max_depth, 8);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let settings = RuntimeSettings {
            max_depth: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_provider_type_field_is_renamed() {
        let yaml = r#"
name: openai
type: openai
endpoint: https://api.openai.com/v1
api_key: env:OPENAI_API_KEY
models:
  - alias: default
    model: gpt-4o
"#;
        let provider: ProviderConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(provider.provider_type, "openai");
        assert!(provider.enabled);
        assert_eq!(provider.models[0].model, "gpt-4o");
    }
}
