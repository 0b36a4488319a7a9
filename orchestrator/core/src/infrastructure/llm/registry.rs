// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Completion Provider Registry - Model Alias Resolution and Provider Management
//
// Agents carry an opaque model alias. The registry maps each alias to a
// provider adapter and the provider's real model id, and is itself a
// CompletionService so the turn runner never deals with providers directly.

use crate::domain::config::ProviderConfig;
use crate::domain::llm::{CompletionRequest, CompletionService, CompletionStream, LLMError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::openai::OpenAIAdapter;

/// Registry for managing completion providers and resolving model aliases
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn CompletionService>>,
    alias_map: HashMap<String, (String, String)>, // alias -> (provider_name, model)
    fallback_provider: Option<String>,
}

impl ProviderRegistry {
    /// Create provider registry from manifest provider configs
    pub fn from_config(configs: &[ProviderConfig]) -> anyhow::Result<Self> {
        let mut registry = Self::empty();

        info!("Initializing completion provider registry");

        for provider_config in configs {
            if !provider_config.enabled {
                info!("Provider '{}' disabled, skipping", provider_config.name);
                continue;
            }

            info!("Initializing provider: {}", provider_config.name);

            match Self::create_provider(provider_config) {
                Ok(provider) => {
                    registry
                        .providers
                        .insert(provider_config.name.clone(), provider);
                    for model_config in &provider_config.models {
                        info!(
                            "Mapping alias '{}' -> {} ({})",
                            model_config.alias, model_config.model, provider_config.name
                        );
                        registry.alias_map.insert(
                            model_config.alias.clone(),
                            (provider_config.name.clone(), model_config.model.clone()),
                        );
                    }
                    if registry.fallback_provider.is_none() {
                        registry.fallback_provider = Some(provider_config.name.clone());
                    }
                }
                Err(e) => {
                    warn!("Failed to initialize provider '{}': {}", provider_config.name, e);
                }
            }
        }

        if registry.providers.is_empty() {
            warn!("No completion providers configured - agent turns will fail");
        }

        Ok(registry)
    }

    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
            alias_map: HashMap::new(),
            fallback_provider: None,
        }
    }

    /// Registry that sends every alias to `service`, passing the alias through as the model id.
    pub fn single(service: Arc<dyn CompletionService>) -> Self {
        let name = service.provider_name().to_string();
        let mut registry = Self::empty();
        registry.providers.insert(name.clone(), service);
        registry.fallback_provider = Some(name);
        registry
    }

    /// Registers `service` under `name` and maps `alias` onto `model`.
    pub fn register(
        &mut self,
        name: &str,
        service: Arc<dyn CompletionService>,
        alias: &str,
        model: &str,
    ) {
        self.providers.insert(name.to_string(), service);
        self.alias_map
            .insert(alias.to_string(), (name.to_string(), model.to_string()));
        if self.fallback_provider.is_none() {
            self.fallback_provider = Some(name.to_string());
        }
    }

    fn create_provider(config: &ProviderConfig) -> anyhow::Result<Arc<dyn CompletionService>> {
        let api_key = Self::resolve_api_key(&config.api_key)?;

        let provider: Arc<dyn CompletionService> = match config.provider_type.as_str() {
            "openai" | "openai-compatible" => Arc::new(OpenAIAdapter::new(
                config.name.clone(),
                config.endpoint.clone(),
                api_key,
            )),
            _ => anyhow::bail!("Unsupported provider type: {}", config.provider_type),
        };

        Ok(provider)
    }

    /// Resolve API key from config (supports "env:VAR_NAME" syntax)
    pub fn resolve_api_key(key: &Option<String>) -> anyhow::Result<String> {
        match key {
            Some(k) => match k.strip_prefix("env:") {
                Some(var_name) => std::env::var(var_name)
                    .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
                None => Ok(k.clone()),
            },
            None => Ok(String::new()), // For local providers without auth
        }
    }

    /// Provider and concrete model id for `alias`.
    ///
    /// Unknown aliases go to the fallback provider with the alias as model id.
    pub fn resolve(&self, alias: &str) -> Result<(Arc<dyn CompletionService>, String), LLMError> {
        if let Some((provider_name, model)) = self.alias_map.get(alias) {
            let provider = self.providers.get(provider_name).ok_or_else(|| {
                LLMError::Provider(format!("Provider '{}' not found", provider_name))
            })?;
            return Ok((Arc::clone(provider), model.clone()));
        }
        let fallback = self
            .fallback_provider
            .as_ref()
            .and_then(|name| self.providers.get(name))
            .ok_or_else(|| {
                LLMError::ModelNotFound(format!("Model alias '{}' not found", alias))
            })?;
        Ok((Arc::clone(fallback), alias.to_string()))
    }

    /// Check health of all providers
    pub async fn health_check_all(&self) -> HashMap<String, Result<(), LLMError>> {
        let mut results = HashMap::new();

        for (name, provider) in &self.providers {
            info!("Health checking provider: {}", name);
            results.insert(name.clone(), provider.health_check().await);
        }

        results
    }

    /// Get list of available model aliases
    pub fn available_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = self.alias_map.keys().cloned().collect();
        aliases.sort();
        aliases
    }

    /// Check if a model alias exists
    pub fn has_alias(&self, alias: &str) -> bool {
        self.alias_map.contains_key(alias)
    }
}

#[async_trait]
impl CompletionService for ProviderRegistry {
    async fn complete(&self, mut request: CompletionRequest) -> Result<CompletionStream, LLMError> {
        let (provider, model) = self.resolve(&request.model)?;
        debug!(
            agent = %request.agent,
            alias = %request.model,
            model = %model,
            provider = provider.provider_name(),
            "Dispatching completion"
        );
        request.model = model;
        provider.complete(request).await
    }

    /// Healthy only if every registered provider is.
    async fn health_check(&self) -> Result<(), LLMError> {
        if self.providers.is_empty() {
            return Err(LLMError::Provider("no completion providers registered".to_string()));
        }
        let mut failures: Vec<String> = self
            .health_check_all()
            .await
            .into_iter()
            .filter_map(|(name, result)| result.err().map(|e| format!("{}: {}", name, e)))
            .collect();
        if failures.is_empty() {
            return Ok(());
        }
        failures.sort();
        warn!("Unhealthy completion providers: {}", failures.join("; "));
        Err(LLMError::Provider(failures.join("; ")))
    }

    fn provider_name(&self) -> &str {
        "registry"
    }
}
