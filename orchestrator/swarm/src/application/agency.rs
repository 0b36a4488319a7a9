// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agency
//!
//! Composes one communication graph, its conversation store and a streaming
//! run coordinator into the surface callers use: start a streamed or
//! buffered interaction, cancel it, read a transcript, inspect the chart.
//!
//! Every agency owns its own guards, run registry and conversation store, so
//! several agencies can live in one process without sharing state.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Facade over graph + conversations + coordinator

use crate::domain::graph::{CommunicationGraph, GraphStructure};
use crate::domain::manifest::{AgencyManifest, PersistenceConfig};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use switchboard_core::application::{AgentRunner, RunError, RunRequest, RunStream, StreamingRunCoordinator};
use switchboard_core::domain::config::RuntimeSettings;
use switchboard_core::domain::directory::AgentDirectory;
use switchboard_core::domain::llm::{CompletionService, LLMError};
use switchboard_core::domain::message::{ConversationId, ConversationMessage, RunId};
use switchboard_core::domain::repository::ConversationRepository;
use switchboard_core::domain::run::{CancelMode, CancelOutcome};
use switchboard_core::infrastructure::event_bus::{EventBus, EventReceiver};
use switchboard_core::infrastructure::llm::ProviderRegistry;
use switchboard_core::infrastructure::repositories::{
    InMemoryConversationRepository, JsonFileConversationRepository,
};
use switchboard_core::infrastructure::ConversationStore;
use tracing::info;

/// Buffered answer of [`Agency::get_response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgencyResponse {
    pub run_id: RunId,
    pub conversation_id: ConversationId,
    /// Final output of the entry agent, or the error text of a failed run.
    pub response: String,
    pub succeeded: bool,
}

pub struct Agency {
    name: String,
    graph: Arc<CommunicationGraph>,
    completions: Arc<dyn CompletionService>,
    coordinator: StreamingRunCoordinator,
}

impl Agency {
    pub fn new(
        graph: CommunicationGraph,
        completions: Arc<dyn CompletionService>,
        repository: Arc<dyn ConversationRepository>,
        settings: RuntimeSettings,
    ) -> Self {
        let graph = Arc::new(graph);
        let conversations = Arc::new(ConversationStore::new(
            repository,
            settings.open_conversations,
        ));
        let runner = Arc::new(AgentRunner::new(
            Arc::clone(&completions),
            Arc::new(settings),
            EventBus::with_default_capacity(),
        ));
        let directory: Arc<dyn AgentDirectory> = graph.clone();
        Self {
            name: "agency".to_string(),
            graph,
            completions,
            coordinator: StreamingRunCoordinator::new(runner, directory, conversations),
        }
    }

    /// Validates the manifest and builds providers, graph and persistence from it.
    pub fn from_manifest(manifest: &AgencyManifest) -> anyhow::Result<Self> {
        manifest.validate()?;
        if !manifest.spec.providers.iter().any(|p| p.enabled) {
            anyhow::bail!("spec.providers must declare at least one enabled provider");
        }
        let registry = ProviderRegistry::from_config(&manifest.spec.providers)
            .context("Failed to initialize completion providers")?;
        Self::from_manifest_with(manifest, Arc::new(registry))
    }

    /// Like [`Agency::from_manifest`], with a caller-supplied completion service.
    pub fn from_manifest_with(
        manifest: &AgencyManifest,
        completions: Arc<dyn CompletionService>,
    ) -> anyhow::Result<Self> {
        manifest.validate()?;
        let graph = manifest
            .build_graph()
            .context("Invalid agency chart")?;
        let repository = repository_for(&manifest.spec.persistence);

        info!(
            agency = %manifest.metadata.name,
            agents = graph.len(),
            entry_points = ?graph.entry_points(),
            "Agency initialized"
        );

        let mut agency = Self::new(graph, completions, repository, manifest.spec.runtime.clone());
        agency.name = manifest.metadata.name.clone();
        Ok(agency)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn graph(&self) -> &Arc<CommunicationGraph> {
        &self.graph
    }

    pub fn coordinator(&self) -> &StreamingRunCoordinator {
        &self.coordinator
    }

    /// Starts a run and returns its event stream.
    pub async fn get_response_stream(&self, request: RunRequest) -> Result<RunStream, RunError> {
        self.coordinator.start(request).await
    }

    /// Starts a run and drains it.
    ///
    /// Only a run that cannot start is an `Err`; a run that fails or is
    /// cancelled answers with its error text.
    pub async fn get_response(&self, request: RunRequest) -> Result<AgencyResponse, RunError> {
        let stream = self.coordinator.start(request).await?;
        let run_id = stream.run_id();
        let conversation_id = stream.conversation_id().clone();
        let (response, succeeded) = match stream.final_output().await {
            Ok(output) => (output, true),
            Err(error) => (error, false),
        };
        Ok(AgencyResponse {
            run_id,
            conversation_id,
            response,
            succeeded,
        })
    }

    /// Reachability of the completion providers behind this agency.
    pub async fn provider_health(&self) -> Result<(), LLMError> {
        self.completions.health_check().await
    }

    pub fn cancel(&self, run_id: RunId, mode: Option<CancelMode>) -> Option<CancelOutcome> {
        self.coordinator.cancel(run_id, mode)
    }

    /// Full log of one conversation, loading it from persistence if needed.
    pub async fn transcript(&self, conversation_id: &ConversationId) -> Vec<ConversationMessage> {
        self.coordinator
            .conversations()
            .open(conversation_id)
            .await
            .all()
    }

    pub fn structure(&self) -> GraphStructure {
        self.graph.structure()
    }

    pub fn entry_points(&self) -> Vec<String> {
        self.graph.entry_points()
    }

    /// Lifecycle events (runs and delegation hops) of every run of this agency.
    pub fn subscribe(&self) -> EventReceiver {
        self.coordinator.events().subscribe()
    }

    pub fn active_runs(&self) -> Vec<RunId> {
        self.coordinator.active_runs()
    }

    pub fn is_active(&self, run_id: RunId) -> bool {
        self.coordinator.is_active(run_id)
    }
}

fn repository_for(persistence: &PersistenceConfig) -> Arc<dyn ConversationRepository> {
    match persistence {
        PersistenceConfig::Memory => Arc::new(InMemoryConversationRepository::new()),
        PersistenceConfig::JsonFile { path } => {
            Arc::new(JsonFileConversationRepository::new(path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::manifest::AgencyManifest;
    use switchboard_core::infrastructure::llm::{ScriptedCompletionService, ScriptedTurn};

    const MANIFEST: &str = r#"
apiVersion: switchboard/v1
kind: Agency
metadata:
  name: echo-desk
spec:
  agents:
    - name: Echo
  chart:
    - Echo
"#;

    fn echo() -> Arc<ScriptedCompletionService> {
        Arc::new(ScriptedCompletionService::new(|req| {
            ScriptedTurn::text(format!("echo: {}", req.last_user_text().unwrap_or_default()))
        }))
    }

    #[tokio::test]
    async fn test_from_manifest_with_scripted_provider() {
        let manifest = AgencyManifest::from_yaml_str(MANIFEST).unwrap();
        let agency = Agency::from_manifest_with(&manifest, echo()).unwrap();
        assert_eq!(agency.name(), "echo-desk");
        assert_eq!(agency.entry_points(), vec!["Echo"]);

        let answer = agency.get_response(RunRequest::new("hi")).await.unwrap();
        assert!(answer.succeeded);
        assert_eq!(answer.response, "echo: hi");

        let transcript = agency.transcript(&answer.conversation_id).await;
        assert_eq!(transcript.len(), 2);
        assert!(agency.active_runs().is_empty());
    }

    #[tokio::test]
    async fn test_from_manifest_requires_provider() {
        let manifest = AgencyManifest::from_yaml_str(MANIFEST).unwrap();
        assert!(Agency::from_manifest(&manifest).is_err());
    }

    #[tokio::test]
    async fn test_json_file_persistence_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut manifest = AgencyManifest::from_yaml_str(MANIFEST).unwrap();
        manifest.spec.persistence = PersistenceConfig::JsonFile {
            path: dir.path().to_path_buf(),
        };

        let first = Agency::from_manifest_with(&manifest, echo()).unwrap();
        let answer = first
            .get_response(RunRequest::new("remember me").conversation("conv-1"))
            .await
            .unwrap();
        assert!(answer.succeeded);
        drop(first);

        let second = Agency::from_manifest_with(&manifest, echo()).unwrap();
        let transcript = second.transcript(&ConversationId::from("conv-1")).await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].content_str(), "remember me");
    }
}
