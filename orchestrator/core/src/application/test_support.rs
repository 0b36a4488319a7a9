// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Minimal directory and scope builders for unit tests of the application layer.

use crate::application::event_sink::EventSink;
use crate::application::scope::RunScope;
use crate::domain::agent::Agent;
use crate::domain::directory::AgentDirectory;
use crate::domain::events::RunEvent;
use crate::domain::message::{ConversationId, RunId};
use crate::domain::run::RunCancellation;
use crate::domain::tool::{Capability, DelegationTarget};
use crate::infrastructure::message_store::MessageStore;
use crate::infrastructure::repositories::InMemoryConversationRepository;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

pub struct StaticDirectory {
    agents: Vec<Arc<Agent>>,
    edges: Vec<(String, String)>,
}

impl StaticDirectory {
    pub fn new(agents: Vec<Arc<Agent>>) -> Self {
        Self {
            agents,
            edges: Vec::new(),
        }
    }

    pub fn with_edge(mut self, sender: &str, recipient: &str) -> Self {
        self.edges.push((sender.to_string(), recipient.to_string()));
        self
    }
}

impl AgentDirectory for StaticDirectory {
    fn agent(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.iter().find(|a| a.name() == name).cloned()
    }

    fn is_entry_point(&self, name: &str) -> bool {
        self.agents.first().map(|a| a.name() == name).unwrap_or(false)
    }

    fn entry_points(&self) -> Vec<String> {
        self.agents.first().map(|a| vec![a.name().to_string()]).unwrap_or_default()
    }

    fn can_send(&self, sender: &str, recipient: &str) -> bool {
        self.edges.iter().any(|(s, r)| s == sender && r == recipient)
    }

    fn capabilities(&self, name: &str) -> Vec<Capability> {
        let mut caps: Vec<Capability> = self
            .agent(name)
            .map(|a| a.tools().to_vec())
            .unwrap_or_default();
        for (sender, recipient) in &self.edges {
            if sender == name {
                caps.push(Capability::SendToAgent(DelegationTarget::new(sender, recipient, "")));
            }
        }
        caps
    }
}

pub fn scope_for(directory: StaticDirectory, capacity: usize) -> (RunScope, mpsc::Receiver<RunEvent>) {
    let cancellation = RunCancellation::new();
    let (sink, rx) = EventSink::channel(capacity, cancellation.clone(), Duration::from_secs(5));
    let conversation_id = ConversationId::from("test");
    let store = Arc::new(MessageStore::new(
        conversation_id.clone(),
        Arc::new(InMemoryConversationRepository::new()),
    ));
    let scope = RunScope {
        run_id: RunId::new(),
        parent_run_id: None,
        conversation_id,
        store,
        directory: Arc::new(directory),
        sink,
        cancellation,
        app_context: Arc::new(Value::Null),
        hooks: None,
        depth: 0,
    };
    (scope, rx)
}
