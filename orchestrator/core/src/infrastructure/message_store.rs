// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! MessageStore
//!
//! Flat, append-only conversation log shared by every agent of a graph.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Ordered message log with caller-defined filtering
//!
//! # Concurrency
//!
//! Single writer, many readers per process. Concurrent runs that share one
//! conversation id interleave appends and race on `save`; the last snapshot
//! written wins. This is not locked across runs.

use crate::domain::message::{ConversationId, ConversationMessage, MessageRole, RunId};
use crate::domain::repository::ConversationRepository;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum MessageStoreError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

pub struct MessageStore {
    conversation_id: ConversationId,
    messages: RwLock<Vec<ConversationMessage>>,
    repository: Arc<dyn ConversationRepository>,
}

impl MessageStore {
    /// Empty store that persists through `repository`.
    pub fn new(conversation_id: ConversationId, repository: Arc<dyn ConversationRepository>) -> Self {
        Self {
            conversation_id,
            messages: RwLock::new(Vec::new()),
            repository,
        }
    }

    /// Hydrates from the repository. A failing load yields an empty store.
    pub async fn load(
        conversation_id: ConversationId,
        repository: Arc<dyn ConversationRepository>,
    ) -> Self {
        let mut messages = match repository.load(&conversation_id).await {
            Ok(messages) => messages,
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    "Failed to load conversation history, starting empty: {}", e
                );
                Vec::new()
            }
        };
        messages.sort_by_key(|m| m.timestamp);
        debug!(conversation_id = %conversation_id, count = messages.len(), "Conversation loaded");
        Self {
            conversation_id,
            messages: RwLock::new(messages),
            repository,
        }
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Validates, normalises and appends `message`, then saves the full log.
    ///
    /// Save failures are logged and never roll back the in-memory append.
    pub async fn append(
        &self,
        mut message: ConversationMessage,
    ) -> Result<ConversationMessage, MessageStoreError> {
        validate(&message)?;
        if message.content.is_none() && message.role.requires_content() {
            message.content = Some(String::new());
        }
        if message.id.is_none() {
            message.id = Some(format!("msg_{}", Uuid::new_v4().simple()));
        }

        let snapshot = {
            let mut messages = self.messages.write();
            // Insertion order is the ordering key: never let a timestamp go backwards.
            if let Some(last) = messages.last() {
                if message.timestamp < last.timestamp {
                    message.timestamp = last.timestamp;
                }
            }
            messages.push(message.clone());
            messages.clone()
        };

        if let Err(e) = self.repository.save(&self.conversation_id, &snapshot).await {
            warn!(
                conversation_id = %self.conversation_id,
                "Failed to persist conversation after append: {}", e
            );
        }
        Ok(message)
    }

    /// Messages addressed to `agent` by `caller`, in timestamp order.
    ///
    /// With `caller == None` this is the shared user thread: every message
    /// whose `caller_agent` is absent, whichever entry point received it.
    pub fn history_for(&self, agent: &str, caller: Option<&str>) -> Vec<ConversationMessage> {
        let messages = self.messages.read();
        let mut history: Vec<ConversationMessage> = match caller {
            None => messages
                .iter()
                .filter(|m| m.caller_agent.is_none())
                .cloned()
                .collect(),
            Some(caller) => messages
                .iter()
                .filter(|m| m.agent == agent && m.caller_agent.as_deref() == Some(caller))
                .cloned()
                .collect(),
        };
        history.sort_by_key(|m| m.timestamp);
        history
    }

    /// The whole log in timestamp order.
    pub fn all(&self) -> Vec<ConversationMessage> {
        let mut all = self.messages.read().clone();
        all.sort_by_key(|m| m.timestamp);
        all
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Messages from position `from_index` written by `root` or any hop it spawned.
    pub fn messages_for_run(&self, root: RunId, from_index: usize) -> Vec<ConversationMessage> {
        let messages = self.messages.read();
        let mut lineage: HashSet<RunId> = HashSet::from([root]);
        let mut out = Vec::new();
        for message in messages.iter().skip(from_index) {
            let Some(run_id) = message.run_id else {
                continue;
            };
            let belongs = lineage.contains(&run_id)
                || message
                    .parent_run_id
                    .map(|parent| lineage.contains(&parent))
                    .unwrap_or(false);
            if belongs {
                lineage.insert(run_id);
                out.push(message.clone());
            }
        }
        out
    }

    /// Flushes the current log to the repository.
    pub async fn persist(&self) -> Result<(), crate::domain::repository::RepositoryError> {
        let snapshot = self.messages.read().clone();
        self.repository.save(&self.conversation_id, &snapshot).await
    }
}

fn validate(message: &ConversationMessage) -> Result<(), MessageStoreError> {
    if message.agent.trim().is_empty() {
        return Err(MessageStoreError::InvalidMessage(
            "`agent` must not be empty".to_string(),
        ));
    }
    match message.role {
        MessageRole::ToolCall | MessageRole::ToolResult => {
            if message.tool_call_id.is_none() || message.tool_name.is_none() {
                return Err(MessageStoreError::InvalidMessage(format!(
                    "{:?} messages need `tool_call_id` and `tool_name`",
                    message.role
                )));
            }
        }
        _ => {}
    }
    if message.timestamp > Utc::now() + chrono::Duration::days(1) {
        return Err(MessageStoreError::InvalidMessage(
            "timestamp lies in the future".to_string(),
        ));
    }
    Ok(())
}
