// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Conversation Persistence Contract
//!
//! The message log is hydrated from and flushed to an injected repository.
//! Only the call contract matters to the runtime:
//!
//! | Call | Semantics |
//! |------|-----------|
//! | `load(conversation_id)` | ordered list of messages; an unknown id yields an empty list |
//! | `save(conversation_id, all_messages)` | invoked after every append with the full log; must accept an empty list |
//!
//! Implementations live in `crate::infrastructure::repositories`.

use crate::domain::message::{ConversationId, ConversationMessage};
use async_trait::async_trait;

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ConversationMessage>, RepositoryError>;

    async fn save(
        &self,
        conversation_id: &ConversationId,
        messages: &[ConversationMessage],
    ) -> Result<(), RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Persistence callback failed: {0}")]
    Callback(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Storage(err.to_string())
    }
}
