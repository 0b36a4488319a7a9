// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the `ConversationRepository` contract
//! defined in the domain layer.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Load and save conversation logs
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! - **InMemoryConversationRepository** - HashMap-backed, for tests and ephemeral agencies
//! - **JsonFileConversationRepository** - one JSON document per conversation on disk
//! - **CallbackConversationRepository** - adapts a pair of caller-supplied closures

pub mod callback;
pub mod json_file;

pub use callback::CallbackConversationRepository;
pub use json_file::JsonFileConversationRepository;

use crate::domain::message::{ConversationId, ConversationMessage};
use crate::domain::repository::{ConversationRepository, RepositoryError};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct InMemoryConversationRepository {
    conversations: Arc<RwLock<HashMap<ConversationId, Vec<ConversationMessage>>>>,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last snapshot saved for `conversation_id`.
    pub fn snapshot(&self, conversation_id: &ConversationId) -> Vec<ConversationMessage> {
        self.conversations
            .read()
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl ConversationRepository for InMemoryConversationRepository {
    async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        Ok(self.snapshot(conversation_id))
    }

    async fn save(
        &self,
        conversation_id: &ConversationId,
        messages: &[ConversationMessage],
    ) -> Result<(), RepositoryError> {
        self.conversations
            .write()
            .insert(conversation_id.clone(), messages.to_vec());
        Ok(())
    }
}
