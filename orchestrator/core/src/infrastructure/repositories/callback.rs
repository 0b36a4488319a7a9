// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::message::{ConversationId, ConversationMessage};
use crate::domain::repository::{ConversationRepository, RepositoryError};
use async_trait::async_trait;

type LoadFn = dyn Fn(&ConversationId) -> Result<Vec<ConversationMessage>, String> + Send + Sync;
type SaveFn = dyn Fn(&ConversationId, &[ConversationMessage]) -> Result<(), String> + Send + Sync;

/// Persistence through a pair of host-supplied closures.
pub struct CallbackConversationRepository {
    load: Box<LoadFn>,
    save: Box<SaveFn>,
}

impl CallbackConversationRepository {
    pub fn new<L, S>(load: L, save: S) -> Self
    where
        L: Fn(&ConversationId) -> Result<Vec<ConversationMessage>, String> + Send + Sync + 'static,
        S: Fn(&ConversationId, &[ConversationMessage]) -> Result<(), String> + Send + Sync + 'static,
    {
        Self {
            load: Box::new(load),
            save: Box::new(save),
        }
    }
}

#[async_trait]
impl ConversationRepository for CallbackConversationRepository {
    async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        (self.load)(conversation_id).map_err(RepositoryError::Callback)
    }

    async fn save(
        &self,
        conversation_id: &ConversationId,
        messages: &[ConversationMessage],
    ) -> Result<(), RepositoryError> {
        (self.save)(conversation_id, messages).map_err(RepositoryError::Callback)
    }
}
