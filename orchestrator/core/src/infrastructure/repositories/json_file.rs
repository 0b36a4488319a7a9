// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// File-backed conversation persistence.
//
// Each conversation is one pretty-printed JSON array at
// `<root>/<sanitized conversation id>.json`. Writes go to a temporary file
// that is renamed over the target so a crash never leaves a torn document.

use crate::domain::message::{ConversationId, ConversationMessage};
use crate::domain::repository::{ConversationRepository, RepositoryError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct JsonFileConversationRepository {
    root: PathBuf,
}

impl JsonFileConversationRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, conversation_id: &ConversationId) -> PathBuf {
        let file: String = conversation_id
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file}.json"))
    }
}

#[async_trait]
impl ConversationRepository for JsonFileConversationRepository {
    async fn load(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Vec<ConversationMessage>, RepositoryError> {
        let path = self.path_for(conversation_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save(
        &self,
        conversation_id: &ConversationId,
        messages: &[ConversationMessage],
    ) -> Result<(), RepositoryError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.path_for(conversation_id);
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(messages)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;
        debug!(path = %path.display(), count = messages.len(), "Conversation saved");
        Ok(())
    }
}
