// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::message::ConversationId;
use crate::domain::repository::ConversationRepository;
use crate::infrastructure::message_store::MessageStore;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;
use tracing::debug;

/// Opens one `MessageStore` per conversation id, loading it on first use.
///
/// Owned by a single agency; every run on the same conversation id gets the
/// same store handle. Only the most recently used conversations stay in
/// memory. An evicted store is reloaded from the repository on the next open,
/// unless a run still holds it, in which case that same handle is returned.
pub struct ConversationStore {
    repository: Arc<dyn ConversationRepository>,
    open: Mutex<OpenConversations>,
}

struct OpenConversations {
    recent: LruCache<ConversationId, Arc<MessageStore>>,
    /// Evicted from `recent` while still referenced elsewhere.
    in_use: HashMap<ConversationId, Weak<MessageStore>>,
}

impl OpenConversations {
    fn insert(&mut self, conversation_id: ConversationId, store: Arc<MessageStore>) {
        self.in_use.remove(&conversation_id);
        if let Some((evicted_id, evicted)) = self.recent.push(conversation_id.clone(), store) {
            if evicted_id != conversation_id && Arc::strong_count(&evicted) > 1 {
                self.in_use.insert(evicted_id, Arc::downgrade(&evicted));
            } else if evicted_id != conversation_id {
                debug!(conversation_id = %evicted_id, "Conversation evicted from memory");
            }
        }
        self.in_use.retain(|_, store| store.strong_count() > 0);
    }
}

impl ConversationStore {
    pub fn new(repository: Arc<dyn ConversationRepository>, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            repository,
            open: Mutex::new(OpenConversations {
                recent: LruCache::new(capacity),
                in_use: HashMap::new(),
            }),
        }
    }

    pub async fn open(&self, conversation_id: &ConversationId) -> Arc<MessageStore> {
        let mut open = self.open.lock().await;
        if let Some(store) = open.recent.get(conversation_id) {
            return Arc::clone(store);
        }
        let store = match open.in_use.get(conversation_id).and_then(Weak::upgrade) {
            Some(store) => store,
            None => Arc::new(
                MessageStore::load(conversation_id.clone(), Arc::clone(&self.repository)).await,
            ),
        };
        open.insert(conversation_id.clone(), Arc::clone(&store));
        store
    }

    /// Conversations currently held in memory.
    pub async fn resident(&self) -> usize {
        let open = self.open.lock().await;
        open.recent.len() + open.in_use.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::ConversationMessage;
    use crate::infrastructure::repositories::InMemoryConversationRepository;

    #[tokio::test]
    async fn test_same_id_yields_same_store() {
        let repo = InMemoryConversationRepository::new();
        let id = ConversationId::from("c-1");
        repo.save(&id, &[ConversationMessage::user("CEO", None, "earlier")]).await.unwrap();

        let conversations = ConversationStore::new(Arc::new(repo), 8);
        let a = conversations.open(&id).await;
        let b = conversations.open(&id).await;
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.len(), 1);
    }

    #[tokio::test]
    async fn test_idle_conversations_are_evicted_and_reloaded() {
        let conversations =
            ConversationStore::new(Arc::new(InMemoryConversationRepository::new()), 2);
        let first = ConversationId::from("c-1");

        let store = conversations.open(&first).await;
        store
            .append(ConversationMessage::user("CEO", None, "hello"))
            .await
            .unwrap();
        drop(store);

        for id in ["c-2", "c-3", "c-4"] {
            conversations.open(&ConversationId::from(id)).await;
        }
        assert_eq!(conversations.resident().await, 2);

        let reloaded = conversations.open(&first).await;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.all()[0].content_str(), "hello");
        assert_eq!(conversations.resident().await, 2);
    }

    #[tokio::test]
    async fn test_evicted_store_in_use_keeps_its_handle() {
        let conversations =
            ConversationStore::new(Arc::new(InMemoryConversationRepository::new()), 1);
        let busy = ConversationId::from("busy");

        let held = conversations.open(&busy).await;
        conversations.open(&ConversationId::from("other")).await;
        assert_eq!(conversations.resident().await, 2);

        let again = conversations.open(&busy).await;
        assert!(Arc::ptr_eq(&held, &again));

        drop(held);
        drop(again);
        conversations.open(&ConversationId::from("third")).await;
        assert_eq!(conversations.resident().await, 1);
    }
}
