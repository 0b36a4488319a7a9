// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Active-run registry.
//!
//! The one structure mutated by concurrent runs racing to register and
//! deregister, so it sits behind a mutex. `finish` removes a run exactly
//! once and moves its final state into a bounded cache of recently finished
//! runs, which answers cancel requests that lose the race with completion.

use crate::domain::message::{ConversationMessage, RunId};
use crate::domain::run::{RunCancellation, RunRecord, RunStatus};
use crate::infrastructure::message_store::MessageStore;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::debug;

struct ActiveRun {
    record: RunRecord,
    store: Arc<MessageStore>,
    store_offset: usize,
}

/// Final state of a run that has left the registry.
#[derive(Debug, Clone)]
pub struct FinishedRun {
    pub record: RunRecord,
    pub new_messages: Vec<ConversationMessage>,
}

pub struct RunRegistry {
    active: Mutex<HashMap<RunId, ActiveRun>>,
    finished: Mutex<LruCache<RunId, FinishedRun>>,
}

impl RunRegistry {
    pub fn new(finished_capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(finished_capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            active: Mutex::new(HashMap::new()),
            finished: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Registers a pending run. `store` is the conversation it writes to.
    pub fn register(&self, record: RunRecord, store: Arc<MessageStore>) {
        let store_offset = store.len();
        debug!(run_id = %record.run_id, agent = %record.agent, "Run registered");
        self.active.lock().insert(
            record.run_id,
            ActiveRun {
                record,
                store,
                store_offset,
            },
        );
    }

    pub fn mark_streaming(&self, run_id: RunId) {
        if let Some(run) = self.active.lock().get_mut(&run_id) {
            if run.record.status == RunStatus::Pending {
                run.record.status = RunStatus::Streaming;
            }
        }
    }

    /// Removes the run and records its final `status`.
    ///
    /// Returns `false` if the run was not active (already finished or unknown).
    pub fn finish(&self, run_id: RunId, status: RunStatus) -> bool {
        let mut active = self.active.lock();
        let Some(run) = active.remove(&run_id) else {
            return false;
        };
        let mut record = run.record;
        record.status = status;
        let new_messages = run.store.messages_for_run(run_id, run.store_offset);
        debug!(run_id = %run_id, status = status.as_str(), "Run finished");
        // Still holding `active` so a concurrent lookup sees the run in exactly one map.
        self.finished.lock().put(
            run_id,
            FinishedRun {
                record,
                new_messages,
            },
        );
        true
    }

    pub fn is_active(&self, run_id: RunId) -> bool {
        self.active.lock().contains_key(&run_id)
    }

    pub fn active_ids(&self) -> Vec<RunId> {
        self.active.lock().keys().copied().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }

    pub fn cancellation(&self, run_id: RunId) -> Option<RunCancellation> {
        self.active
            .lock()
            .get(&run_id)
            .map(|run| run.record.cancellation.clone())
    }

    pub fn status(&self, run_id: RunId) -> Option<RunStatus> {
        let active = self.active.lock();
        if let Some(run) = active.get(&run_id) {
            return Some(run.record.status);
        }
        self.finished
            .lock()
            .peek(&run_id)
            .map(|run| run.record.status)
    }

    /// Messages an active run has produced so far.
    pub fn new_messages(&self, run_id: RunId) -> Option<Vec<ConversationMessage>> {
        self.active
            .lock()
            .get(&run_id)
            .map(|run| run.store.messages_for_run(run_id, run.store_offset))
    }

    pub fn finished(&self, run_id: RunId) -> Option<FinishedRun> {
        let _active = self.active.lock();
        self.finished.lock().get(&run_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::{ConversationId, ConversationMessage};
    use crate::infrastructure::repositories::InMemoryConversationRepository;

    fn store() -> Arc<MessageStore> {
        Arc::new(MessageStore::new(
            ConversationId::from("c"),
            Arc::new(InMemoryConversationRepository::new()),
        ))
    }

    #[tokio::test]
    async fn test_finish_removes_exactly_once() {
        let registry = RunRegistry::new(8);
        let store = store();
        store.append(ConversationMessage::user("CEO", None, "before")).await.unwrap();
        let record = RunRecord::new(ConversationId::from("c"), "CEO");
        let run_id = record.run_id;
        registry.register(record, store.clone());
        registry.mark_streaming(run_id);
        assert_eq!(registry.status(run_id), Some(RunStatus::Streaming));

        store
            .append(ConversationMessage::user("CEO", None, "during").with_run(run_id, None))
            .await
            .unwrap();

        assert!(registry.finish(run_id, RunStatus::Completed));
        assert!(!registry.finish(run_id, RunStatus::Errored));
        assert!(!registry.is_active(run_id));

        let finished = registry.finished(run_id).unwrap();
        assert_eq!(finished.record.status, RunStatus::Completed);
        assert_eq!(finished.new_messages.len(), 1);
        assert_eq!(finished.new_messages[0].content_str(), "during");
    }

    #[test]
    fn test_finished_cache_is_bounded() {
        let registry = RunRegistry::new(1);
        let store = store();
        let a = RunRecord::new(ConversationId::from("c"), "CEO");
        let b = RunRecord::new(ConversationId::from("c"), "CEO");
        let (a_id, b_id) = (a.run_id, b.run_id);
        registry.register(a, store.clone());
        registry.register(b, store);
        assert_eq!(registry.active_count(), 2);
        registry.finish(a_id, RunStatus::Completed);
        registry.finish(b_id, RunStatus::Cancelled);
        assert!(registry.finished(a_id).is_none());
        assert_eq!(registry.status(b_id), Some(RunStatus::Cancelled));
    }
}
