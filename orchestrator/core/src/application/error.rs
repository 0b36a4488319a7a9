// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::llm::LLMError;
use crate::infrastructure::message_store::MessageStoreError;

/// Failure of an agent run or of the run coordinator.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("run cancelled")]
    Cancelled,

    #[error("stream consumer disconnected")]
    Disconnected,

    #[error("stream consumer stalled for more than {0} ms; stream closed")]
    StreamTimeout(u64),

    #[error("agent `{agent}` exceeded the maximum of {max_turns} turns")]
    MaxTurnsExceeded { agent: String, max_turns: u32 },

    #[error("unknown agent `{0}`")]
    UnknownAgent(String),

    #[error("agent `{0}` is not an entry point")]
    NotEntryPoint(String),

    #[error("completion failed: {0}")]
    Completion(#[from] LLMError),

    #[error(transparent)]
    Store(#[from] MessageStoreError),
}

impl RunError {
    /// Cancellation and disconnect both end a run without an error event.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RunError::Cancelled | RunError::Disconnected)
    }
}
