// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Runs, their lifecycle states, and the two-mode cancellation token.

use crate::domain::message::{ConversationId, ConversationMessage, RunId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// `Pending -> Streaming -> {Completed | Cancelled | Errored}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Streaming => "streaming",
            RunStatus::Completed => "completed",
            RunStatus::Cancelled => "cancelled",
            RunStatus::Errored => "errored",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CancelMode {
    /// Stop delivering events and abort the producer at its next check.
    #[default]
    Immediate,
    /// Let the in-flight model turn finish, then stop before the next one.
    AfterTurn,
}

/// Cancellation shared by a run and every nested hop it spawns.
///
/// Two seams consult it: the turn runner before starting each model turn
/// (`should_stop_before_turn`) and the event sink before emitting each event
/// (`is_immediate`).
#[derive(Debug, Clone, Default)]
pub struct RunCancellation {
    immediate: CancellationToken,
    after_turn: Arc<AtomicBool>,
}

impl RunCancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self, mode: CancelMode) {
        match mode {
            CancelMode::Immediate => self.immediate.cancel(),
            CancelMode::AfterTurn => self.after_turn.store(true, Ordering::SeqCst),
        }
    }

    pub fn is_immediate(&self) -> bool {
        self.immediate.is_cancelled()
    }

    pub fn is_after_turn(&self) -> bool {
        self.after_turn.load(Ordering::SeqCst)
    }

    pub fn should_stop_before_turn(&self) -> bool {
        self.is_immediate() || self.is_after_turn()
    }

    pub fn requested_mode(&self) -> Option<CancelMode> {
        if self.is_immediate() {
            Some(CancelMode::Immediate)
        } else if self.is_after_turn() {
            Some(CancelMode::AfterTurn)
        } else {
            None
        }
    }

    /// Resolves once an immediate cancellation is requested.
    pub async fn immediate_cancelled(&self) {
        self.immediate.cancelled().await
    }
}

/// Bookkeeping for one top-level run.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub run_id: RunId,
    pub parent_run_id: Option<RunId>,
    pub conversation_id: ConversationId,
    pub agent: String,
    pub status: RunStatus,
    pub cancellation: RunCancellation,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn new(conversation_id: ConversationId, agent: &str) -> Self {
        Self {
            run_id: RunId::new(),
            parent_run_id: None,
            conversation_id,
            agent: agent.to_string(),
            status: RunStatus::Pending,
            cancellation: RunCancellation::new(),
            created_at: Utc::now(),
        }
    }
}

/// Answer to a cancel request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub run_id: RunId,
    pub status: RunStatus,
    /// False when the run had already finished before the request arrived.
    pub cancelled: bool,
    /// Messages the run produced since it was registered.
    pub new_messages: Vec<ConversationMessage>,
}
