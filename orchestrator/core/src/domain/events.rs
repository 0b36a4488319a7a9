// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::message::{ConversationId, RunId};
use crate::domain::run::RunStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of the end-of-stream sentinel on the SSE wire.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One item of a run's event stream.
///
/// Events from nested delegation hops are interleaved in production order;
/// `agent` / `caller_agent` tell them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Always first. Carries the id used for later cancellation.
    Meta {
        run_id: RunId,
        conversation_id: ConversationId,
        agent: String,
    },
    TurnStarted {
        agent: String,
        caller_agent: Option<String>,
        turn: u32,
        depth: u32,
    },
    TextDelta {
        agent: String,
        caller_agent: Option<String>,
        delta: String,
    },
    ToolCall {
        agent: String,
        caller_agent: Option<String>,
        call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ToolResult {
        agent: String,
        caller_agent: Option<String>,
        call_id: String,
        tool_name: String,
        output: String,
    },
    Completed {
        agent: String,
        final_output: String,
    },
    Error {
        error: String,
    },
    /// End-of-stream sentinel.
    Done,
}

impl RunEvent {
    /// The `data:` payload of this event.
    pub fn sse_data(&self) -> String {
        match self {
            RunEvent::Done => DONE_SENTINEL.to_string(),
            other => serde_json::to_string(other)
                .unwrap_or_else(|e| format!("{{\"type\":\"error\",\"error\":\"{e}\"}}")),
        }
    }

    /// Full SSE frame: `data: <json>\n\n`.
    pub fn sse_frame(&self) -> String {
        format!("data: {}\n\n", self.sse_data())
    }
}

/// Run lifecycle notifications published on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunLifecycleEvent {
    RunStarted {
        run_id: RunId,
        conversation_id: ConversationId,
        agent: String,
        started_at: DateTime<Utc>,
    },
    DelegationStarted {
        run_id: RunId,
        parent_run_id: RunId,
        sender: String,
        recipient: String,
        depth: u32,
        started_at: DateTime<Utc>,
    },
    DelegationFinished {
        run_id: RunId,
        recipient: String,
        succeeded: bool,
        finished_at: DateTime<Utc>,
    },
    RunFinished {
        run_id: RunId,
        status: RunStatus,
        finished_at: DateTime<Utc>,
    },
}

impl RunLifecycleEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            RunLifecycleEvent::RunStarted { run_id, .. }
            | RunLifecycleEvent::DelegationStarted { run_id, .. }
            | RunLifecycleEvent::DelegationFinished { run_id, .. }
            | RunLifecycleEvent::RunFinished { run_id, .. } => *run_id,
        }
    }
}
