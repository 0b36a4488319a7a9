// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::application::event_sink::EventSink;
use crate::domain::directory::AgentDirectory;
use crate::domain::hooks::RunHooks;
use crate::domain::message::{ConversationId, RunId};
use crate::domain::run::RunCancellation;
use crate::domain::tool::ToolContext;
use crate::infrastructure::message_store::MessageStore;
use serde_json::Value;
use std::sync::Arc;

/// Everything one agent invocation needs, passed explicitly down the call tree.
#[derive(Clone)]
pub struct RunScope {
    pub run_id: RunId,
    pub parent_run_id: Option<RunId>,
    pub conversation_id: ConversationId,
    pub store: Arc<MessageStore>,
    pub directory: Arc<dyn AgentDirectory>,
    pub sink: EventSink,
    pub cancellation: RunCancellation,
    pub app_context: Arc<Value>,
    /// Present on the top-level run only.
    pub hooks: Option<Arc<dyn RunHooks>>,
    /// Delegation hops below the top-level agent.
    pub depth: u32,
}

impl RunScope {
    /// Scope for a delegation hop: same conversation, sink and cancellation,
    /// a fresh run id parented to this one, and no hooks.
    pub fn nested(&self) -> Self {
        Self {
            run_id: RunId::new(),
            parent_run_id: Some(self.run_id),
            conversation_id: self.conversation_id.clone(),
            store: Arc::clone(&self.store),
            directory: Arc::clone(&self.directory),
            sink: self.sink.clone(),
            cancellation: self.cancellation.clone(),
            app_context: Arc::clone(&self.app_context),
            hooks: None,
            depth: self.depth + 1,
        }
    }

    pub fn tool_context(&self, agent: &str, caller_agent: Option<&str>) -> ToolContext {
        ToolContext {
            agent: agent.to_string(),
            caller_agent: caller_agent.map(str::to_string),
            conversation_id: self.conversation_id.clone(),
            run_id: self.run_id,
            app_context: Arc::clone(&self.app_context),
        }
    }
}
