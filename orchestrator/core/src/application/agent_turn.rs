// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent turn runner
//!
//! The single "run one agent" dispatcher. Top-level runs and every
//! delegation hop go through [`AgentRunner::run_agent`]; recursion happens
//! through a boxed future, bounded by the turn budget and the delegation
//! depth ceiling carried in [`RunScope`], never by the host call stack.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Drive model turns, record them in the log, execute tools

use crate::application::error::RunError;
use crate::application::messenger::InterAgentMessenger;
use crate::application::scope::RunScope;
use crate::domain::agent::Agent;
use crate::domain::config::RuntimeSettings;
use crate::domain::events::RunEvent;
use crate::domain::llm::{
    CompletionEvent, CompletionRequest, CompletionService, PromptMessage, ToolCallRequest,
};
use crate::domain::lock::{CallTracker, GuardLease};
use crate::domain::message::{ConversationMessage, MessageRole};
use crate::domain::tool::{Capability, ToolError, ToolSchema};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::remote_tool::RemoteToolExecutor;
use futures::future::BoxFuture;
use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct AgentRunner {
    completions: Arc<dyn CompletionService>,
    remote: RemoteToolExecutor,
    events: EventBus,
    settings: Arc<RuntimeSettings>,
}

impl AgentRunner {
    pub fn new(
        completions: Arc<dyn CompletionService>,
        settings: Arc<RuntimeSettings>,
        events: EventBus,
    ) -> Self {
        Self {
            completions,
            remote: RemoteToolExecutor::default(),
            events,
            settings,
        }
    }

    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Runs `recipient` on `message` until it answers without calling tools.
    ///
    /// `caller == None` means the message comes from the external user.
    pub fn run_agent<'a>(
        &'a self,
        scope: &'a RunScope,
        recipient: &'a str,
        message: &'a str,
        caller: Option<&'a str>,
    ) -> BoxFuture<'a, Result<String, RunError>> {
        Box::pin(self.run_turns(scope, recipient, message, caller))
    }

    async fn run_turns(
        &self,
        scope: &RunScope,
        recipient: &str,
        message: &str,
        caller: Option<&str>,
    ) -> Result<String, RunError> {
        let agent = scope
            .directory
            .agent(recipient)
            .ok_or_else(|| RunError::UnknownAgent(recipient.to_string()))?;
        let capabilities = scope.directory.capabilities(recipient);
        let schemas: Vec<ToolSchema> = capabilities.iter().map(Capability::schema).collect();

        self.record(scope, ConversationMessage::user(recipient, caller, message))
            .await?;

        for turn in 1..=self.settings.max_turns {
            if scope.cancellation.should_stop_before_turn() {
                info!(run_id = %scope.run_id, agent = recipient, "Stopping before next turn");
                return Err(RunError::Cancelled);
            }
            scope.sink.ensure_open()?;
            scope
                .sink
                .emit(RunEvent::TurnStarted {
                    agent: recipient.to_string(),
                    caller_agent: caller.map(str::to_string),
                    turn,
                    depth: scope.depth,
                })
                .await?;
            if let Some(hooks) = &scope.hooks {
                hooks.on_turn_start(recipient, turn).await;
            }

            let request = CompletionRequest {
                agent: recipient.to_string(),
                model: agent.model().to_string(),
                instructions: agent.instructions().to_string(),
                messages: build_prompt(&scope.store.history_for(recipient, caller)),
                tools: schemas.clone(),
                options: agent.options().clone(),
            };
            let (text, calls) = self.stream_turn(scope, recipient, caller, request).await?;

            if !text.is_empty() || calls.is_empty() {
                self.record(
                    scope,
                    ConversationMessage::assistant(recipient, caller, text.clone()),
                )
                .await?;
            }
            if calls.is_empty() {
                debug!(run_id = %scope.run_id, agent = recipient, turn, "Agent answered");
                return Ok(text);
            }

            for call in calls {
                self.record(
                    scope,
                    ConversationMessage::tool_call(
                        recipient,
                        caller,
                        &call.id,
                        &call.name,
                        call.arguments.clone(),
                    ),
                )
                .await?;
                scope
                    .sink
                    .emit(RunEvent::ToolCall {
                        agent: recipient.to_string(),
                        caller_agent: caller.map(str::to_string),
                        call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        arguments: call.arguments.clone(),
                    })
                    .await?;
                if let Some(hooks) = &scope.hooks {
                    hooks.on_tool_start(recipient, &call.name, &call.arguments).await;
                }

                let output = self
                    .invoke(scope, &agent, caller, &capabilities, &call)
                    .await;

                self.record(
                    scope,
                    ConversationMessage::tool_result(
                        recipient, caller, &call.id, &call.name, output.clone(),
                    ),
                )
                .await?;
                scope
                    .sink
                    .emit(RunEvent::ToolResult {
                        agent: recipient.to_string(),
                        caller_agent: caller.map(str::to_string),
                        call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        output: output.clone(),
                    })
                    .await?;
                if let Some(hooks) = &scope.hooks {
                    hooks.on_tool_end(recipient, &call.name, &output).await;
                }
            }
        }

        Err(RunError::MaxTurnsExceeded {
            agent: recipient.to_string(),
            max_turns: self.settings.max_turns,
        })
    }

    /// One model turn: forwards text deltas, collects tool calls.
    async fn stream_turn(
        &self,
        scope: &RunScope,
        recipient: &str,
        caller: Option<&str>,
        request: CompletionRequest,
    ) -> Result<(String, Vec<ToolCallRequest>), RunError> {
        let started = tokio::select! {
            biased;
            _ = scope.cancellation.immediate_cancelled() => None,
            result = self.completions.complete(request) => Some(result),
        };
        let mut stream = match started {
            Some(result) => result?,
            None => return Err(RunError::Cancelled),
        };

        let mut text = String::new();
        let mut calls = Vec::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = scope.cancellation.immediate_cancelled() => return Err(RunError::Cancelled),
                next = stream.next() => next,
            };
            match next {
                None => break,
                Some(Err(e)) => return Err(e.into()),
                Some(Ok(CompletionEvent::TextDelta(delta))) => {
                    text.push_str(&delta);
                    scope
                        .sink
                        .emit(RunEvent::TextDelta {
                            agent: recipient.to_string(),
                            caller_agent: caller.map(str::to_string),
                            delta,
                        })
                        .await?;
                }
                Some(Ok(CompletionEvent::ToolCall(call))) => calls.push(call),
            }
        }
        Ok((text, calls))
    }

    /// Tool invocation wrapper. Never fails: errors become text for the model.
    async fn invoke(
        &self,
        scope: &RunScope,
        agent: &Arc<Agent>,
        caller: Option<&str>,
        capabilities: &[Capability],
        call: &ToolCallRequest,
    ) -> String {
        let Some(capability) = capabilities.iter().find(|c| c.name() == call.name) else {
            return tool_error_text(&ToolError::NotFound(call.name.clone()));
        };

        // Held until the call returns; dropping releases the guard.
        let guard = agent.guard();
        let permit: Result<(Option<GuardLease>, Option<CallTracker>), _> =
            if capability.one_call_at_a_time() {
                guard.try_lease(&call.name).map(|lease| (Some(lease), None))
            } else {
                guard.try_track(&call.name).map(|tracker| (None, Some(tracker)))
            };
        let (_lease, _tracker) = match permit {
            Ok(permit) => permit,
            Err(e) => {
                warn!(agent = agent.name(), tool = %call.name, "Tool call rejected: {}", e);
                metrics::counter!("switchboard_guard_rejections_total").increment(1);
                return tool_error_text(&ToolError::Busy(e));
            }
        };

        let result = match capability {
            Capability::Local(tool) => {
                let ctx = scope.tool_context(agent.name(), caller);
                tool.call(call.arguments.clone(), &ctx).await
            }
            Capability::RemoteEndpoint(tool) => self.remote.call(tool, call.arguments.clone()).await,
            Capability::SendToAgent(target) => Ok(InterAgentMessenger::new(self)
                .deliver(scope, target, &call.arguments)
                .await),
        };

        match result {
            Ok(output) => output,
            Err(e) => {
                warn!(agent = agent.name(), tool = %call.name, "Tool call failed: {}", e);
                tool_error_text(&e)
            }
        }
    }

    async fn record(
        &self,
        scope: &RunScope,
        message: ConversationMessage,
    ) -> Result<ConversationMessage, RunError> {
        let message = message.with_run(scope.run_id, scope.parent_run_id);
        Ok(scope.store.append(message).await?)
    }
}

fn tool_error_text(error: &ToolError) -> String {
    format!("Error: {error}")
}

/// Turns a slice of the log into the prompt a completion service expects.
///
/// Consecutive tool-call entries are folded into the assistant message that
/// precedes them.
pub fn build_prompt(history: &[ConversationMessage]) -> Vec<PromptMessage> {
    let mut prompt: Vec<PromptMessage> = Vec::with_capacity(history.len());
    for message in history {
        match message.role {
            MessageRole::User => prompt.push(PromptMessage::User {
                content: message.content_str().to_string(),
            }),
            MessageRole::System => prompt.push(PromptMessage::System {
                content: message.content_str().to_string(),
            }),
            MessageRole::Assistant => prompt.push(PromptMessage::Assistant {
                content: Some(message.content_str().to_string()),
                tool_calls: Vec::new(),
            }),
            MessageRole::ToolCall => {
                let call = ToolCallRequest {
                    id: message.tool_call_id.clone().unwrap_or_default(),
                    name: message.tool_name.clone().unwrap_or_default(),
                    arguments: message.arguments.clone().unwrap_or_default(),
                };
                match prompt.last_mut() {
                    Some(PromptMessage::Assistant { tool_calls, .. }) => tool_calls.push(call),
                    _ => prompt.push(PromptMessage::Assistant {
                        content: None,
                        tool_calls: vec![call],
                    }),
                }
            }
            MessageRole::ToolResult => prompt.push(PromptMessage::Tool {
                call_id: message.tool_call_id.clone().unwrap_or_default(),
                content: message.content_str().to_string(),
            }),
        }
    }
    prompt
}
