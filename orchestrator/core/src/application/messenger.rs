// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Inter-agent messenger
//!
//! Executes a delegation action: a nested run of the recipient agent inside
//! the caller's conversation. The action always yields text. The recipient's
//! final answer comes back on success, and any failure is stringified so the
//! calling turn continues and decides what to do next.

use crate::application::agent_turn::AgentRunner;
use crate::application::error::RunError;
use crate::application::scope::RunScope;
use crate::domain::events::RunLifecycleEvent;
use crate::domain::tool::DelegationTarget;
use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
enum DelegationError {
    #[error("invalid arguments for `{action}`: {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("`{sender}` is not permitted to message `{recipient}`")]
    EdgeNotPermitted { sender: String, recipient: String },

    #[error("maximum delegation depth ({max_depth}) reached; `{recipient}` was not contacted")]
    DepthExceeded { max_depth: u32, recipient: String },

    #[error("`{recipient}` failed: {source}")]
    Run {
        recipient: String,
        #[source]
        source: RunError,
    },
}

pub struct InterAgentMessenger<'a> {
    runner: &'a AgentRunner,
}

impl<'a> InterAgentMessenger<'a> {
    pub fn new(runner: &'a AgentRunner) -> Self {
        Self { runner }
    }

    /// Delivers `arguments.message` to the target's recipient and returns its reply.
    pub async fn deliver(&self, scope: &RunScope, target: &DelegationTarget, arguments: &Value) -> String {
        match self.try_deliver(scope, target, arguments).await {
            Ok(reply) => {
                metrics::counter!("switchboard_delegations_total", "outcome" => "ok").increment(1);
                reply
            }
            Err(e) => {
                metrics::counter!("switchboard_delegations_total", "outcome" => "error").increment(1);
                warn!(
                    run_id = %scope.run_id,
                    sender = %target.sender,
                    recipient = %target.recipient,
                    "Delegation failed: {}", e
                );
                format!("Error: {e}")
            }
        }
    }

    async fn try_deliver(
        &self,
        scope: &RunScope,
        target: &DelegationTarget,
        arguments: &Value,
    ) -> Result<String, DelegationError> {
        let message = parse_message(&target.action_name, arguments)?;

        if !scope.directory.can_send(&target.sender, &target.recipient) {
            return Err(DelegationError::EdgeNotPermitted {
                sender: target.sender.clone(),
                recipient: target.recipient.clone(),
            });
        }

        let max_depth = self.runner.settings().max_depth;
        if scope.depth + 1 > max_depth {
            return Err(DelegationError::DepthExceeded {
                max_depth,
                recipient: target.recipient.clone(),
            });
        }

        let nested = scope.nested();
        debug!(
            run_id = %nested.run_id,
            parent_run_id = %scope.run_id,
            sender = %target.sender,
            recipient = %target.recipient,
            depth = nested.depth,
            "Delegating"
        );
        self.runner.events().publish(RunLifecycleEvent::DelegationStarted {
            run_id: nested.run_id,
            parent_run_id: scope.run_id,
            sender: target.sender.clone(),
            recipient: target.recipient.clone(),
            depth: nested.depth,
            started_at: Utc::now(),
        });

        let result = self
            .runner
            .run_agent(&nested, &target.recipient, &message, Some(&target.sender))
            .await;

        self.runner.events().publish(RunLifecycleEvent::DelegationFinished {
            run_id: nested.run_id,
            recipient: target.recipient.clone(),
            succeeded: result.is_ok(),
            finished_at: Utc::now(),
        });

        result.map_err(|source| DelegationError::Run {
            recipient: target.recipient.clone(),
            source,
        })
    }
}

fn parse_message(action: &str, arguments: &Value) -> Result<String, DelegationError> {
    let invalid = |reason: &str| DelegationError::InvalidArguments {
        action: action.to_string(),
        reason: reason.to_string(),
    };
    let message = match arguments {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .ok_or_else(|| invalid("expected a string field `message`"))?,
        // Some models send the bare string instead of an object.
        Value::String(text) => text.as_str(),
        _ => return Err(invalid("expected an object like {\"message\": \"...\"}")),
    };
    if message.trim().is_empty() {
        return Err(invalid("`message` must not be empty"));
    }
    Ok(message.to_string())
}
