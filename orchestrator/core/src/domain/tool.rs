// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent capabilities.
//!
//! An agent's callable surface is a closed set built once when the
//! communication graph is constructed: locally implemented tools, remote
//! endpoint actions, and one delegation action per permitted recipient.

use crate::domain::lock::GuardError;
use crate::domain::message::{ConversationId, RunId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;

/// Prefix of every generated delegation action.
pub const DELEGATION_PREFIX: &str = "send_message_to_";

/// Schema a completion service sees for one capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments for `{tool}`: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error(transparent)]
    Busy(#[from] GuardError),

    #[error("tool `{0}` is not available to this agent")]
    NotFound(String),

    #[error("remote endpoint returned {status}: {body}")]
    Remote { status: u16, body: String },

    #[error("execution failed: {0}")]
    Execution(String),
}

/// What a running tool may know about its surroundings.
///
/// Run hooks are deliberately absent: they belong to the top-level run only.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub agent: String,
    pub caller_agent: Option<String>,
    pub conversation_id: ConversationId,
    pub run_id: RunId,
    pub app_context: Arc<Value>,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the accepted arguments.
    fn parameters(&self) -> Value;

    /// Whether invocations must hold the agent's guard exclusively.
    fn one_call_at_a_time(&self) -> bool {
        false
    }

    async fn call(&self, args: Value, ctx: &ToolContext) -> Result<String, ToolError>;
}

/// A remote action already converted from an endpoint description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEndpointTool {
    pub name: String,
    pub description: String,
    #[serde(default = "empty_object_schema")]
    pub parameters: Value,
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub one_call_at_a_time: bool,
}

fn empty_object_schema() -> Value {
    json!({"type": "object", "properties": {}})
}

fn default_method() -> String {
    "POST".to_string()
}

/// Wiring of one permitted edge, stored on the sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationTarget {
    pub sender: String,
    pub recipient: String,
    pub action_name: String,
    pub description: String,
    pub one_call_at_a_time: bool,
}

impl DelegationTarget {
    pub fn new(sender: &str, recipient: &str, recipient_description: &str) -> Self {
        let description = if recipient_description.is_empty() {
            format!("Send a message to the `{recipient}` agent and receive its reply.")
        } else {
            format!(
                "Send a message to the `{recipient}` agent and receive its reply. {recipient}: {recipient_description}"
            )
        };
        Self {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            action_name: delegation_action_name(recipient),
            description,
            one_call_at_a_time: false,
        }
    }
}

#[derive(Clone)]
pub enum Capability {
    Local(Arc<dyn Tool>),
    RemoteEndpoint(RemoteEndpointTool),
    SendToAgent(DelegationTarget),
}

impl Capability {
    pub fn name(&self) -> &str {
        match self {
            Capability::Local(tool) => tool.name(),
            Capability::RemoteEndpoint(tool) => &tool.name,
            Capability::SendToAgent(target) => &target.action_name,
        }
    }

    pub fn schema(&self) -> ToolSchema {
        match self {
            Capability::Local(tool) => ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            },
            Capability::RemoteEndpoint(tool) => ToolSchema {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: tool.parameters.clone(),
            },
            Capability::SendToAgent(target) => ToolSchema {
                name: target.action_name.clone(),
                description: target.description.clone(),
                parameters: message_schema(),
            },
        }
    }

    pub fn one_call_at_a_time(&self) -> bool {
        match self {
            Capability::Local(tool) => tool.one_call_at_a_time(),
            Capability::RemoteEndpoint(tool) => tool.one_call_at_a_time,
            Capability::SendToAgent(target) => target.one_call_at_a_time,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Local(tool) => f.debug_tuple("Local").field(&tool.name()).finish(),
            Capability::RemoteEndpoint(tool) => {
                f.debug_tuple("RemoteEndpoint").field(&tool.name).finish()
            }
            Capability::SendToAgent(target) => {
                f.debug_tuple("SendToAgent").field(&target.recipient).finish()
            }
        }
    }
}

/// Deterministic action name for delegating to `recipient`.
pub fn delegation_action_name(recipient: &str) -> String {
    let sanitized: String = recipient
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("{DELEGATION_PREFIX}{sanitized}")
}

/// Input schema shared by every delegation action.
pub fn message_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "message": {
                "type": "string",
                "description": "The task or question for the recipient agent."
            }
        },
        "required": ["message"],
        "additionalProperties": false
    })
}
