// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Conversation messages and the identifiers that key them.
//!
//! A conversation is a single flat log. Who said what to whom is carried on
//! every message (`agent` / `caller_agent`), and nested delegation hops are
//! linked through `run_id` / `parent_run_id`, so the full call tree can be
//! rebuilt from the log alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Identifier of one supervised run (a top-level interaction or a nested hop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn parse(value: &str) -> Result<Self, uuid::Error> {
        Uuid::parse_str(value).map(Self)
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Key of one logical conversation thread. Client supplied or generated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ConversationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    ToolCall,
    ToolResult,
    System,
}

impl MessageRole {
    /// Roles whose `content` must be present (an absent value is stored as "").
    pub fn requires_content(&self) -> bool {
        !matches!(self, MessageRole::ToolCall)
    }
}

/// One entry of the conversation log. Never mutated once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: MessageRole,
    #[serde(default)]
    pub content: Option<String>,
    /// Agent that wrote (or received) this message.
    pub agent: String,
    /// Sending agent; `None` means the external user.
    #[serde(default)]
    pub caller_agent: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_run_id: Option<RunId>,
}

impl ConversationMessage {
    fn base(role: MessageRole, agent: &str, caller_agent: Option<&str>) -> Self {
        Self {
            id: None,
            role,
            content: None,
            agent: agent.to_string(),
            caller_agent: caller_agent.map(str::to_string),
            timestamp: Utc::now(),
            tool_call_id: None,
            tool_name: None,
            arguments: None,
            run_id: None,
            parent_run_id: None,
        }
    }

    pub fn user(agent: &str, caller_agent: Option<&str>, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::base(MessageRole::User, agent, caller_agent)
        }
    }

    pub fn assistant(agent: &str, caller_agent: Option<&str>, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::base(MessageRole::Assistant, agent, caller_agent)
        }
    }

    pub fn system(agent: &str, content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::base(MessageRole::System, agent, None)
        }
    }

    pub fn tool_call(
        agent: &str,
        caller_agent: Option<&str>,
        call_id: &str,
        tool_name: &str,
        arguments: Value,
    ) -> Self {
        Self {
            tool_call_id: Some(call_id.to_string()),
            tool_name: Some(tool_name.to_string()),
            arguments: Some(arguments),
            ..Self::base(MessageRole::ToolCall, agent, caller_agent)
        }
    }

    pub fn tool_result(
        agent: &str,
        caller_agent: Option<&str>,
        call_id: &str,
        tool_name: &str,
        output: impl Into<String>,
    ) -> Self {
        Self {
            content: Some(output.into()),
            tool_call_id: Some(call_id.to_string()),
            tool_name: Some(tool_name.to_string()),
            ..Self::base(MessageRole::ToolResult, agent, caller_agent)
        }
    }

    /// Associates the message with a run and, for nested hops, its parent.
    pub fn with_run(mut self, run_id: RunId, parent_run_id: Option<RunId>) -> Self {
        self.run_id = Some(run_id);
        self.parent_run_id = parent_run_id;
        self
    }

    /// True when the message belongs to the shared, user-facing thread.
    pub fn is_user_thread(&self) -> bool {
        self.caller_agent.is_none()
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_call_does_not_require_content() {
        assert!(!MessageRole::ToolCall.requires_content());
        assert!(MessageRole::ToolResult.requires_content());
        assert!(MessageRole::Assistant.requires_content());
    }

    #[test]
    fn test_message_serializes_snake_case_role() {
        let msg = ConversationMessage::tool_call("CEO", None, "call_1", "send_message_to_Support", serde_json::json!({"message": "hi"}));
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "tool_call");
        assert_eq!(value["caller_agent"], Value::Null);
        assert!(value.get("run_id").is_none());
    }

    #[test]
    fn test_run_id_parse() {
        let id = RunId::new();
        assert_eq!(RunId::parse(&id.to_string()).unwrap(), id);
        assert!(RunId::parse("not-a-uuid").is_err());
    }
}
