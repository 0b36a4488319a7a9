// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Llm
//!
//! Completion service contract consumed by the agent turn runner.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between turns and hosted models

// The completion service is an external collaborator: a request goes in and a
// stream of text deltas and tool-call selections comes out. Concrete adapters
// live in infrastructure/llm/.

use crate::domain::tool::ToolSchema;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Domain interface for completion providers
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Start one model turn and stream its output
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionStream, LLMError>;

    /// Check if provider is healthy and accessible
    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }

    fn provider_name(&self) -> &str;
}

pub type CompletionStream = BoxStream<'static, Result<CompletionEvent, LLMError>>;

/// Options for LLM generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Maximum tokens to generate
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default)]
    pub temperature: Option<f32>,

    /// Sequences that stop generation
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            max_tokens: Some(4096),
            temperature: Some(0.7),
            stop_sequences: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub agent: String,
    /// Opaque model reference (an alias resolved by the provider registry)
    pub model: String,
    pub instructions: String,
    pub messages: Vec<PromptMessage>,
    pub tools: Vec<ToolSchema>,
    pub options: GenerationOptions,
}

impl CompletionRequest {
    pub fn last_message(&self) -> Option<&PromptMessage> {
        self.messages.last()
    }

    /// Content of the most recent user message, if any.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages.iter().rev().find_map(|m| match m {
            PromptMessage::User { content } => Some(content.as_str()),
            _ => None,
        })
    }

    /// Content of the most recent tool result when it is the last message.
    pub fn pending_tool_result(&self) -> Option<&str> {
        match self.messages.last() {
            Some(PromptMessage::Tool { content, .. }) => Some(content.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum PromptMessage {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
    },
    Tool {
        call_id: String,
        content: String,
    },
}

/// A tool the model selected during a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CompletionEvent {
    TextDelta(String),
    ToolCall(ToolCallRequest),
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
