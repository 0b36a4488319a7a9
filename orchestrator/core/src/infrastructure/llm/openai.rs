// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// OpenAI Completion Adapter
//
// Anti-Corruption Layer for the OpenAI chat completions API with tool calling.
// Also works with OpenAI-compatible APIs (LM Studio, vLLM, etc.)

use crate::domain::llm::{
    CompletionEvent, CompletionRequest, CompletionService, CompletionStream, LLMError,
    PromptMessage, ToolCallRequest,
};
use async_trait::async_trait;
use futures::stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub struct OpenAIAdapter {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    name: String,
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAITool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Default)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(rename = "type", default = "function_type")]
    call_type: String,
    function: OpenAIFunctionCall,
}

#[derive(Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded arguments, as the API transmits them
    arguments: String,
}

#[derive(Serialize)]
struct OpenAITool {
    #[serde(rename = "type")]
    tool_type: &'static str,
    function: OpenAIFunction,
}

#[derive(Serialize)]
struct OpenAIFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

fn function_type() -> String {
    "function".to_string()
}

impl OpenAIAdapter {
    pub fn new(name: impl Into<String>, endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            name: name.into(),
        }
    }

    fn translate(request: &CompletionRequest) -> OpenAIRequest {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.instructions.is_empty() {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: Some(request.instructions.clone()),
                ..Default::default()
            });
        }
        for message in &request.messages {
            messages.push(match message {
                PromptMessage::System { content } => OpenAIMessage {
                    role: "system".to_string(),
                    content: Some(content.clone()),
                    ..Default::default()
                },
                PromptMessage::User { content } => OpenAIMessage {
                    role: "user".to_string(),
                    content: Some(content.clone()),
                    ..Default::default()
                },
                PromptMessage::Assistant { content, tool_calls } => OpenAIMessage {
                    role: "assistant".to_string(),
                    content: content.clone(),
                    tool_calls: (!tool_calls.is_empty()).then(|| {
                        tool_calls
                            .iter()
                            .map(|call| OpenAIToolCall {
                                id: call.id.clone(),
                                call_type: function_type(),
                                function: OpenAIFunctionCall {
                                    name: call.name.clone(),
                                    arguments: call.arguments.to_string(),
                                },
                            })
                            .collect()
                    }),
                    ..Default::default()
                },
                PromptMessage::Tool { call_id, content } => OpenAIMessage {
                    role: "tool".to_string(),
                    content: Some(content.clone()),
                    tool_call_id: Some(call_id.clone()),
                    ..Default::default()
                },
            });
        }

        OpenAIRequest {
            model: request.model.clone(),
            messages,
            tools: request
                .tools
                .iter()
                .map(|tool| OpenAITool {
                    tool_type: "function",
                    function: OpenAIFunction {
                        name: tool.name.clone(),
                        description: tool.description.clone(),
                        parameters: tool.parameters.clone(),
                    },
                })
                .collect(),
            max_tokens: request.options.max_tokens,
            temperature: request.options.temperature,
            stop: request.options.stop_sequences.clone(),
        }
    }
}

#[async_trait]
impl CompletionService for OpenAIAdapter {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionStream, LLMError> {
        let body = Self::translate(&request);
        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();

            return Err(if status == 401 || status == 403 {
                LLMError::Authentication(error_text)
            } else if status == 429 {
                LLMError::RateLimit
            } else if status == 404 {
                LLMError::ModelNotFound(request.model.clone())
            } else {
                LLMError::Provider(format!("HTTP {}: {}", status, error_text))
            });
        }

        let parsed: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Provider(format!("Failed to parse response: {}", e)))?;

        let message = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LLMError::Provider("No response from model".into()))?
            .message;

        let mut events = Vec::new();
        if let Some(text) = message.content.filter(|t| !t.is_empty()) {
            events.push(Ok(CompletionEvent::TextDelta(text)));
        }
        for call in message.tool_calls.unwrap_or_default() {
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            events.push(Ok(CompletionEvent::ToolCall(ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments,
            })));
        }
        Ok(Box::pin(stream::iter(events)))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        let url = format!("{}/models", self.endpoint.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else if response.status() == 401 || response.status() == 403 {
            Err(LLMError::Authentication("Invalid API key".into()))
        } else {
            Err(LLMError::Network(format!("HTTP {}", response.status())))
        }
    }

    fn provider_name(&self) -> &str {
        &self.name
    }
}
