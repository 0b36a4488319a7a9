// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Deterministic completion service for tests and offline demos.
//
// A responder closure decides each turn from the request it receives. Text is
// streamed word by word, optionally with a delay per chunk so cancellation
// and backpressure paths can be exercised.

use crate::domain::llm::{
    CompletionEvent, CompletionRequest, CompletionService, CompletionStream, LLMError,
    ToolCallRequest,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// What the scripted model does in one turn.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTurn {
    pub text: Option<String>,
    pub tool_calls: Vec<(String, Value)>,
    pub error: Option<String>,
}

impl ScriptedTurn {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            tool_calls: vec![(name.into(), arguments)],
            ..Default::default()
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn and_tool_call(mut self, name: impl Into<String>, arguments: Value) -> Self {
        self.tool_calls.push((name.into(), arguments));
        self
    }
}

type Responder = dyn Fn(&CompletionRequest) -> ScriptedTurn + Send + Sync;

pub struct ScriptedCompletionService {
    responder: Box<Responder>,
    chunk_delay: Option<Duration>,
    requests: Mutex<Vec<CompletionRequest>>,
    call_ids: AtomicUsize,
}

impl ScriptedCompletionService {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> ScriptedTurn + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            chunk_delay: None,
            requests: Mutex::new(Vec::new()),
            call_ids: AtomicUsize::new(0),
        }
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Every request seen so far, in arrival order.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletionService {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionStream, LLMError> {
        let turn = (self.responder)(&request);
        self.requests.lock().push(request);

        if let Some(error) = turn.error {
            return Err(LLMError::Provider(error));
        }

        let mut events = Vec::new();
        if let Some(text) = turn.text {
            events.extend(
                text.split_inclusive(' ')
                    .map(|chunk| CompletionEvent::TextDelta(chunk.to_string())),
            );
        }
        for (name, arguments) in turn.tool_calls {
            let n = self.call_ids.fetch_add(1, Ordering::SeqCst) + 1;
            events.push(CompletionEvent::ToolCall(ToolCallRequest {
                id: format!("call_{n}"),
                name,
                arguments,
            }));
        }

        let delay = self.chunk_delay;
        Ok(Box::pin(async_stream::stream! {
            for event in events {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(event);
            }
        }))
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::GenerationOptions;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_text_is_chunked_by_word() {
        let service = ScriptedCompletionService::new(|_| ScriptedTurn::text("hello there world"));
        let request = CompletionRequest {
            agent: "CEO".into(),
            model: "default".into(),
            instructions: String::new(),
            messages: vec![],
            tools: vec![],
            options: GenerationOptions::default(),
        };
        let events: Vec<_> = service.complete(request).await.unwrap().collect().await;
        let text: String = events
            .into_iter()
            .map(|e| match e {
                Ok(CompletionEvent::TextDelta(t)) => t,
                _ => String::new(),
            })
            .collect();
        assert_eq!(text, "hello there world");
        assert_eq!(service.call_count(), 1);
    }
}
