// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Remote endpoint execution.
//
// A RemoteEndpointTool is an already-converted HTTP action. The model's JSON
// arguments become the request body (or the query string for GET/DELETE) and
// the response body is handed back to the model as text.

use crate::domain::tool::{RemoteEndpointTool, ToolError};
use serde_json::Value;
use tracing::debug;

#[derive(Clone, Default)]
pub struct RemoteToolExecutor {
    client: reqwest::Client,
}

impl RemoteToolExecutor {
    pub async fn call(&self, tool: &RemoteEndpointTool, args: Value) -> Result<String, ToolError> {
        let method = reqwest::Method::from_bytes(tool.method.to_uppercase().as_bytes())
            .map_err(|e| ToolError::Execution(format!("invalid HTTP method `{}`: {e}", tool.method)))?;

        let mut request = self.client.request(method.clone(), &tool.url);
        for (name, value) in &tool.headers {
            request = request.header(name, value);
        }
        request = if method == reqwest::Method::GET || method == reqwest::Method::DELETE {
            request.query(&query_pairs(&args))
        } else {
            request.json(&args)
        };

        debug!(tool = %tool.name, url = %tool.url, "Calling remote endpoint");
        let response = request
            .send()
            .await
            .map_err(|e| ToolError::Execution(format!("request to {} failed: {e}", tool.url)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ToolError::Execution(format!("failed to read response: {e}")))?;
        if !status.is_success() {
            return Err(ToolError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}

fn query_pairs(args: &Value) -> Vec<(String, String)> {
    match args {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(url: String, method: &str) -> RemoteEndpointTool {
        RemoteEndpointTool {
            name: "lookup_order".into(),
            description: "Find an order".into(),
            parameters: json!({"type": "object"}),
            url,
            method: method.into(),
            headers: vec![("x-api-key".into(), "secret".into())],
            one_call_at_a_time: false,
        }
    }

    #[tokio::test]
    async fn test_post_sends_json_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/orders")
            .match_header("x-api-key", "secret")
            .match_body(mockito::Matcher::Json(json!({"id": 7})))
            .with_status(200)
            .with_body("shipped")
            .create_async()
            .await;

        let executor = RemoteToolExecutor::default();
        let out = executor
            .call(&tool(format!("{}/orders", server.url()), "post"), json!({"id": 7}))
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(out, "shipped");
    }

    #[tokio::test]
    async fn test_non_success_is_remote_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/orders")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "7".into()))
            .with_status(404)
            .with_body("no such order")
            .create_async()
            .await;

        let executor = RemoteToolExecutor::default();
        let err = executor
            .call(&tool(format!("{}/orders", server.url()), "GET"), json!({"id": 7}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Remote { status: 404, .. }));
    }
}
