// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::message::RunId;
use crate::domain::run::RunStatus;
use async_trait::async_trait;
use serde_json::Value;

/// Observer attached to a single top-level run.
///
/// Hooks are run-scoped: nested delegation hops never see them, so a
/// caller's telemetry handles do not leak across the recursion boundary.
#[async_trait]
pub trait RunHooks: Send + Sync {
    async fn on_run_start(&self, _run_id: RunId, _agent: &str) {}

    async fn on_turn_start(&self, _agent: &str, _turn: u32) {}

    async fn on_tool_start(&self, _agent: &str, _tool_name: &str, _arguments: &Value) {}

    async fn on_tool_end(&self, _agent: &str, _tool_name: &str, _output: &str) {}

    async fn on_run_end(&self, _run_id: RunId, _status: RunStatus) {}
}
