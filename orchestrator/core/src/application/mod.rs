// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent_turn;
pub mod error;
pub mod event_sink;
pub mod messenger;
pub mod run_coordinator;
pub mod scope;
#[cfg(test)]
pub(crate) mod test_support;

pub use agent_turn::AgentRunner;
pub use error::RunError;
pub use event_sink::EventSink;
pub use messenger::InterAgentMessenger;
pub use run_coordinator::{RunRequest, RunStream, StreamingRunCoordinator};
pub use scope::RunScope;
