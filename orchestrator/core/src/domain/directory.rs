// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::agent::Agent;
use crate::domain::tool::Capability;
use std::sync::Arc;

/// Read-only view of one communication graph.
///
/// The turn runner and the messenger resolve agents and permitted edges only
/// through this seam, so independent graphs can share one process.
pub trait AgentDirectory: Send + Sync {
    fn agent(&self, name: &str) -> Option<Arc<Agent>>;

    fn is_entry_point(&self, name: &str) -> bool;

    /// Entry points in chart order.
    fn entry_points(&self) -> Vec<String>;

    fn can_send(&self, sender: &str, recipient: &str) -> bool;

    /// Local tools plus the delegation actions wired for this graph.
    fn capabilities(&self, name: &str) -> Vec<Capability>;

    fn default_entry_point(&self) -> Option<String> {
        self.entry_points().into_iter().next()
    }
}
