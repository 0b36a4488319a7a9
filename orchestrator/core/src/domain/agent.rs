// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Agent
//!
//! A named decision loop backed by a completion service, together with its
//! locally owned capabilities and concurrency guard.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Agent aggregate and builder

use crate::domain::llm::GenerationOptions;
use crate::domain::lock::ConcurrencyGuard;
use crate::domain::tool::{Capability, RemoteEndpointTool, Tool};
use std::sync::Arc;

/// Agents are shared as `Arc<Agent>`; graphs compare instances with `Arc::ptr_eq`.
#[derive(Debug)]
pub struct Agent {
    name: String,
    description: String,
    instructions: String,
    model: String,
    options: GenerationOptions,
    tools: Vec<Capability>,
    serial_delegation: bool,
    guard: Arc<ConcurrencyGuard>,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instructions(&self) -> &str {
        &self.instructions
    }

    /// Opaque model reference handed to the provider registry.
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn options(&self) -> &GenerationOptions {
        &self.options
    }

    /// Locally owned capabilities (delegation actions are wired per graph).
    pub fn tools(&self) -> &[Capability] {
        &self.tools
    }

    /// When set, the agent's delegation actions hold its guard exclusively,
    /// so it can have at most one outstanding delegation.
    pub fn serial_delegation(&self) -> bool {
        self.serial_delegation
    }

    pub fn guard(&self) -> &Arc<ConcurrencyGuard> {
        &self.guard
    }
}

pub struct AgentBuilder {
    name: String,
    description: String,
    instructions: String,
    model: String,
    options: GenerationOptions,
    tools: Vec<Capability>,
    serial_delegation: bool,
}

impl AgentBuilder {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: String::new(),
            model: "default".to_string(),
            options: GenerationOptions::default(),
            tools: Vec::new(),
            serial_delegation: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(Capability::Local(tool));
        self
    }

    pub fn remote_tool(mut self, tool: RemoteEndpointTool) -> Self {
        self.tools.push(Capability::RemoteEndpoint(tool));
        self
    }

    pub fn serial_delegation(mut self, serial: bool) -> Self {
        self.serial_delegation = serial;
        self
    }

    pub fn build(self) -> Arc<Agent> {
        let guard = Arc::new(ConcurrencyGuard::new(self.name.clone()));
        Arc::new(Agent {
            name: self.name,
            description: self.description,
            instructions: self.instructions,
            model: self.model,
            options: self.options,
            tools: self.tools,
            serial_delegation: self.serial_delegation,
            guard,
        })
    }
}
