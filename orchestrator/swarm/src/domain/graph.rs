// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Communication Graph
//!
//! Parses an agency chart into three structures owned by one graph instance:
//!
//! - a name → [`Agent`] registry,
//! - the permitted outbound edges of every sender, each already wired as a
//!   [`DelegationTarget`] (one `send_message_to_<recipient>` action per
//!   distinct recipient),
//! - the ordered entry-point list.
//!
//! A chart is an ordered list whose entries are either a single agent (an
//! entry point) or a `[sender, recipient]` pair (a permitted edge). Cycles are
//! legal; unbounded mutual delegation is stopped at run time by the depth
//! ceiling in [`RuntimeSettings`](switchboard_core::domain::config::RuntimeSettings).
//!
//! The graph is immutable once built and implements [`AgentDirectory`], which
//! is the only view the runtime has of it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_core::domain::agent::Agent;
use switchboard_core::domain::directory::AgentDirectory;
use switchboard_core::domain::tool::{Capability, DelegationTarget};
use thiserror::Error;

/// One entry of a chart built from agent instances.
#[derive(Debug, Clone)]
pub enum ChartEntry {
    /// A standalone agent: registered and marked as an entry point.
    Agent(Arc<Agent>),
    /// A permitted `sender → recipient` edge. Both endpoints are registered.
    Edge(Arc<Agent>, Arc<Agent>),
}

impl From<Arc<Agent>> for ChartEntry {
    fn from(agent: Arc<Agent>) -> Self {
        ChartEntry::Agent(agent)
    }
}

impl From<(Arc<Agent>, Arc<Agent>)> for ChartEntry {
    fn from((sender, recipient): (Arc<Agent>, Arc<Agent>)) -> Self {
        ChartEntry::Edge(sender, recipient)
    }
}

/// One entry of a chart that refers to agents by name (manifest form).
///
/// In YAML a bare string is an entry point and a two-element list is an edge:
///
/// ```yaml
/// chart:
///   - CEO
///   - [CEO, Support]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChartRef {
    Agent(String),
    Edge([String; 2]),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("chart must contain at least one agent")]
    EmptyChart,

    #[error("agent names must be non-empty and must not contain surrounding whitespace: {0:?}")]
    InvalidName(String),

    #[error("agent name `{0}` is bound to two different agent instances")]
    DuplicateName(String),

    #[error("chart references unknown agent `{0}`")]
    UnknownAgent(String),

    #[error("edge `{sender}` -> `{recipient}` references unregistered agent `{missing}`")]
    UnknownEndpoint {
        sender: String,
        recipient: String,
        missing: String,
    },

    #[error("agent `{0}` cannot be permitted to message itself")]
    SelfEdge(String),

    #[error(
        "sender `{sender}` would expose action `{action}` for both `{first}` and `{second}`; rename one of them"
    )]
    ActionNameCollision {
        sender: String,
        action: String,
        first: String,
        second: String,
    },
}

/// Node of the exported structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub name: String,
    pub description: String,
    pub entry_point: bool,
    /// Every action name the agent can call, delegations included.
    pub tools: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub sender: String,
    pub recipient: String,
    pub action: String,
}

/// Visualisation-friendly export of a graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphStructure {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

#[derive(Debug)]
pub struct CommunicationGraph {
    agents: HashMap<String, Arc<Agent>>,
    /// Registration order, used for deterministic listings.
    order: Vec<String>,
    entry_points: Vec<String>,
    delegations: HashMap<String, Vec<DelegationTarget>>,
}

impl CommunicationGraph {
    /// Build a graph from agent instances.
    pub fn new<I, E>(chart: I) -> Result<Self, ConfigurationError>
    where
        I: IntoIterator<Item = E>,
        E: Into<ChartEntry>,
    {
        let mut graph = Self {
            agents: HashMap::new(),
            order: Vec::new(),
            entry_points: Vec::new(),
            delegations: HashMap::new(),
        };
        let mut edges = Vec::new();

        for entry in chart {
            match entry.into() {
                ChartEntry::Agent(agent) => {
                    graph.register(&agent)?;
                    let name = agent.name().to_string();
                    if !graph.entry_points.contains(&name) {
                        graph.entry_points.push(name);
                    }
                }
                ChartEntry::Edge(sender, recipient) => {
                    graph.register(&sender)?;
                    graph.register(&recipient)?;
                    edges.push((sender, recipient));
                }
            }
        }

        if graph.agents.is_empty() {
            return Err(ConfigurationError::EmptyChart);
        }

        if graph.entry_points.is_empty() {
            tracing::debug!("Chart declares no standalone agent; every agent is an entry point");
            graph.entry_points = graph.order.clone();
        }

        for (sender, recipient) in edges {
            graph.wire(&sender, &recipient)?;
        }

        tracing::debug!(
            agents = graph.order.len(),
            entry_points = graph.entry_points.len(),
            "Communication graph built"
        );
        Ok(graph)
    }

    /// Build a graph from a named chart, resolving names against `agents`.
    ///
    /// Only agents named in the chart are registered; an edge naming an agent
    /// that is not in `agents` fails with [`ConfigurationError::UnknownEndpoint`].
    pub fn from_named_chart(
        agents: &[Arc<Agent>],
        chart: &[ChartRef],
    ) -> Result<Self, ConfigurationError> {
        let mut by_name: HashMap<&str, &Arc<Agent>> = HashMap::new();
        for agent in agents {
            if let Some(existing) = by_name.insert(agent.name(), agent) {
                if !Arc::ptr_eq(existing, agent) {
                    return Err(ConfigurationError::DuplicateName(agent.name().to_string()));
                }
            }
        }

        let mut entries = Vec::with_capacity(chart.len());
        for entry in chart {
            match entry {
                ChartRef::Agent(name) => {
                    let agent = by_name
                        .get(name.as_str())
                        .ok_or_else(|| ConfigurationError::UnknownAgent(name.clone()))?;
                    entries.push(ChartEntry::Agent(Arc::clone(agent)));
                }
                ChartRef::Edge([sender, recipient]) => {
                    let lookup = |name: &String| {
                        by_name.get(name.as_str()).map(|a| Arc::clone(a)).ok_or_else(|| {
                            ConfigurationError::UnknownEndpoint {
                                sender: sender.clone(),
                                recipient: recipient.clone(),
                                missing: name.clone(),
                            }
                        })
                    };
                    entries.push(ChartEntry::Edge(lookup(sender)?, lookup(recipient)?));
                }
            }
        }
        Self::new(entries)
    }

    /// Re-adding an already registered instance is a no-op.
    fn register(&mut self, agent: &Arc<Agent>) -> Result<(), ConfigurationError> {
        let name = agent.name();
        if name.is_empty() || name.trim() != name {
            return Err(ConfigurationError::InvalidName(name.to_string()));
        }
        match self.agents.get(name) {
            Some(existing) if Arc::ptr_eq(existing, agent) => Ok(()),
            Some(_) => Err(ConfigurationError::DuplicateName(name.to_string())),
            None => {
                self.agents.insert(name.to_string(), Arc::clone(agent));
                self.order.push(name.to_string());
                Ok(())
            }
        }
    }

    fn wire(&mut self, sender: &Arc<Agent>, recipient: &Arc<Agent>) -> Result<(), ConfigurationError> {
        if sender.name() == recipient.name() {
            return Err(ConfigurationError::SelfEdge(sender.name().to_string()));
        }

        let targets = self.delegations.entry(sender.name().to_string()).or_default();
        if targets.iter().any(|t| t.recipient == recipient.name()) {
            return Ok(());
        }

        let mut target =
            DelegationTarget::new(sender.name(), recipient.name(), recipient.description());
        target.one_call_at_a_time = sender.serial_delegation();

        let clash = targets
            .iter()
            .find(|t| t.action_name == target.action_name)
            .map(|t| t.recipient.clone())
            .or_else(|| {
                sender
                    .tools()
                    .iter()
                    .find(|c| c.name() == target.action_name)
                    .map(|c| c.name().to_string())
            });
        if let Some(first) = clash {
            return Err(ConfigurationError::ActionNameCollision {
                sender: sender.name().to_string(),
                action: target.action_name,
                first,
                second: recipient.name().to_string(),
            });
        }

        targets.push(target);
        Ok(())
    }

    /// Agent names in registration order.
    pub fn agent_names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Permitted outbound edges of `sender`, in chart order.
    pub fn delegations(&self, sender: &str) -> &[DelegationTarget] {
        self.delegations.get(sender).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn structure(&self) -> GraphStructure {
        let nodes = self
            .order
            .iter()
            .filter_map(|name| self.agents.get(name))
            .map(|agent| GraphNode {
                name: agent.name().to_string(),
                description: agent.description().to_string(),
                entry_point: self.is_entry_point(agent.name()),
                tools: self
                    .capabilities(agent.name())
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
            })
            .collect();

        let edges = self
            .order
            .iter()
            .flat_map(|sender| self.delegations(sender))
            .map(|target| GraphEdge {
                sender: target.sender.clone(),
                recipient: target.recipient.clone(),
                action: target.action_name.clone(),
            })
            .collect();

        GraphStructure { nodes, edges }
    }
}

impl AgentDirectory for CommunicationGraph {
    fn agent(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.get(name).cloned()
    }

    fn is_entry_point(&self, name: &str) -> bool {
        self.entry_points.iter().any(|e| e == name)
    }

    fn entry_points(&self) -> Vec<String> {
        self.entry_points.clone()
    }

    fn can_send(&self, sender: &str, recipient: &str) -> bool {
        self.delegations(sender).iter().any(|t| t.recipient == recipient)
    }

    fn capabilities(&self, name: &str) -> Vec<Capability> {
        let Some(agent) = self.agents.get(name) else {
            return Vec::new();
        };
        agent
            .tools()
            .iter()
            .cloned()
            .chain(self.delegations(name).iter().cloned().map(Capability::SendToAgent))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> Arc<Agent> {
        Agent::builder(name).description(format!("{name} agent")).build()
    }

    #[test]
    fn test_entry_points_and_edges() {
        let ceo = agent("CEO");
        let support = agent("Support");
        let dev = agent("Dev");
        let graph = CommunicationGraph::new(vec![
            ChartEntry::Agent(ceo.clone()),
            ChartEntry::Edge(ceo.clone(), support.clone()),
            ChartEntry::Edge(ceo.clone(), dev.clone()),
            ChartEntry::Edge(support.clone(), ceo.clone()),
        ])
        .unwrap();

        assert_eq!(graph.entry_points(), vec!["CEO"]);
        assert_eq!(graph.default_entry_point().as_deref(), Some("CEO"));
        assert!(graph.can_send("CEO", "Support"));
        assert!(graph.can_send("Support", "CEO"));
        assert!(!graph.can_send("Dev", "CEO"));
        assert_eq!(graph.agent_names(), ["CEO", "Support", "Dev"]);

        let names: Vec<String> = graph
            .capabilities("CEO")
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        assert_eq!(names, vec!["send_message_to_Support", "send_message_to_Dev"]);
    }

    #[test]
    fn test_every_agent_is_entry_point_without_standalone_entries() {
        let a = agent("A");
        let b = agent("B");
        let graph = CommunicationGraph::new(vec![(a, b)]).unwrap();
        assert_eq!(graph.entry_points(), vec!["A", "B"]);
    }

    #[test]
    fn test_empty_chart_rejected() {
        let err = CommunicationGraph::new(Vec::<ChartEntry>::new()).unwrap_err();
        assert_eq!(err, ConfigurationError::EmptyChart);
    }

    #[test]
    fn test_duplicate_name_rejected_but_same_instance_accepted() {
        let first = agent("CEO");
        let graph = CommunicationGraph::new(vec![first.clone(), first.clone()]).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.entry_points(), vec!["CEO"]);

        let err = CommunicationGraph::new(vec![first, agent("CEO")]).unwrap_err();
        assert_eq!(err, ConfigurationError::DuplicateName("CEO".into()));
    }

    #[test]
    fn test_self_edge_rejected() {
        let a = agent("A");
        let err = CommunicationGraph::new(vec![(a.clone(), a)]).unwrap_err();
        assert_eq!(err, ConfigurationError::SelfEdge("A".into()));
    }

    #[test]
    fn test_duplicate_edges_wired_once() {
        let a = agent("A");
        let b = agent("B");
        let graph = CommunicationGraph::new(vec![
            ChartEntry::Agent(a.clone()),
            ChartEntry::Edge(a.clone(), b.clone()),
            ChartEntry::Edge(a.clone(), b.clone()),
        ])
        .unwrap();
        assert_eq!(graph.delegations("A").len(), 1);
        assert_eq!(graph.structure().edges.len(), 1);
    }

    #[test]
    fn test_sanitised_action_collision() {
        let ceo = agent("CEO");
        let err = CommunicationGraph::new(vec![
            ChartEntry::Edge(ceo.clone(), agent("Sales Team")),
            ChartEntry::Edge(ceo.clone(), agent("Sales-Team")),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::ActionNameCollision { ref action, .. } if action == "send_message_to_Sales_Team"
        ));
    }

    #[test]
    fn test_serial_delegation_marks_actions_exclusive() {
        let ceo = Agent::builder("CEO").serial_delegation(true).build();
        let graph = CommunicationGraph::new(vec![(ceo, agent("Support"))]).unwrap();
        assert!(graph.delegations("CEO")[0].one_call_at_a_time);
    }

    #[test]
    fn test_named_chart_resolution() {
        let agents = vec![agent("CEO"), agent("Support")];
        let chart = vec![
            ChartRef::Agent("CEO".into()),
            ChartRef::Edge(["CEO".into(), "Support".into()]),
        ];
        let graph = CommunicationGraph::from_named_chart(&agents, &chart).unwrap();
        assert!(graph.can_send("CEO", "Support"));

        let dangling = vec![ChartRef::Edge(["CEO".into(), "Billing".into()])];
        let err = CommunicationGraph::from_named_chart(&agents, &dangling).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::UnknownEndpoint { ref missing, .. } if missing == "Billing"
        ));
    }

    #[test]
    fn test_structure_export() {
        let ceo = agent("CEO");
        let graph = CommunicationGraph::new(vec![
            ChartEntry::Agent(ceo.clone()),
            ChartEntry::Edge(ceo, agent("Support")),
        ])
        .unwrap();
        let structure = graph.structure();
        assert_eq!(structure.nodes.len(), 2);
        assert!(structure.nodes[0].entry_point);
        assert!(!structure.nodes[1].entry_point);
        assert_eq!(structure.nodes[0].tools, vec!["send_message_to_Support"]);
        assert_eq!(
            structure.edges,
            vec![GraphEdge {
                sender: "CEO".into(),
                recipient: "Support".into(),
                action: "send_message_to_Support".into(),
            }]
        );

        let json = serde_json::to_value(&structure).unwrap();
        assert_eq!(json["nodes"][1]["name"], "Support");
    }
}
