// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Integration tests for agencies built from a chart
//!
//! Drives full runs through `Agency` with a scripted completion service:
//! delegation attribution in the shared log, the shared user thread across
//! entry points, both cancellation modes, disconnects, errors, and registry
//! cleanup on every exit path.

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use switchboard_core::application::RunRequest;
use switchboard_core::domain::agent::Agent;
use switchboard_core::domain::config::RuntimeSettings;
use switchboard_core::domain::directory::AgentDirectory;
use switchboard_core::domain::events::{RunEvent, RunLifecycleEvent};
use switchboard_core::domain::llm::PromptMessage;
use switchboard_core::domain::message::MessageRole;
use switchboard_core::domain::run::{CancelMode, RunStatus};
use switchboard_core::domain::tool::{Tool, ToolContext, ToolError};
use switchboard_core::infrastructure::llm::{ScriptedCompletionService, ScriptedTurn};
use switchboard_core::infrastructure::repositories::InMemoryConversationRepository;
use switchboard_swarm::{Agency, ChartEntry, CommunicationGraph};

/// CEO delegates everything to Support and relays the answer verbatim.
fn routing_service() -> ScriptedCompletionService {
    ScriptedCompletionService::new(|req| {
        if req.agent == "Support" {
            return ScriptedTurn::text("Support here, how can I help?");
        }
        match req.pending_tool_result() {
            Some(result) => ScriptedTurn::text(result.to_string()),
            None => ScriptedTurn::tool_call("send_message_to_Support", json!({"message": "hello"})),
        }
    })
}

fn ceo_support_graph() -> CommunicationGraph {
    let ceo = Agent::builder("CEO").description("Routes requests").build();
    let support = Agent::builder("Support").description("Answers tickets").build();
    CommunicationGraph::new(vec![
        ChartEntry::Agent(ceo.clone()),
        ChartEntry::Edge(ceo, support),
    ])
    .unwrap()
}

fn agency(graph: CommunicationGraph, service: ScriptedCompletionService) -> Agency {
    agency_with(graph, Arc::new(service), RuntimeSettings::default())
}

fn agency_with(
    graph: CommunicationGraph,
    service: Arc<ScriptedCompletionService>,
    settings: RuntimeSettings,
) -> Agency {
    Agency::new(
        graph,
        service,
        Arc::new(InMemoryConversationRepository::new()),
        settings,
    )
}

struct Clock;

#[async_trait]
impl Tool for Clock {
    fn name(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns a fixed time"
    }

    fn parameters(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _args: Value, _ctx: &ToolContext) -> Result<String, ToolError> {
        Ok("12:00".to_string())
    }
}

#[tokio::test]
async fn test_delegation_is_attributed_in_the_shared_log() {
    let agency = agency(ceo_support_graph(), routing_service());

    let answer = agency
        .get_response(RunRequest::new("route me to support"))
        .await
        .unwrap();
    assert!(answer.succeeded);
    assert_eq!(answer.response, "Support here, how can I help?");

    let log = agency.transcript(&answer.conversation_id).await;
    let ceo_user = log
        .iter()
        .position(|m| m.role == MessageRole::User && m.agent == "CEO" && m.caller_agent.is_none())
        .unwrap();
    let support_user = log
        .iter()
        .position(|m| {
            m.role == MessageRole::User
                && m.agent == "Support"
                && m.caller_agent.as_deref() == Some("CEO")
        })
        .unwrap();
    assert!(ceo_user < support_user);
    assert_eq!(log[support_user].content_str(), "hello");

    // The tool result CEO receives is Support's final text.
    let result = log
        .iter()
        .find(|m| m.role == MessageRole::ToolResult && m.agent == "CEO")
        .unwrap();
    assert_eq!(result.content_str(), "Support here, how can I help?");
    assert_eq!(result.tool_name.as_deref(), Some("send_message_to_Support"));

    // Nested messages carry the lineage back to the top-level run.
    let support_reply = log
        .iter()
        .find(|m| m.role == MessageRole::Assistant && m.agent == "Support")
        .unwrap();
    assert_eq!(support_reply.parent_run_id, Some(answer.run_id));

    // Timestamps never decrease.
    assert!(log.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_stream_reports_nested_events_with_callers() {
    let agency = agency(ceo_support_graph(), routing_service());
    let stream = agency
        .get_response_stream(RunRequest::new("route me to support"))
        .await
        .unwrap();
    let events: Vec<RunEvent> = stream.collect().await;

    assert!(matches!(events[0], RunEvent::Meta { ref agent, .. } if agent == "CEO"));
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::TurnStarted { agent, caller_agent: Some(caller), depth: 1, .. }
            if agent == "Support" && caller == "CEO"
    )));
    assert!(events.iter().any(|e| matches!(
        e,
        RunEvent::ToolResult { agent, output, .. }
            if agent == "CEO" && output == "Support here, how can I help?"
    )));
    assert_eq!(events.iter().filter(|e| **e == RunEvent::Done).count(), 1);
    assert_eq!(events.last(), Some(&RunEvent::Done));
}

#[tokio::test]
async fn test_entry_points_share_one_user_thread() {
    let ceo = Agent::builder("CEO").build();
    let support = Agent::builder("Support").build();
    let graph = CommunicationGraph::new(vec![
        ChartEntry::Agent(ceo.clone()),
        ChartEntry::Agent(support.clone()),
        ChartEntry::Edge(ceo, support),
    ])
    .unwrap();
    let service = Arc::new(ScriptedCompletionService::new(|req| {
        ScriptedTurn::text(format!("{} saw {} messages", req.agent, req.messages.len()))
    }));
    let agency = agency_with(graph, service.clone(), RuntimeSettings::default());

    let first = agency
        .get_response(RunRequest::new("first question").conversation("shared").recipient("CEO"))
        .await
        .unwrap();
    let second = agency
        .get_response(RunRequest::new("second question").conversation("shared").recipient("Support"))
        .await
        .unwrap();
    assert_eq!(first.response, "CEO saw 1 messages");
    assert_eq!(second.response, "Support saw 3 messages");

    let support_request = service
        .requests()
        .into_iter()
        .find(|r| r.agent == "Support")
        .unwrap();
    assert_eq!(
        support_request.messages[0],
        PromptMessage::User {
            content: "first question".to_string()
        }
    );

    let log = agency.transcript(&"shared".into()).await;
    assert_eq!(log.len(), 4);
    assert!(log.iter().all(|m| m.is_user_thread()));
}

#[tokio::test]
async fn test_after_turn_cancel_finishes_the_inflight_turn() {
    let ceo = Agent::builder("CEO").tool(Arc::new(Clock)).build();
    let graph = CommunicationGraph::new(vec![ceo]).unwrap();
    let service = ScriptedCompletionService::new(|req| match req.pending_tool_result() {
        Some(_) => ScriptedTurn::text("never reached"),
        None => ScriptedTurn::text("let me check the time").and_tool_call("current_time", json!({})),
    })
    .with_chunk_delay(Duration::from_millis(30));
    let agency = agency(graph, service);

    let mut stream = agency.get_response_stream(RunRequest::new("time?")).await.unwrap();
    let run_id = stream.run_id();
    assert!(matches!(stream.next().await, Some(RunEvent::Meta { .. })));
    assert!(matches!(stream.next().await, Some(RunEvent::TurnStarted { turn: 1, .. })));
    assert!(matches!(stream.next().await, Some(RunEvent::TextDelta { .. })));

    let outcome = agency.cancel(run_id, Some(CancelMode::AfterTurn)).unwrap();
    assert!(outcome.cancelled);

    let rest: Vec<RunEvent> = stream.collect().await;
    let deltas = rest
        .iter()
        .filter(|e| matches!(e, RunEvent::TextDelta { .. }))
        .count();
    assert_eq!(deltas, 4);
    assert!(rest.iter().any(|e| matches!(e, RunEvent::ToolResult { output, .. } if output == "12:00")));
    assert!(!rest.iter().any(|e| matches!(e, RunEvent::TurnStarted { .. })));
    assert!(!rest.iter().any(|e| matches!(e, RunEvent::Completed { .. })));
    assert_eq!(rest.last(), Some(&RunEvent::Done));

    assert!(!agency.is_active(run_id));
    let late = agency.cancel(run_id, None).unwrap();
    assert_eq!(late.status, RunStatus::Cancelled);
    assert!(!late.cancelled);
}

#[tokio::test]
async fn test_immediate_cancel_during_delegation() {
    let service = ScriptedCompletionService::new(|req| {
        if req.agent == "Support" {
            return ScriptedTurn::text("a long and careful answer from support");
        }
        match req.pending_tool_result() {
            Some(result) => ScriptedTurn::text(result.to_string()),
            None => ScriptedTurn::tool_call("send_message_to_Support", json!({"message": "hello"})),
        }
    })
    .with_chunk_delay(Duration::from_millis(30));
    let agency = agency(ceo_support_graph(), service);

    let mut stream = agency.get_response_stream(RunRequest::new("hi")).await.unwrap();
    let run_id = stream.run_id();
    loop {
        match stream.next().await {
            Some(RunEvent::TextDelta { agent, .. }) if agent == "Support" => break,
            Some(_) => continue,
            None => panic!("stream ended before Support answered"),
        }
    }

    let outcome = agency.cancel(run_id, Some(CancelMode::Immediate)).unwrap();
    assert!(outcome.cancelled);
    assert_eq!(outcome.status, RunStatus::Cancelled);
    assert!(outcome
        .new_messages
        .iter()
        .any(|m| m.agent == "Support" && m.role == MessageRole::User));

    let rest: Vec<RunEvent> = stream.collect().await;
    assert_eq!(rest, vec![RunEvent::Done]);
    assert!(agency.active_runs().is_empty());
}

#[tokio::test]
async fn test_after_turn_cancel_during_delegation_lets_the_hop_finish() {
    let service = ScriptedCompletionService::new(|req| {
        if req.agent == "Support" {
            return ScriptedTurn::text("a long and careful answer from support");
        }
        match req.pending_tool_result() {
            Some(result) => ScriptedTurn::text(result.to_string()),
            None => ScriptedTurn::tool_call("send_message_to_Support", json!({"message": "hello"})),
        }
    })
    .with_chunk_delay(Duration::from_millis(30));
    let agency = agency(ceo_support_graph(), service);

    let mut stream = agency.get_response_stream(RunRequest::new("hi")).await.unwrap();
    let run_id = stream.run_id();
    loop {
        match stream.next().await {
            Some(RunEvent::TextDelta { agent, .. }) if agent == "Support" => break,
            Some(_) => continue,
            None => panic!("stream ended before Support answered"),
        }
    }

    let outcome = agency.cancel(run_id, Some(CancelMode::AfterTurn)).unwrap();
    assert!(outcome.cancelled);

    let rest: Vec<RunEvent> = stream.collect().await;
    let support_deltas = rest
        .iter()
        .filter(|e| matches!(e, RunEvent::TextDelta { agent, .. } if agent == "Support"))
        .count();
    assert_eq!(support_deltas, 6);
    assert!(rest.iter().any(|e| matches!(
        e,
        RunEvent::ToolResult { agent, output, .. }
            if agent == "CEO" && output == "a long and careful answer from support"
    )));
    assert!(!rest.iter().any(|e| matches!(e, RunEvent::TurnStarted { .. })));
    assert!(!rest.iter().any(|e| matches!(e, RunEvent::Completed { .. })));
    assert_eq!(rest.last(), Some(&RunEvent::Done));

    assert!(agency.active_runs().is_empty());
    let late = agency.cancel(run_id, None).unwrap();
    assert_eq!(late.status, RunStatus::Cancelled);
    assert!(!late.cancelled);
    assert!(late
        .new_messages
        .iter()
        .any(|m| m.agent == "CEO" && m.role == MessageRole::ToolResult));
}

#[tokio::test]
async fn test_registry_is_clean_on_every_exit_path() {
    let slow = || {
        Arc::new(
            ScriptedCompletionService::new(|_| ScriptedTurn::text("one two three four five"))
                .with_chunk_delay(Duration::from_millis(40)),
        )
    };
    let graph = || CommunicationGraph::new(vec![Agent::builder("CEO").build()]).unwrap();

    // Completed
    let completed = agency_with(graph(), slow(), RuntimeSettings::default());
    let answer = completed.get_response(RunRequest::new("hi")).await.unwrap();
    assert!(answer.succeeded);
    assert!(completed.active_runs().is_empty());

    // Errored
    let errored = agency(
        graph(),
        ScriptedCompletionService::new(|_| ScriptedTurn::error("upstream unavailable")),
    );
    let answer = errored.get_response(RunRequest::new("hi")).await.unwrap();
    assert!(!answer.succeeded);
    assert!(answer.response.contains("upstream unavailable"));
    assert!(errored.active_runs().is_empty());

    // Cancelled
    let cancelled = agency_with(graph(), slow(), RuntimeSettings::default());
    let mut stream = cancelled.get_response_stream(RunRequest::new("hi")).await.unwrap();
    let _ = stream.next().await;
    cancelled.cancel(stream.run_id(), None).unwrap();
    let _: Vec<RunEvent> = stream.collect().await;
    assert!(cancelled.active_runs().is_empty());

    // Disconnected
    let disconnected = agency_with(graph(), slow(), RuntimeSettings::default());
    let mut stream = disconnected.get_response_stream(RunRequest::new("hi")).await.unwrap();
    let run_id = stream.run_id();
    let _ = stream.next().await;
    assert!(disconnected.is_active(run_id));
    drop(stream);
    assert!(disconnected.active_runs().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cancels_resolve_once() {
    let service = Arc::new(
        ScriptedCompletionService::new(|_| ScriptedTurn::text("a b c d e f g h"))
            .with_chunk_delay(Duration::from_millis(50)),
    );
    let graph = CommunicationGraph::new(vec![Agent::builder("CEO").build()]).unwrap();
    let agency = Arc::new(agency_with(graph, service, RuntimeSettings::default()));

    let mut stream = agency.get_response_stream(RunRequest::new("hi")).await.unwrap();
    let run_id = stream.run_id();
    let _ = stream.next().await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let agency = Arc::clone(&agency);
            tokio::spawn(async move { agency.cancel(run_id, None) })
        })
        .collect();

    let mut winners = 0;
    for handle in handles {
        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.status, RunStatus::Cancelled);
        if outcome.cancelled {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let rest: Vec<RunEvent> = stream.collect().await;
    assert_eq!(rest.last(), Some(&RunEvent::Done));
    assert!(agency.active_runs().is_empty());
}

#[tokio::test]
async fn test_lifecycle_bus_reports_delegations() {
    let agency = agency(ceo_support_graph(), routing_service());
    let mut bus = agency.subscribe();

    let answer = agency.get_response(RunRequest::new("hi")).await.unwrap();
    assert!(answer.succeeded);

    let mut seen = Vec::new();
    while let Ok(event) = bus.try_recv() {
        seen.push(event);
    }
    assert!(matches!(seen.first(), Some(RunLifecycleEvent::RunStarted { agent, .. }) if agent == "CEO"));
    assert!(seen.iter().any(|e| matches!(
        e,
        RunLifecycleEvent::DelegationStarted { sender, recipient, parent_run_id, depth: 1, .. }
            if sender == "CEO" && recipient == "Support" && *parent_run_id == answer.run_id
    )));
    assert!(seen.iter().any(|e| matches!(
        e,
        RunLifecycleEvent::DelegationFinished { succeeded: true, .. }
    )));
    assert!(matches!(
        seen.last(),
        Some(RunLifecycleEvent::RunFinished { status: RunStatus::Completed, .. })
    ));
}

#[tokio::test]
async fn test_mutual_delegation_stops_at_depth_ceiling() {
    let ping = Agent::builder("Ping").build();
    let pong = Agent::builder("Pong").build();
    let graph = CommunicationGraph::new(vec![
        ChartEntry::Agent(ping.clone()),
        ChartEntry::Edge(ping.clone(), pong.clone()),
        ChartEntry::Edge(pong, ping),
    ])
    .unwrap();
    let service = Arc::new(ScriptedCompletionService::new(|req| {
        if let Some(result) = req.pending_tool_result() {
            return ScriptedTurn::text(result.to_string());
        }
        let other = if req.agent == "Ping" { "Pong" } else { "Ping" };
        ScriptedTurn::tool_call(format!("send_message_to_{other}"), json!({"message": "again"}))
    }));
    let settings = RuntimeSettings {
        max_depth: 3,
        ..Default::default()
    };
    let agency = agency_with(graph, service, settings);

    let answer = agency.get_response(RunRequest::new("start")).await.unwrap();
    assert!(answer.succeeded);
    assert!(
        answer.response.contains("maximum delegation depth (3)"),
        "{}",
        answer.response
    );
    assert!(agency.active_runs().is_empty());
}

#[test]
fn test_every_edge_yields_one_deterministic_action() {
    let build = || {
        let a = Agent::builder("Planner").build();
        let b = Agent::builder("Research Team").build();
        let c = Agent::builder("Writer").build();
        CommunicationGraph::new(vec![
            ChartEntry::Agent(a.clone()),
            ChartEntry::Edge(a.clone(), b.clone()),
            ChartEntry::Edge(a.clone(), c.clone()),
            ChartEntry::Edge(b.clone(), c.clone()),
            ChartEntry::Edge(c.clone(), a.clone()),
            ChartEntry::Edge(a, b),
        ])
        .unwrap()
    };
    let first = build();
    let second = build();

    assert_eq!(first.structure(), second.structure());
    let edges = first.structure().edges;
    assert_eq!(edges.len(), 4);
    for edge in &edges {
        let actions: Vec<String> = first
            .capabilities(&edge.sender)
            .iter()
            .map(|c| c.name().to_string())
            .filter(|name| *name == edge.action)
            .collect();
        assert_eq!(actions.len(), 1);
    }
    assert!(edges
        .iter()
        .any(|e| e.recipient == "Research Team" && e.action == "send_message_to_Research_Team"));
}
