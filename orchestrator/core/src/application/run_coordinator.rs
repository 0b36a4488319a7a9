// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Streaming run coordinator
//!
//! Supervises one top-level interaction, including every delegation hop it
//! triggers, as a single ordered and cancellable event stream.
//!
//! # Lifecycle
//!
//! `Pending -> Streaming -> {Completed | Cancelled | Errored}`
//!
//! A producer task drives the agent and writes events into a bounded
//! channel; the returned [`RunStream`] drains it. The stream always starts
//! with a `meta` event carrying the run id and always ends with the `done`
//! sentinel. Whatever the exit path (completion, immediate or after-turn
//! cancel, disconnect, error), the run has left the active registry before
//! the stream ends, and it leaves it exactly once.

use crate::application::agent_turn::AgentRunner;
use crate::application::error::RunError;
use crate::application::event_sink::EventSink;
use crate::application::scope::RunScope;
use crate::domain::directory::AgentDirectory;
use crate::domain::events::{RunEvent, RunLifecycleEvent};
use crate::domain::hooks::RunHooks;
use crate::domain::message::{ConversationId, RunId};
use crate::domain::run::{CancelMode, CancelOutcome, RunCancellation, RunRecord, RunStatus};
use crate::infrastructure::conversations::ConversationStore;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::run_registry::RunRegistry;
use chrono::Utc;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

/// A request to start one top-level interaction.
#[derive(Clone, Default)]
pub struct RunRequest {
    /// Existing conversation to continue; a new id is generated when absent.
    pub conversation_id: Option<ConversationId>,
    /// Entry-point agent; the graph's first entry point when absent.
    pub recipient: Option<String>,
    pub message: String,
    /// Application data visible to tools of every hop.
    pub app_context: Value,
    pub hooks: Option<Arc<dyn RunHooks>>,
}

impl RunRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn conversation(mut self, conversation_id: impl Into<ConversationId>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn recipient(mut self, agent: impl Into<String>) -> Self {
        self.recipient = Some(agent.into());
        self
    }

    pub fn app_context(mut self, context: Value) -> Self {
        self.app_context = context;
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn RunHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }
}

pub struct StreamingRunCoordinator {
    runner: Arc<AgentRunner>,
    directory: Arc<dyn AgentDirectory>,
    conversations: Arc<ConversationStore>,
    registry: Arc<RunRegistry>,
}

impl StreamingRunCoordinator {
    pub fn new(
        runner: Arc<AgentRunner>,
        directory: Arc<dyn AgentDirectory>,
        conversations: Arc<ConversationStore>,
    ) -> Self {
        let registry = Arc::new(RunRegistry::new(runner.settings().finished_run_cache));
        Self {
            runner,
            directory,
            conversations,
            registry,
        }
    }

    pub fn registry(&self) -> &Arc<RunRegistry> {
        &self.registry
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub fn events(&self) -> &EventBus {
        self.runner.events()
    }

    /// Registers a run and starts producing its events.
    pub async fn start(&self, request: RunRequest) -> Result<RunStream, RunError> {
        let recipient = match request.recipient {
            Some(name) => name,
            None => self
                .directory
                .default_entry_point()
                .ok_or_else(|| RunError::UnknownAgent("<entry point>".to_string()))?,
        };
        if self.directory.agent(&recipient).is_none() {
            return Err(RunError::UnknownAgent(recipient));
        }
        if !self.directory.is_entry_point(&recipient) {
            return Err(RunError::NotEntryPoint(recipient));
        }

        let conversation_id = request.conversation_id.unwrap_or_default();
        let store = self.conversations.open(&conversation_id).await;
        let record = RunRecord::new(conversation_id.clone(), &recipient);
        let run_id = record.run_id;
        let cancellation = record.cancellation.clone();
        self.registry.register(record, Arc::clone(&store));

        info!(run_id = %run_id, conversation_id = %conversation_id, agent = %recipient, "Run started");
        metrics::counter!("switchboard_runs_started_total").increment(1);
        self.events().publish(RunLifecycleEvent::RunStarted {
            run_id,
            conversation_id: conversation_id.clone(),
            agent: recipient.clone(),
            started_at: Utc::now(),
        });

        let settings = self.runner.settings();
        let (sink, rx) = EventSink::channel(
            settings.channel_capacity,
            cancellation.clone(),
            settings.consumer_timeout(),
        );
        let scope = RunScope {
            run_id,
            parent_run_id: None,
            conversation_id: conversation_id.clone(),
            store,
            directory: Arc::clone(&self.directory),
            sink,
            cancellation: cancellation.clone(),
            app_context: Arc::new(request.app_context),
            hooks: request.hooks,
            depth: 0,
        };
        let finisher = RunFinisher {
            registry: Arc::clone(&self.registry),
            events: self.events().clone(),
            run_id,
        };
        let (terminal_tx, terminal_rx) = oneshot::channel();

        self.registry.mark_streaming(run_id);
        tokio::spawn(produce(
            Arc::clone(&self.runner),
            finisher.clone(),
            scope,
            recipient.clone(),
            request.message,
            terminal_tx,
        ));

        let meta = RunEvent::Meta {
            run_id,
            conversation_id: conversation_id.clone(),
            agent: recipient,
        };
        Ok(RunStream {
            run_id,
            conversation_id,
            inner: consume(meta, rx, terminal_rx, cancellation, finisher),
        })
    }

    /// Cancels an active run, or reports the final state of a finished one.
    ///
    /// Returns `None` only for run ids this coordinator has never seen or
    /// has already evicted from its finished-run cache.
    pub fn cancel(&self, run_id: RunId, mode: Option<CancelMode>) -> Option<CancelOutcome> {
        let mode = mode.unwrap_or_default();
        if let Some(cancellation) = self.registry.cancellation(run_id) {
            info!(run_id = %run_id, ?mode, "Cancelling run");
            match mode {
                CancelMode::Immediate => {
                    let removed = self.finisher(run_id).finish(RunStatus::Cancelled);
                    cancellation.cancel(CancelMode::Immediate);
                    if let Some(finished) = self.registry.finished(run_id) {
                        return Some(CancelOutcome {
                            run_id,
                            status: finished.record.status,
                            cancelled: removed,
                            new_messages: finished.new_messages,
                        });
                    }
                }
                CancelMode::AfterTurn => {
                    cancellation.cancel(CancelMode::AfterTurn);
                    if let Some(new_messages) = self.registry.new_messages(run_id) {
                        return Some(CancelOutcome {
                            run_id,
                            status: self.registry.status(run_id).unwrap_or(RunStatus::Streaming),
                            cancelled: true,
                            new_messages,
                        });
                    }
                }
            }
        }

        // The run finished before (or while) the request arrived.
        self.registry.finished(run_id).map(|finished| CancelOutcome {
            run_id,
            status: finished.record.status,
            cancelled: false,
            new_messages: finished.new_messages,
        })
    }

    /// A client went away: same as an immediate cancel.
    pub fn disconnect(&self, run_id: RunId) {
        if let Some(cancellation) = self.registry.cancellation(run_id) {
            info!(run_id = %run_id, "Client disconnected");
            self.finisher(run_id).disconnect(&cancellation);
        }
    }

    pub fn is_active(&self, run_id: RunId) -> bool {
        self.registry.is_active(run_id)
    }

    pub fn active_runs(&self) -> Vec<RunId> {
        self.registry.active_ids()
    }

    fn finisher(&self, run_id: RunId) -> RunFinisher {
        RunFinisher {
            registry: Arc::clone(&self.registry),
            events: self.events().clone(),
            run_id,
        }
    }
}

/// The single place a run leaves the registry.
#[derive(Clone)]
struct RunFinisher {
    registry: Arc<RunRegistry>,
    events: EventBus,
    run_id: RunId,
}

impl RunFinisher {
    fn finish(&self, status: RunStatus) -> bool {
        let removed = self.registry.finish(self.run_id, status);
        if removed {
            metrics::counter!("switchboard_runs_finished_total", "status" => status.as_str())
                .increment(1);
            self.events.publish(RunLifecycleEvent::RunFinished {
                run_id: self.run_id,
                status,
                finished_at: Utc::now(),
            });
        }
        removed
    }

    fn disconnect(&self, cancellation: &RunCancellation) {
        self.finish(RunStatus::Cancelled);
        cancellation.cancel(CancelMode::Immediate);
    }
}

async fn produce(
    runner: Arc<AgentRunner>,
    finisher: RunFinisher,
    scope: RunScope,
    recipient: String,
    message: String,
    terminal: oneshot::Sender<Option<RunEvent>>,
) {
    let run_id = scope.run_id;
    let cancellation = scope.cancellation.clone();
    let hooks = scope.hooks.clone();
    if let Some(hooks) = &hooks {
        hooks.on_run_start(run_id, &recipient).await;
    }

    let outcome = {
        let run = runner.run_agent(&scope, &recipient, &message, None);
        tokio::select! {
            biased;
            _ = cancellation.immediate_cancelled() => Err(RunError::Cancelled),
            result = run => result,
        }
    };
    // Drops the last producer-side handle on the event channel.
    drop(scope);

    let (status, last_event) = match outcome {
        Ok(final_output) => (
            RunStatus::Completed,
            Some(RunEvent::Completed {
                agent: recipient.clone(),
                final_output,
            }),
        ),
        Err(e) if e.is_cancellation() => (RunStatus::Cancelled, None),
        Err(e) => {
            warn!(run_id = %run_id, agent = %recipient, "Run failed: {}", e);
            (
                RunStatus::Errored,
                Some(RunEvent::Error {
                    error: e.to_string(),
                }),
            )
        }
    };

    finisher.finish(status);
    if let Some(hooks) = &hooks {
        hooks.on_run_end(run_id, status).await;
    }
    let _ = terminal.send(last_event);
}

/// Releases the run if the consumer drops the stream before it ends.
struct DisconnectGuard {
    finisher: RunFinisher,
    cancellation: RunCancellation,
    armed: bool,
}

impl DisconnectGuard {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if self.armed {
            info!(run_id = %self.finisher.run_id, "Run stream dropped before completion");
            self.finisher.disconnect(&self.cancellation);
        }
    }
}

fn consume(
    meta: RunEvent,
    mut rx: mpsc::Receiver<RunEvent>,
    terminal: oneshot::Receiver<Option<RunEvent>>,
    cancellation: RunCancellation,
    finisher: RunFinisher,
) -> BoxStream<'static, RunEvent> {
    // Built outside the generator so a stream dropped before its first poll
    // still releases the run.
    let mut guard = DisconnectGuard {
        finisher: finisher.clone(),
        cancellation: cancellation.clone(),
        armed: true,
    };
    Box::pin(async_stream::stream! {
        yield meta;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancellation.immediate_cancelled() => None,
                event = rx.recv() => event,
            };
            match next {
                Some(event) => yield event,
                None => break,
            }
        }

        if cancellation.is_immediate() {
            finisher.finish(RunStatus::Cancelled);
        } else if let Ok(Some(event)) = terminal.await {
            yield event;
        }
        guard.disarm();
        yield RunEvent::Done;
    })
}

/// Event stream of one run. Dropping it before the end counts as a disconnect.
pub struct RunStream {
    run_id: RunId,
    conversation_id: ConversationId,
    inner: BoxStream<'static, RunEvent>,
}

impl RunStream {
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn conversation_id(&self) -> &ConversationId {
        &self.conversation_id
    }

    /// Drains the stream and returns the final output, or the error text.
    pub async fn final_output(mut self) -> Result<String, String> {
        let mut outcome = None;
        while let Some(event) = self.next().await {
            match event {
                RunEvent::Completed { final_output, .. } => outcome = Some(Ok(final_output)),
                RunEvent::Error { error } => outcome = Some(Err(error)),
                RunEvent::Done => break,
                _ => {}
            }
        }
        outcome.unwrap_or_else(|| Err(RunError::Cancelled.to_string()))
    }
}

impl Stream for RunStream {
    type Item = RunEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<RunEvent>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}
