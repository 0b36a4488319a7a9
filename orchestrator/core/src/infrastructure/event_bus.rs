// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus - Pub/Sub for run lifecycle events
//
// In-memory broadcast of run and delegation lifecycle notifications so
// observers (CLI logging, dashboards, tests) can follow runs without
// consuming a run's own event stream. Events are lost on restart.

use crate::domain::events::RunLifecycleEvent;
use crate::domain::message::RunId;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<RunLifecycleEvent>>,
}

impl EventBus {
    /// Capacity determines how many events are buffered before slow receivers lag
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Create event bus with default capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    pub fn publish(&self, event: RunLifecycleEvent) {
        debug!("Publishing event: {:?}", event);

        // send() only fails when nobody is listening
        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            run_id: None,
        }
    }

    /// Subscribe to the events of one run (delegation hops report their own ids
    /// and are not included).
    pub fn subscribe_run(&self, run_id: RunId) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
            run_id: Some(run_id),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<RunLifecycleEvent>,
    run_id: Option<RunId>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<RunLifecycleEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(|e| match e {
                broadcast::error::RecvError::Closed => EventBusError::Closed,
                broadcast::error::RecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            match self.run_id {
                Some(run_id) if event.run_id() != run_id => continue,
                _ => return Ok(event),
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<RunLifecycleEvent, EventBusError> {
        loop {
            let event = self.receiver.try_recv().map_err(|e| match e {
                broadcast::error::TryRecvError::Empty => EventBusError::Empty,
                broadcast::error::TryRecvError::Closed => EventBusError::Closed,
                broadcast::error::TryRecvError::Lagged(n) => {
                    warn!("Event receiver lagged by {} events", n);
                    EventBusError::Lagged(n)
                }
            })?;
            match self.run_id {
                Some(run_id) if event.run_id() != run_id => continue,
                _ => return Ok(event),
            }
        }
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message::ConversationId;
    use crate::domain::run::RunStatus;
    use chrono::Utc;

    #[tokio::test]
    async fn test_run_filtering() {
        let bus = EventBus::new(10);
        let run_id = RunId::new();
        let mut receiver = bus.subscribe_run(run_id);

        bus.publish(RunLifecycleEvent::RunStarted {
            run_id: RunId::new(),
            conversation_id: ConversationId::from("other"),
            agent: "CEO".into(),
            started_at: Utc::now(),
        });
        bus.publish(RunLifecycleEvent::RunFinished {
            run_id,
            status: RunStatus::Completed,
            finished_at: Utc::now(),
        });

        match receiver.recv().await.unwrap() {
            RunLifecycleEvent::RunFinished { run_id: id, status, .. } => {
                assert_eq!(id, run_id);
                assert_eq!(status, RunStatus::Completed);
            }
            other => panic!("Wrong event received: {other:?}"),
        }
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new(10);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(RunLifecycleEvent::RunFinished {
            run_id: RunId::new(),
            status: RunStatus::Cancelled,
            finished_at: Utc::now(),
        });
        let _ = a.recv().await.unwrap();
        let _ = b.recv().await.unwrap();
    }
}
