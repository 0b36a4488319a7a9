// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Producer side of a run's bounded event channel.
//
// Shared by the top-level run and every nested hop, so all events of one
// interaction land in one ordered channel. Emission is the second
// cancellation seam: nothing is sent once an immediate cancel is requested.

use crate::application::error::RunError;
use crate::domain::events::RunEvent;
use crate::domain::run::{CancelMode, RunCancellation};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

const OPEN: u8 = 0;
const TIMED_OUT: u8 = 1;
const DISCONNECTED: u8 = 2;

#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<RunEvent>,
    cancellation: RunCancellation,
    timeout: Duration,
    state: Arc<AtomicU8>,
}

impl EventSink {
    pub fn channel(
        capacity: usize,
        cancellation: RunCancellation,
        timeout: Duration,
    ) -> (Self, mpsc::Receiver<RunEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                tx,
                cancellation,
                timeout,
                state: Arc::new(AtomicU8::new(OPEN)),
            },
            rx,
        )
    }

    /// Fails if the stream can no longer accept events.
    pub fn ensure_open(&self) -> Result<(), RunError> {
        if self.cancellation.is_immediate() {
            return Err(RunError::Cancelled);
        }
        match self.state.load(Ordering::SeqCst) {
            TIMED_OUT => Err(RunError::StreamTimeout(self.timeout_ms())),
            DISCONNECTED => Err(RunError::Disconnected),
            _ => Ok(()),
        }
    }

    /// Sends one event, waiting at most the consumer timeout for capacity.
    pub async fn emit(&self, event: RunEvent) -> Result<(), RunError> {
        self.ensure_open()?;
        let send = tokio::time::timeout(self.timeout, self.tx.send(event));
        tokio::select! {
            biased;
            _ = self.cancellation.immediate_cancelled() => Err(RunError::Cancelled),
            result = send => match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(_)) => {
                    self.state.store(DISCONNECTED, Ordering::SeqCst);
                    self.cancellation.cancel(CancelMode::Immediate);
                    Err(RunError::Disconnected)
                }
                Err(_) => {
                    self.state.store(TIMED_OUT, Ordering::SeqCst);
                    warn!(timeout_ms = self.timeout_ms(), "Stream consumer stalled, closing stream");
                    Err(RunError::StreamTimeout(self.timeout_ms()))
                }
            },
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}
