// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Per-agent tool concurrency guard.
//!
//! Tools whose semantics forbid overlap (a single exclusive browser or
//! terminal session, for example) take an exclusive lease on the calling
//! agent's guard. Every other invocation registers on an advisory call
//! counter. Acquisition never blocks and never queues: contention is
//! reported to the caller immediately.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Snapshot of a guard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    pub busy: bool,
    pub owner: Option<String>,
    pub active_calls: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error(
        "agent `{agent}` is already running `{owner}`; wait for it to finish before calling `{requested}`"
    )]
    Busy {
        agent: String,
        owner: String,
        requested: String,
    },
}

#[derive(Debug, Default)]
struct Exclusive {
    busy: bool,
    owner: Option<String>,
}

#[derive(Debug)]
pub struct ConcurrencyGuard {
    agent: String,
    exclusive: Mutex<Exclusive>,
    active_calls: AtomicUsize,
}

impl ConcurrencyGuard {
    pub fn new(agent: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            exclusive: Mutex::new(Exclusive::default()),
            active_calls: AtomicUsize::new(0),
        }
    }

    /// Takes exclusive ownership for `owner`, failing at once if already busy.
    pub fn acquire(&self, owner: &str) -> Result<(), GuardError> {
        let mut state = self.exclusive.lock();
        if state.busy {
            return Err(GuardError::Busy {
                agent: self.agent.clone(),
                owner: state.owner.clone().unwrap_or_default(),
                requested: owner.to_string(),
            });
        }
        state.busy = true;
        state.owner = Some(owner.to_string());
        debug!(agent = %self.agent, owner, "Concurrency guard acquired");
        Ok(())
    }

    /// Clears the exclusive state unconditionally. Safe to call repeatedly.
    pub fn release(&self) {
        let mut state = self.exclusive.lock();
        state.busy = false;
        state.owner = None;
    }

    pub fn state(&self) -> LockState {
        let state = self.exclusive.lock();
        LockState {
            busy: state.busy,
            owner: state.owner.clone(),
            active_calls: self.active_calls.load(Ordering::SeqCst),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.exclusive.lock().busy
    }

    pub fn active_calls(&self) -> usize {
        self.active_calls.load(Ordering::SeqCst)
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    /// Exclusive lease released when dropped.
    pub fn try_lease(self: &Arc<Self>, owner: &str) -> Result<GuardLease, GuardError> {
        self.acquire(owner)?;
        Ok(GuardLease {
            guard: Arc::clone(self),
        })
    }

    /// Registers a non-exclusive call. Rejected while an exclusive tool holds the guard.
    pub fn try_track(self: &Arc<Self>, requested: &str) -> Result<CallTracker, GuardError> {
        let state = self.exclusive.lock();
        if state.busy {
            return Err(GuardError::Busy {
                agent: self.agent.clone(),
                owner: state.owner.clone().unwrap_or_default(),
                requested: requested.to_string(),
            });
        }
        self.active_calls.fetch_add(1, Ordering::SeqCst);
        Ok(CallTracker {
            guard: Arc::clone(self),
        })
    }
}

#[derive(Debug)]
pub struct GuardLease {
    guard: Arc<ConcurrencyGuard>,
}

impl Drop for GuardLease {
    fn drop(&mut self) {
        self.guard.release();
    }
}

#[derive(Debug)]
pub struct CallTracker {
    guard: Arc<ConcurrencyGuard>,
}

impl Drop for CallTracker {
    fn drop(&mut self) {
        self.guard.active_calls.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_twice_leaves_idle_state() {
        let guard = ConcurrencyGuard::new("Browser");
        guard.acquire("open_page").unwrap();
        guard.release();
        guard.release();
        assert_eq!(guard.state(), LockState::default());
    }

    #[test]
    fn test_second_acquire_fails_immediately() {
        let guard = ConcurrencyGuard::new("Browser");
        guard.acquire("A").unwrap();
        let err = guard.acquire("B").unwrap_err();
        assert!(err.to_string().contains("already running `A`"));
        let state = guard.state();
        assert!(state.busy);
        assert_eq!(state.owner.as_deref(), Some("A"));
    }

    #[test]
    fn test_lease_releases_on_drop() {
        let guard = Arc::new(ConcurrencyGuard::new("Browser"));
        {
            let _lease = guard.try_lease("click").unwrap();
            assert!(guard.is_busy());
            assert!(guard.try_lease("type").is_err());
        }
        assert!(!guard.is_busy());
    }

    #[test]
    fn test_tracker_counts_and_is_rejected_while_exclusive() {
        let guard = Arc::new(ConcurrencyGuard::new("Analyst"));
        let a = guard.try_track("search").unwrap();
        let b = guard.try_track("search").unwrap();
        assert_eq!(guard.active_calls(), 2);
        drop(a);
        assert_eq!(guard.active_calls(), 1);
        drop(b);

        let _lease = guard.try_lease("exclusive_session").unwrap();
        let err = guard.try_track("search").unwrap_err();
        assert!(err.to_string().contains("exclusive_session"));
        assert_eq!(guard.active_calls(), 0);
    }
}
