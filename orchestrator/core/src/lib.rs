// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Orchestration runtime for agents that delegate to each other across a
//! declared communication graph.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, persistence, turn runner, messenger and run coordinator

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
