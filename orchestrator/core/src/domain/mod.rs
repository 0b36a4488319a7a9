// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain model: agents, capabilities, conversation messages, runs and the
//! contracts of external collaborators (completion service, persistence).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and traits shared by every other layer

pub mod agent;
pub mod config;
pub mod directory;
pub mod events;
pub mod hooks;
pub mod llm;
pub mod lock;
pub mod message;
pub mod repository;
pub mod run;
pub mod tool;
