// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Agency Domain Layer
//!
//! Pure graph types plus the declarative manifest they are built from.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`graph`] | `CommunicationGraph`, `ChartEntry`, `ChartRef`, `ConfigurationError` |
//! | [`manifest`] | `AgencyManifest`, `AgentSpec`, `PersistenceConfig` |

pub mod graph;
pub mod manifest;

pub use graph::*;
pub use manifest::*;
