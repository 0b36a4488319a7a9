// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `switchboard-swarm` — Agency Composition Crate
//!
//! Turns a chart of agents into a running agency: the communication graph
//! the runtime consults for entry points and permitted edges, the manifest it
//! is declared in, and the [`Agency`](application::Agency) facade callers talk to.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `CommunicationGraph`, `ChartEntry`, `ConfigurationError`, `AgencyManifest` |
//! | [`application`] | Application | `Agency`, `AgencyResponse` |
//!
//! ## Key Concepts
//!
//! - **Chart**: ordered list of entry points (`Agent`) and permitted edges
//!   (`[Sender, Recipient]`). Edges may form cycles.
//! - **Delegation action**: `send_message_to_<Recipient>`, wired on the sender
//!   once per distinct recipient when the graph is built.
//! - **Shared thread**: every entry point reads and writes the same
//!   user-facing conversation; delegation hops keep their own
//!   `(recipient, caller)` threads inside the same log.

pub mod domain;
pub mod application;

pub use application::{Agency, AgencyResponse};
pub use domain::*;
