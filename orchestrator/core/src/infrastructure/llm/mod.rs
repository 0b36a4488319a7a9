// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Completion Provider Infrastructure - Anti-Corruption Layer Implementations
//
// Each adapter translates between the domain completion contract and an
// external API. The registry maps model aliases onto adapters.

pub mod openai;
pub mod registry;
#[cfg(any(test, feature = "testing"))]
pub mod scripted;

pub use openai::OpenAIAdapter;
pub use registry::ProviderRegistry;
#[cfg(any(test, feature = "testing"))]
pub use scripted::{ScriptedCompletionService, ScriptedTurn};
