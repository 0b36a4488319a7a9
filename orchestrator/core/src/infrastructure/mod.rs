// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod conversations;
pub mod event_bus;
pub mod llm;
pub mod message_store;
pub mod remote_tool;
pub mod repositories;
pub mod run_registry;

pub use conversations::ConversationStore;
pub use event_bus::EventBus;
pub use message_store::{MessageStore, MessageStoreError};
pub use run_registry::RunRegistry;
