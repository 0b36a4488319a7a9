// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agency;

pub use agency::{Agency, AgencyResponse};
