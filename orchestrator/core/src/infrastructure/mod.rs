// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod executor;
pub mod store;
pub mod telemetry;

pub use event_bus::EventBus;
pub use executor::MockExecutor;
pub use store::Store;
