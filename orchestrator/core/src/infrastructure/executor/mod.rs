// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Executor Infrastructure Module
//!
//! Implementations of the `Executor` trait. Production deployments plug in
//! their own command channel; the mock keeps simulated remote state in
//! memory and supports fault injection for tests.

mod mock;

pub use mock::{ExecCall, MockExecutor};
