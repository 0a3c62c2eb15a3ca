// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Directory-volume orchestration core
//!
//! Every mutating action on a directory volume or sub-volume runs through
//! the pending-operation state machine: Build records intent in the store,
//! Exec drives the remote side, Finalize commits the result. Failed actions
//! are compensated through Rollback, or left marked `Failed` for the cleanup
//! sweep.
//!
//! # Architecture
//!
//! - **domain:** records, ledger, export codec, executor contract
//! - **application:** operations, runner, cleanup sweep, queries
//! - **infrastructure:** sled store, event bus, mock executor, telemetry

pub mod application;
pub mod domain;
pub mod infrastructure;
