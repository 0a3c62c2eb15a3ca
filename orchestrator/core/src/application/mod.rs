// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod cleaner;
pub mod operations;
pub mod queries;
pub mod runner;

pub use cleaner::{CleanupReport, PendingOperationCleaner};
pub use operations::{load_operation, Operation, OperationError, OperationManager};
pub use runner::{OperationObserver, OperationRunner, TaskId, TaskStatus, TaskTracker};
