// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Operation Runner
//!
//! Drives an [`Operation`] through its steps:
//!
//! 1. `build` (errors go straight back to the caller, nothing was staged)
//! 2. `exec`, repeated up to `max_retries()` more times while the error is
//!    retryable
//! 3. `finalize` on success, otherwise `rollback`
//! 4. when the rollback fails too, the pending record is marked `Failed`
//!    and kept for the cleanup sweep
//!
//! `spawn` is the asynchronous variant used by request handlers: Build runs
//! before it returns, the remaining steps run on a tokio task whose outcome
//! lands in the [`TaskTracker`].

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, warn, Instrument};

use crate::application::operations::{Operation, OperationError};
use crate::domain::config::OperationsConfig;
use crate::domain::events::OperationEvent;
use crate::domain::executor::Executor;
use crate::domain::ids::{generate_id, PendingOperationId};
use crate::infrastructure::event_bus::EventBus;

/// Progress callbacks, invoked in step order
#[async_trait]
pub trait OperationObserver: Send + Sync {
    async fn on_built(&self, op_id: &PendingOperationId, label: &str);
    async fn on_exec_failed(&self, op_id: &PendingOperationId, attempt: u32, error: &str);
    async fn on_completed(&self, op_id: &PendingOperationId, resource_url: &str);
    async fn on_rolled_back(&self, op_id: &PendingOperationId, error: &str);
    async fn on_marked_failed(&self, op_id: &PendingOperationId, error: &str);
}

/// Handle of a spawned operation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub String);

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Completed { resource_url: String },
    Failed { message: String },
}

/// Outcome table polled by the request layer
#[derive(Clone, Default)]
pub struct TaskTracker {
    tasks: Arc<RwLock<HashMap<TaskId, TaskStatus>>>,
}

impl TaskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self) -> TaskId {
        let id = TaskId(generate_id());
        self.tasks.write().insert(id.clone(), TaskStatus::Pending);
        id
    }

    pub fn complete(&self, id: &TaskId, resource_url: String) {
        self.tasks
            .write()
            .insert(id.clone(), TaskStatus::Completed { resource_url });
    }

    pub fn fail(&self, id: &TaskId, message: String) {
        self.tasks
            .write()
            .insert(id.clone(), TaskStatus::Failed { message });
    }

    pub fn status(&self, id: &TaskId) -> Option<TaskStatus> {
        self.tasks.read().get(id).cloned()
    }

    /// Forget a finished task; pending tasks are kept
    pub fn remove(&self, id: &TaskId) -> Option<TaskStatus> {
        let mut tasks = self.tasks.write();
        match tasks.get(id) {
            Some(TaskStatus::Pending) | None => None,
            Some(_) => tasks.remove(id),
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }
}

#[derive(Clone)]
pub struct OperationRunner {
    executor: Arc<dyn Executor>,
    event_bus: EventBus,
    observer: Option<Arc<dyn OperationObserver>>,
    retry_delay: Duration,
    tasks: TaskTracker,
}

impl OperationRunner {
    pub fn new(executor: Arc<dyn Executor>, event_bus: EventBus, config: &OperationsConfig) -> Self {
        Self {
            executor,
            event_bus,
            observer: None,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
            tasks: TaskTracker::new(),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn OperationObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn tasks(&self) -> &TaskTracker {
        &self.tasks
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Build then drive the operation to completion
    ///
    /// Returns the resource URL of the affected resource (empty for deletes).
    pub async fn run(&self, op: &mut dyn Operation) -> Result<String, OperationError> {
        op.build()?;
        self.announce_built(op).await;
        self.run_after_build(op).await
    }

    /// Drive an operation whose Build already succeeded
    pub async fn run_after_build(&self, op: &mut dyn Operation) -> Result<String, OperationError> {
        let span = info_span!("operation", op_id = %op.pending_id(), label = op.label());
        self.drive(op).instrument(span).await
    }

    /// Build now, run the rest on a tokio task
    pub fn spawn(&self, mut op: Box<dyn Operation>) -> Result<(TaskId, JoinHandle<()>), OperationError> {
        op.build()?;
        let task_id = self.tasks.register();
        info!(task_id = %task_id, op_id = %op.pending_id(), label = op.label(), "Spawned operation");

        let runner = self.clone();
        let id = task_id.clone();
        let handle = tokio::spawn(async move {
            runner.announce_built(op.as_ref()).await;
            match runner.run_after_build(op.as_mut()).await {
                Ok(resource_url) => runner.tasks.complete(&id, resource_url),
                Err(e) => runner.tasks.fail(&id, e.to_string()),
            }
        });
        Ok((task_id, handle))
    }

    async fn announce_built(&self, op: &dyn Operation) {
        info!(op_id = %op.pending_id(), label = op.label(), "Built pending operation");
        self.event_bus.publish(OperationEvent::OperationBuilt {
            op_id: op.pending_id().clone(),
            label: op.label().to_string(),
            built_at: Utc::now(),
        });
        if let Some(observer) = &self.observer {
            observer.on_built(op.pending_id(), op.label()).await;
        }
    }

    async fn drive(&self, op: &mut dyn Operation) -> Result<String, OperationError> {
        let op_id = op.pending_id().clone();
        let label = op.label();
        let max_attempts = op.max_retries().saturating_add(1);

        let mut attempt = 0;
        let exec_result = loop {
            attempt += 1;
            match op.exec(self.executor.as_ref()).await {
                Ok(()) => break Ok(()),
                Err(e) => {
                    let retryable = e.is_retryable();
                    warn!(attempt, max_attempts, retryable, "Exec failed: {}", e);
                    self.event_bus.publish(OperationEvent::ExecAttemptFailed {
                        op_id: op_id.clone(),
                        label: label.to_string(),
                        attempt,
                        error: e.to_string(),
                        retryable,
                        failed_at: Utc::now(),
                    });
                    if let Some(observer) = &self.observer {
                        observer.on_exec_failed(&op_id, attempt, &e.to_string()).await;
                    }
                    if !retryable || attempt >= max_attempts {
                        break Err(e);
                    }
                    if !self.retry_delay.is_zero() {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        };

        match exec_result {
            Ok(()) => {
                op.finalize()?;
                let resource_url = op.resource_url();
                info!("Operation completed");
                self.event_bus.publish(OperationEvent::OperationCompleted {
                    op_id: op_id.clone(),
                    label: label.to_string(),
                    resource_url: resource_url.clone(),
                    completed_at: Utc::now(),
                });
                if let Some(observer) = &self.observer {
                    observer.on_completed(&op_id, &resource_url).await;
                }
                Ok(resource_url)
            }
            Err(exec_error) => match op.rollback(self.executor.as_ref()).await {
                Ok(()) => {
                    info!("Operation rolled back after: {}", exec_error);
                    self.event_bus.publish(OperationEvent::OperationRolledBack {
                        op_id: op_id.clone(),
                        label: label.to_string(),
                        error: exec_error.to_string(),
                        rolled_back_at: Utc::now(),
                    });
                    if let Some(observer) = &self.observer {
                        observer.on_rolled_back(&op_id, &exec_error.to_string()).await;
                    }
                    Err(exec_error)
                }
                Err(rollback_error) => {
                    error!("Rollback failed: {}", rollback_error);
                    if let Err(e) = op.mark_failed() {
                        error!("Unable to mark pending operation as failed: {}", e);
                    }
                    let failure = OperationError::CompensationFailure {
                        label: label.to_string(),
                        exec: Box::new(exec_error),
                        rollback: Box::new(rollback_error),
                    };
                    self.event_bus.publish(OperationEvent::OperationMarkedFailed {
                        op_id: op_id.clone(),
                        label: label.to_string(),
                        error: failure.to_string(),
                        marked_at: Utc::now(),
                    });
                    if let Some(observer) = &self.observer {
                        observer.on_marked_failed(&op_id, &failure.to_string()).await;
                    }
                    Err(failure)
                }
            },
        }
    }
}
