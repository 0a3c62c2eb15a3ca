// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pending Operation Cleaner
//!
//! Reconciliation entry point for records left behind by a crash or by a
//! failed rollback. Each record is rebuilt into its operation and driven
//! through Clean then CleanDone. Both steps are idempotent, so a sweep can
//! be repeated or interrupted at any point. When to sweep is the embedding
//! service's decision: `clean_all` at startup, `clean_failed` while
//! operations may be in flight.

use chrono::Utc;
use tracing::{info, warn};

use crate::application::operations::{load_operation, OperationError};
use crate::domain::config::OperationsConfig;
use crate::domain::events::OperationEvent;
use crate::domain::executor::Executor;
use crate::domain::ids::PendingOperationId;
use crate::domain::pending::{PendingOperationEntry, PendingOperationStatus};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::store::Store;

/// Outcome of a sweep
#[derive(Debug, Default)]
pub struct CleanupReport {
    pub cleaned: Vec<PendingOperationId>,
    pub failed: Vec<(PendingOperationId, OperationError)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

pub struct PendingOperationCleaner {
    store: Store,
    config: OperationsConfig,
    event_bus: Option<EventBus>,
}

impl PendingOperationCleaner {
    pub fn new(store: Store, config: OperationsConfig) -> Self {
        Self {
            store,
            config,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Clean every stored record; only safe when nothing is in flight
    pub async fn clean_all(&self, executor: &dyn Executor) -> Result<CleanupReport, OperationError> {
        self.sweep(executor, |_| true).await
    }

    /// Clean the records marked `Failed`
    pub async fn clean_failed(&self, executor: &dyn Executor) -> Result<CleanupReport, OperationError> {
        self.sweep(executor, |op| op.status == PendingOperationStatus::Failed)
            .await
    }

    async fn sweep<F>(&self, executor: &dyn Executor, select: F) -> Result<CleanupReport, OperationError>
    where
        F: Fn(&PendingOperationEntry) -> bool,
    {
        let mut report = CleanupReport::default();
        let records: Vec<PendingOperationEntry> = self.store.list_entries()?;
        info!("Found {} pending operations", records.len());

        for record in records.into_iter().filter(|op| select(op)) {
            let id = record.id.clone();
            match self.clean_record(executor, record).await {
                Ok(()) => report.cleaned.push(id),
                Err(e) => {
                    warn!(op_id = %id, "Unable to clean pending operation: {}", e);
                    report.failed.push((id, e));
                }
            }
        }

        info!(
            cleaned = report.cleaned.len(),
            failed = report.failed.len(),
            "Pending operation sweep finished"
        );
        Ok(report)
    }

    /// Clean a single record; a record that no longer exists is already clean
    pub async fn clean_one(&self, executor: &dyn Executor, id: &PendingOperationId) -> Result<(), OperationError> {
        let record = self
            .store
            .view(|tx| tx.try_load::<PendingOperationEntry>(id.as_str()))?;
        match record {
            Some(record) => self.clean_record(executor, record).await,
            None => {
                info!(op_id = %id, "Pending operation already gone");
                Ok(())
            }
        }
    }

    async fn clean_record(&self, executor: &dyn Executor, record: PendingOperationEntry) -> Result<(), OperationError> {
        let mut op = match load_operation(&self.store, &self.config, record.clone()) {
            Ok(op) => op,
            Err(e) => {
                self.mark_record_failed(&record)?;
                return Err(e);
            }
        };
        info!(op_id = %record.id, label = op.label(), "Cleaning pending operation");

        let cleaned = match op.clean(executor).await {
            Ok(()) => op.clean_done(),
            Err(e) => Err(e),
        };
        if let Err(e) = cleaned {
            if let Err(mark_error) = op.mark_failed() {
                warn!(op_id = %record.id, "Unable to mark pending operation as failed: {}", mark_error);
            }
            return Err(e);
        }

        if let Some(bus) = &self.event_bus {
            bus.publish(OperationEvent::OperationCleaned {
                op_id: record.id.clone(),
                label: op.label().to_string(),
                cleaned_at: Utc::now(),
            });
        }
        Ok(())
    }

    /// Used when the record cannot even be turned back into an operation
    fn mark_record_failed(&self, record: &PendingOperationEntry) -> Result<(), OperationError> {
        self.store.update(|tx| {
            if let Some(mut op) = tx.try_load::<PendingOperationEntry>(record.id.as_str())? {
                op.status = PendingOperationStatus::Failed;
                op.save(tx)?;
            }
            Ok::<_, OperationError>(())
        })
    }
}
