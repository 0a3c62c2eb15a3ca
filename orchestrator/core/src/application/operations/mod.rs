// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pending Operations
//!
//! Every mutating action is an [`Operation`] driven through
//! Build -> Exec -> Finalize, or Build -> Exec(fail) -> Rollback. Clean and
//! CleanDone are the idempotent compensation steps Rollback is built from;
//! the cleanup sweep calls them directly on reconstructed operations.
//!
//! | Step | Transaction | Talks to executor |
//! |------|-------------|-------------------|
//! | `build` | one write | no |
//! | `exec` | read only | yes |
//! | `finalize` | one write | no |
//! | `clean` | read only, except unstaging an export directive | yes |
//! | `clean_done` | one write | no |
//!
//! Operations share an [`OperationManager`] holding the store handle, the
//! operation settings and the pending record. Closures handed to the store
//! may run more than once, so they work on clones and the results are
//! assigned back only after commit.

pub mod dirvolume;
pub mod subvolume;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::config::OperationsConfig;
use crate::domain::dirvolume::DirvolumeEntry;
use crate::domain::executor::{Executor, ExecutorError};
use crate::domain::ids::{DirvolumeId, PendingOperationId, SubvolumeId};
use crate::domain::pending::{
    PendingAction, PendingChangeType, PendingItem, PendingOperationEntry, PendingOperationStatus,
    PendingOperationType,
};
use crate::domain::repository::StoreError;
use crate::domain::subvolume::SubvolumeEntry;
use crate::infrastructure::store::Store;

pub use dirvolume::{
    DirvolumeCreateOperation, DirvolumeDeleteOperation, DirvolumeExpandOperation,
    DirvolumeExportOperation, DirvolumeUnexportOperation,
};
pub use subvolume::{SubvolumeCreateOperation, SubvolumeDeleteOperation, SubvolumeExpandOperation};

/// Operation errors
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("Id not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Remote failure worth repeating Exec for
    #[error("Retryable remote error: {0}")]
    Retryable(ExecutorError),

    #[error("Remote error: {0}")]
    Permanent(ExecutorError),

    /// Exec failed and so did the compensation; the record is kept as `Failed`
    #[error("{label} failed: {exec}; rollback failed: {rollback}")]
    CompensationFailure {
        label: String,
        exec: Box<OperationError>,
        rollback: Box<OperationError>,
    },

    #[error("Unable to reconstruct operation: {0}")]
    Reconstruction(String),

    #[error("{0}")]
    NoHost(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl OperationError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, OperationError::Retryable(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OperationError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, OperationError::Conflict(_))
    }
}

impl From<StoreError> for OperationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { bucket, id } => OperationError::NotFound(format!("{} {}", bucket, id)),
            other => OperationError::Store(other),
        }
    }
}

/// Contract shared by every operation kind
#[async_trait]
pub trait Operation: Send + Sync {
    /// Human readable kind, e.g. "Create Dirvolume"
    fn label(&self) -> &'static str;

    /// Where the affected resource can be found; empty for deletes
    fn resource_url(&self) -> String;

    /// Extra Exec attempts after the first; 0 for kinds that never retry
    fn max_retries(&self) -> u32;

    fn manager(&self) -> &OperationManager;

    fn manager_mut(&mut self) -> &mut OperationManager;

    fn pending_id(&self) -> &PendingOperationId {
        &self.manager().op.id
    }

    fn build(&mut self) -> Result<(), OperationError>;

    async fn exec(&self, executor: &dyn Executor) -> Result<(), OperationError>;

    fn finalize(&mut self) -> Result<(), OperationError>;

    /// Undo after a failed Exec; defaults to Clean then CleanDone
    async fn rollback(&mut self, executor: &dyn Executor) -> Result<(), OperationError> {
        self.clean(executor).await?;
        self.clean_done()
    }

    /// Best-effort remote teardown, safe to repeat
    async fn clean(&self, executor: &dyn Executor) -> Result<(), OperationError>;

    /// Remove the local trace of the operation, safe to repeat
    fn clean_done(&mut self) -> Result<(), OperationError>;

    fn mark_failed(&mut self) -> Result<(), OperationError> {
        self.manager_mut().mark_failed()
    }
}

/// Base every operation is composed over
pub struct OperationManager {
    pub(crate) store: Store,
    pub(crate) config: OperationsConfig,
    pub(crate) op: PendingOperationEntry,
}

impl OperationManager {
    pub fn new(store: Store, config: OperationsConfig) -> Self {
        Self {
            store,
            config,
            op: PendingOperationEntry::new(),
        }
    }

    /// Manager around a record loaded from the store
    pub fn from_pending(store: Store, config: OperationsConfig, op: PendingOperationEntry) -> Self {
        Self { store, config, op }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &OperationsConfig {
        &self.config
    }

    pub fn pending(&self) -> &PendingOperationEntry {
        &self.op
    }

    /// Keep the record for later reconciliation; a record already removed
    /// stays removed
    pub fn mark_failed(&mut self) -> Result<(), OperationError> {
        let op = self.store.update(|tx| {
            let Some(mut op) = tx.try_load::<PendingOperationEntry>(self.op.id.as_str())? else {
                return Ok(None);
            };
            op.status = PendingOperationStatus::Failed;
            op.save(tx)?;
            Ok::<_, OperationError>(Some(op))
        })?;
        match op {
            Some(op) => {
                warn!(op_id = %op.id, "Marked pending operation as failed");
                self.op = op;
            }
            None => info!(op_id = %self.op.id, "Pending operation already gone, nothing to mark"),
        }
        Ok(())
    }
}

/// Fails with `Conflict` when the resource already carries a pending id
pub(crate) fn ensure_idle(pending: &PendingItem, what: &str, id: &str) -> Result<(), OperationError> {
    match &pending.id {
        Some(op_id) => Err(OperationError::Conflict(format!(
            "{} {} is busy with pending operation {}",
            what, id, op_id
        ))),
        None => Ok(()),
    }
}

fn single_action<'a>(
    op: &'a PendingOperationEntry,
    change: PendingChangeType,
    kind: &str,
    verb: &str,
) -> Result<&'a PendingAction, OperationError> {
    let matching: Vec<&PendingAction> = op.actions.iter().filter(|a| a.change == change).collect();
    match matching.as_slice() {
        [action] => Ok(*action),
        _ => Err(OperationError::Reconstruction(format!(
            "Incorrect number of {} ({}) for {} operation: {}",
            kind,
            matching.len(),
            verb,
            op.id
        ))),
    }
}

fn load_dirvolume_for(
    store: &Store,
    op: &PendingOperationEntry,
    change: PendingChangeType,
    verb: &str,
) -> Result<(DirvolumeEntry, PendingAction), OperationError> {
    let action = single_action(op, change, "dirvolumes", verb)?.clone();
    let id = DirvolumeId::from(action.id.as_str());
    let dv = store
        .view(|tx| DirvolumeEntry::from_id(tx, &id))
        .map_err(|e| missing_entry(e, "dirvolume", &action.id, op))?;
    Ok((dv, action))
}

fn load_subvolume_for(
    store: &Store,
    op: &PendingOperationEntry,
    change: PendingChangeType,
    verb: &str,
) -> Result<(SubvolumeEntry, PendingAction), OperationError> {
    let action = single_action(op, change, "subvolumes", verb)?.clone();
    let id = SubvolumeId::from(action.id.as_str());
    let sv = store
        .view(|tx| SubvolumeEntry::from_id(tx, &id))
        .map_err(|e| missing_entry(e, "subvolume", &action.id, op))?;
    Ok((sv, action))
}

fn missing_entry(e: StoreError, kind: &str, id: &str, op: &PendingOperationEntry) -> OperationError {
    if e.is_not_found() {
        OperationError::Reconstruction(format!(
            "{} {} referenced by pending operation {} is missing",
            kind, id, op.id
        ))
    } else {
        OperationError::Store(e)
    }
}

/// Rebuild the operation a stored pending record was created by
///
/// The action log must hold exactly one action of the kind the record's
/// type implies; anything else is refused.
pub fn load_operation(
    store: &Store,
    config: &OperationsConfig,
    op: PendingOperationEntry,
) -> Result<Box<dyn Operation>, OperationError> {
    let manager = |op: PendingOperationEntry| OperationManager::from_pending(store.clone(), config.clone(), op);

    let operation: Box<dyn Operation> = match op.op_type {
        PendingOperationType::CreateDirvolume => {
            let (dv, _) = load_dirvolume_for(store, &op, PendingChangeType::AddDirvolume, "create")?;
            Box::new(DirvolumeCreateOperation::from_pending(manager(op), dv))
        }
        PendingOperationType::DeleteDirvolume => {
            let (dv, _) = load_dirvolume_for(store, &op, PendingChangeType::DeleteDirvolume, "delete")?;
            Box::new(DirvolumeDeleteOperation::from_pending(manager(op), dv))
        }
        PendingOperationType::ExpandDirvolume => {
            let (dv, action) = load_dirvolume_for(store, &op, PendingChangeType::ExpandDirvolume, "expand")?;
            Box::new(DirvolumeExpandOperation::from_pending(manager(op), dv, action.delta))
        }
        PendingOperationType::ExportDirvolume => {
            let (dv, action) = load_dirvolume_for(store, &op, PendingChangeType::ExportDirvolume, "export")?;
            Box::new(DirvolumeExportOperation::from_pending(manager(op), dv, action.ip_list))
        }
        PendingOperationType::UnexportDirvolume => {
            let (dv, action) =
                load_dirvolume_for(store, &op, PendingChangeType::UnexportDirvolume, "unexport")?;
            Box::new(DirvolumeUnexportOperation::from_pending(manager(op), dv, action.ip_list))
        }
        PendingOperationType::CreateSubvolume => {
            let (sv, _) = load_subvolume_for(store, &op, PendingChangeType::AddSubvolume, "create")?;
            Box::new(SubvolumeCreateOperation::from_pending(manager(op), sv))
        }
        PendingOperationType::DeleteSubvolume => {
            let (sv, _) = load_subvolume_for(store, &op, PendingChangeType::DeleteSubvolume, "delete")?;
            Box::new(SubvolumeDeleteOperation::from_pending(manager(op), sv))
        }
        PendingOperationType::ExpandSubvolume => {
            let (sv, action) = load_subvolume_for(store, &op, PendingChangeType::ExpandSubvolume, "expand")?;
            Box::new(SubvolumeExpandOperation::from_pending(manager(op), sv, action.delta))
        }
        PendingOperationType::Unknown => {
            return Err(OperationError::Reconstruction(format!(
                "Pending operation {} has no operation type",
                op.id
            )));
        }
    };
    Ok(operation)
}

/// Load a record by id and rebuild its operation
pub fn load_operation_by_id(
    store: &Store,
    config: &OperationsConfig,
    id: &PendingOperationId,
) -> Result<Box<dyn Operation>, OperationError> {
    let op = store.view(|tx| PendingOperationEntry::from_id(tx, id))?;
    load_operation(store, config, op)
}
