// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::ids::PendingOperationId;

/// Progress of one pending operation through Build/Exec/Finalize
///
/// Published by the runner and the cleanup sweep on the event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OperationEvent {
    OperationBuilt {
        op_id: PendingOperationId,
        label: String,
        built_at: DateTime<Utc>,
    },
    ExecAttemptFailed {
        op_id: PendingOperationId,
        label: String,
        attempt: u32,
        error: String,
        retryable: bool,
        failed_at: DateTime<Utc>,
    },
    OperationCompleted {
        op_id: PendingOperationId,
        label: String,
        resource_url: String,
        completed_at: DateTime<Utc>,
    },
    OperationRolledBack {
        op_id: PendingOperationId,
        label: String,
        error: String,
        rolled_back_at: DateTime<Utc>,
    },
    OperationMarkedFailed {
        op_id: PendingOperationId,
        label: String,
        error: String,
        marked_at: DateTime<Utc>,
    },
    OperationCleaned {
        op_id: PendingOperationId,
        label: String,
        cleaned_at: DateTime<Utc>,
    },
}

impl OperationEvent {
    pub fn op_id(&self) -> &PendingOperationId {
        match self {
            OperationEvent::OperationBuilt { op_id, .. }
            | OperationEvent::ExecAttemptFailed { op_id, .. }
            | OperationEvent::OperationCompleted { op_id, .. }
            | OperationEvent::OperationRolledBack { op_id, .. }
            | OperationEvent::OperationMarkedFailed { op_id, .. }
            | OperationEvent::OperationCleaned { op_id, .. } => op_id,
        }
    }

    /// Whether no further events will follow for this operation
    pub fn is_terminal(&self) -> bool {
        !matches!(
            self,
            OperationEvent::OperationBuilt { .. } | OperationEvent::ExecAttemptFailed { .. }
        )
    }
}
