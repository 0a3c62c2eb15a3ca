// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Read-side queries: listings, info responses and usage statistics.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::application::operations::dirvolume::dirvolume_request;
use crate::application::operations::OperationError;
use crate::domain::config::OperationsConfig;
use crate::domain::dirvolume::{DirvolumeEntry, DirvolumeInfoResponse};
use crate::domain::executor::Executor;
use crate::domain::ids::{DirvolumeId, SubvolumeId};
use crate::domain::subvolume::{SubvolumeEntry, SubvolumeInfoResponse};
use crate::infrastructure::store::Store;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirvolumeStatsResponse {
    pub id: DirvolumeId,
    pub total_size: u64,
    pub used_size: u64,
    pub avail_size: u64,
}

/// Every stored directory volume, in-flight ones included
pub fn list_dirvolumes(store: &Store) -> Result<Vec<DirvolumeId>, OperationError> {
    Ok(DirvolumeEntry::list(store)?)
}

/// Directory volumes with no pending operation
pub fn list_complete_dirvolumes(store: &Store) -> Result<Vec<DirvolumeId>, OperationError> {
    let entries: Vec<DirvolumeEntry> = store.list_entries()?;
    Ok(entries
        .into_iter()
        .filter(|dv| !dv.pending.is_pending())
        .map(|dv| dv.info.id)
        .collect())
}

pub fn list_subvolumes(store: &Store) -> Result<Vec<SubvolumeId>, OperationError> {
    Ok(SubvolumeEntry::list(store)?)
}

pub fn list_complete_subvolumes(store: &Store) -> Result<Vec<SubvolumeId>, OperationError> {
    let entries: Vec<SubvolumeEntry> = store.list_entries()?;
    Ok(entries
        .into_iter()
        .filter(|sv| !sv.pending.is_pending())
        .map(|sv| sv.info.id)
        .collect())
}

pub fn dirvolume_info(store: &Store, id: &DirvolumeId) -> Result<DirvolumeInfoResponse, OperationError> {
    let dv = store.view(|tx| DirvolumeEntry::from_id(tx, id))?;
    Ok(dv.new_info_response())
}

pub fn subvolume_info(store: &Store, id: &SubvolumeId) -> Result<SubvolumeInfoResponse, OperationError> {
    let sv = store.view(|tx| SubvolumeEntry::from_id(tx, id))?;
    Ok(sv.new_info_response())
}

/// Ask the remote side for usage, up to `stats_attempts` times
pub async fn dirvolume_stats(
    store: &Store,
    executor: &dyn Executor,
    config: &OperationsConfig,
    id: &DirvolumeId,
) -> Result<DirvolumeStatsResponse, OperationError> {
    let attempts = config.stats_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        let (host, req) = dirvolume_request(store, id)?;
        match executor
            .dirvolume_stats(&host, &config.pool_volume_name, &req)
            .await
        {
            Ok(usage) => {
                return Ok(DirvolumeStatsResponse {
                    id: id.clone(),
                    total_size: usage.total_size,
                    used_size: usage.used_size,
                    avail_size: usage.avail_size,
                })
            }
            Err(e) if attempt < attempts => {
                info!(dirvolume_id = %id, attempt, "Retrying stats: {}", e);
            }
            Err(e) => return Err(OperationError::Permanent(e)),
        }
    }
}
