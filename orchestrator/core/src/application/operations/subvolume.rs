// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Sub-volume operations: create, delete, expand.

use async_trait::async_trait;
use tracing::{debug, info};

use super::{ensure_idle, Operation, OperationError, OperationManager};
use crate::domain::config::OperationsConfig;
use crate::domain::executor::{Executor, ExecutorError, SubvolumeRequest};
use crate::domain::ids::SubvolumeId;
use crate::domain::pending::PendingOperationEntry;
use crate::domain::repository::StoreError;
use crate::domain::subvolume::SubvolumeEntry;
use crate::domain::topology::{cluster_manage_host, ClusterEntry, VolumeEntry};
use crate::infrastructure::store::{Store, Tx};

struct SubvolumeTarget {
    entry: SubvolumeEntry,
    host: String,
    volume_name: String,
}

impl SubvolumeTarget {
    fn load(tx: &Tx<'_>, id: &SubvolumeId) -> Result<Self, OperationError> {
        let entry = SubvolumeEntry::from_id(tx, id)?;
        let volume = VolumeEntry::from_id(tx, &entry.info.volume_id)?;
        let cluster = ClusterEntry::from_id(tx, &volume.cluster_id)?;
        let host = cluster_manage_host(tx, &cluster)?.ok_or_else(|| {
            OperationError::NoHost(format!(
                "failed to find host for subvolume {} in volume {}",
                entry.info.id, volume.id
            ))
        })?;
        Ok(Self {
            entry,
            host,
            volume_name: volume.name,
        })
    }

    fn request(&self, size: u64) -> SubvolumeRequest {
        SubvolumeRequest {
            name: self.entry.info.name.clone(),
            size,
        }
    }
}

fn load_target(store: &Store, id: &SubvolumeId) -> Result<SubvolumeTarget, OperationError> {
    store.view(|tx| SubvolumeTarget::load(tx, id))
}

fn subvolume_name_in_volume(tx: &Tx<'_>, volume: &VolumeEntry, name: &str) -> Result<bool, StoreError> {
    for id in &volume.subvolumes {
        if SubvolumeEntry::from_id(tx, id)?.info.name == name {
            return Ok(true);
        }
    }
    Ok(false)
}

fn teardown_subvolume(tx: &Tx<'_>, sv: &SubvolumeEntry) -> Result<(), StoreError> {
    if let Some(mut volume) = tx.try_load::<VolumeEntry>(sv.info.volume_id.as_str())? {
        volume.subvolume_delete(&sv.info.id);
        volume.save(tx)?;
    }
    sv.delete(tx)
}

fn expunge_subvolume(store: &Store, id: &SubvolumeId, op: &PendingOperationEntry) -> Result<(), OperationError> {
    store.update(|tx| {
        if let Some(sv) = tx.try_load::<SubvolumeEntry>(id.as_str())? {
            teardown_subvolume(tx, &sv)?;
        }
        op.delete(tx)?;
        Ok::<_, OperationError>(())
    })
}

fn release_subvolume(store: &Store, id: &SubvolumeId, op: &PendingOperationEntry) -> Result<(), OperationError> {
    store.update(|tx| {
        if let Some(mut sv) = tx.try_load::<SubvolumeEntry>(id.as_str())? {
            op.finalize_subvolume(&mut sv);
            sv.save(tx)?;
        }
        op.delete(tx)?;
        Ok::<_, OperationError>(())
    })
}

async fn destroy_remote(store: &Store, executor: &dyn Executor, id: &SubvolumeId) -> Result<(), OperationError> {
    let target = match load_target(store, id) {
        Ok(target) => target,
        Err(e) if e.is_not_found() => {
            info!(subvolume_id = %id, "Subvolume already removed from store, skipping remote destroy");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    let req = target.request(target.entry.info.size);
    match executor
        .subvolume_destroy(&target.host, &target.volume_name, &req)
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!(subvolume_id = %id, "Remote subvolume already gone");
            Ok(())
        }
        Err(e @ ExecutorError::LockConflict(_)) => Err(OperationError::Retryable(e)),
        Err(e) => Err(OperationError::Permanent(e)),
    }
}

fn subvolume_url(id: &SubvolumeId) -> String {
    format!("/subvolumes/{}", id)
}

pub struct SubvolumeCreateOperation {
    mgr: OperationManager,
    sv: SubvolumeEntry,
}

impl SubvolumeCreateOperation {
    pub fn new(sv: SubvolumeEntry, store: Store, config: OperationsConfig) -> Self {
        Self {
            mgr: OperationManager::new(store, config),
            sv,
        }
    }

    pub fn from_pending(mgr: OperationManager, sv: SubvolumeEntry) -> Self {
        Self { mgr, sv }
    }

    pub fn entry(&self) -> &SubvolumeEntry {
        &self.sv
    }
}

#[async_trait]
impl Operation for SubvolumeCreateOperation {
    fn label(&self) -> &'static str {
        "Create Subvolume"
    }

    fn resource_url(&self) -> String {
        subvolume_url(&self.sv.info.id)
    }

    fn max_retries(&self) -> u32 {
        self.mgr.config.max_retries.create
    }

    fn manager(&self) -> &OperationManager {
        &self.mgr
    }

    fn manager_mut(&mut self) -> &mut OperationManager {
        &mut self.mgr
    }

    fn build(&mut self) -> Result<(), OperationError> {
        if self.sv.info.size == 0 {
            return Err(OperationError::InvalidRequest(
                "subvolume size must be greater than zero".to_string(),
            ));
        }
        self.mgr.op.assign_id();
        let (sv, op) = self.mgr.store.update(|tx| {
            let mut sv = self.sv.clone();
            let mut op = self.mgr.op.clone();
            let mut volume = VolumeEntry::from_id(tx, &sv.info.volume_id)?;
            if subvolume_name_in_volume(tx, &volume, &sv.info.name)? {
                return Err(OperationError::Conflict(format!(
                    "Name {} already in use in volume {}",
                    sv.info.name, sv.info.volume_id
                )));
            }

            op.record_add_subvolume(&mut sv);
            volume.subvolume_add(&sv.info.id);

            volume.save(tx)?;
            sv.save(tx)?;
            op.save(tx)?;
            Ok((sv, op))
        })?;
        self.sv = sv;
        self.mgr.op = op;
        Ok(())
    }

    async fn exec(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        let target = load_target(&self.mgr.store, &self.sv.info.id)?;
        executor
            .subvolume_create(&target.host, &target.volume_name, &target.request(target.entry.info.size))
            .await
            .map_err(OperationError::Retryable)
    }

    fn finalize(&mut self) -> Result<(), OperationError> {
        let sv = self.mgr.store.update(|tx| {
            let mut sv = SubvolumeEntry::from_id(tx, &self.sv.info.id)?;
            self.mgr.op.finalize_subvolume(&mut sv);
            sv.save(tx)?;
            self.mgr.op.delete(tx)?;
            Ok::<_, OperationError>(sv)
        })?;
        self.sv = sv;
        Ok(())
    }

    async fn clean(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        destroy_remote(&self.mgr.store, executor, &self.sv.info.id).await
    }

    fn clean_done(&mut self) -> Result<(), OperationError> {
        expunge_subvolume(&self.mgr.store, &self.sv.info.id, &self.mgr.op)
    }
}

pub struct SubvolumeDeleteOperation {
    mgr: OperationManager,
    sv: SubvolumeEntry,
}

impl SubvolumeDeleteOperation {
    pub fn new(sv: SubvolumeEntry, store: Store, config: OperationsConfig) -> Self {
        Self {
            mgr: OperationManager::new(store, config),
            sv,
        }
    }

    pub fn from_pending(mgr: OperationManager, sv: SubvolumeEntry) -> Self {
        Self { mgr, sv }
    }
}

#[async_trait]
impl Operation for SubvolumeDeleteOperation {
    fn label(&self) -> &'static str {
        "Delete Subvolume"
    }

    fn resource_url(&self) -> String {
        String::new()
    }

    fn max_retries(&self) -> u32 {
        self.mgr.config.max_retries.delete
    }

    fn manager(&self) -> &OperationManager {
        &self.mgr
    }

    fn manager_mut(&mut self) -> &mut OperationManager {
        &mut self.mgr
    }

    fn build(&mut self) -> Result<(), OperationError> {
        self.mgr.op.assign_id();
        let (sv, op) = self.mgr.store.update(|tx| {
            let mut sv = SubvolumeEntry::from_id(tx, &self.sv.info.id)?;
            ensure_idle(&sv.pending, "subvolume", sv.info.id.as_str())?;
            let mut op = self.mgr.op.clone();
            op.record_delete_subvolume(&mut sv);
            sv.save(tx)?;
            op.save(tx)?;
            Ok::<_, OperationError>((sv, op))
        })?;
        self.sv = sv;
        self.mgr.op = op;
        Ok(())
    }

    async fn exec(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        destroy_remote(&self.mgr.store, executor, &self.sv.info.id).await
    }

    fn finalize(&mut self) -> Result<(), OperationError> {
        expunge_subvolume(&self.mgr.store, &self.sv.info.id, &self.mgr.op)
    }

    async fn rollback(&mut self, _executor: &dyn Executor) -> Result<(), OperationError> {
        release_subvolume(&self.mgr.store, &self.sv.info.id, &self.mgr.op)?;
        self.sv.pending.clear();
        Ok(())
    }

    async fn clean(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        destroy_remote(&self.mgr.store, executor, &self.sv.info.id).await
    }

    fn clean_done(&mut self) -> Result<(), OperationError> {
        expunge_subvolume(&self.mgr.store, &self.sv.info.id, &self.mgr.op)
    }
}

pub struct SubvolumeExpandOperation {
    mgr: OperationManager,
    sv: SubvolumeEntry,
    delta: u64,
}

impl SubvolumeExpandOperation {
    pub fn new(sv: SubvolumeEntry, delta: u64, store: Store, config: OperationsConfig) -> Self {
        Self {
            mgr: OperationManager::new(store, config),
            sv,
            delta,
        }
    }

    pub fn from_pending(mgr: OperationManager, sv: SubvolumeEntry, delta: u64) -> Self {
        Self { mgr, sv, delta }
    }

    pub fn delta(&self) -> u64 {
        self.delta
    }
}

#[async_trait]
impl Operation for SubvolumeExpandOperation {
    fn label(&self) -> &'static str {
        "Expand Subvolume"
    }

    fn resource_url(&self) -> String {
        subvolume_url(&self.sv.info.id)
    }

    fn max_retries(&self) -> u32 {
        self.mgr.config.max_retries.expand
    }

    fn manager(&self) -> &OperationManager {
        &self.mgr
    }

    fn manager_mut(&mut self) -> &mut OperationManager {
        &mut self.mgr
    }

    fn build(&mut self) -> Result<(), OperationError> {
        if self.delta == 0 {
            return Err(OperationError::InvalidRequest(
                "expand size must be greater than zero".to_string(),
            ));
        }
        self.mgr.op.assign_id();
        let (sv, op) = self.mgr.store.update(|tx| {
            let mut sv = SubvolumeEntry::from_id(tx, &self.sv.info.id)?;
            ensure_idle(&sv.pending, "subvolume", sv.info.id.as_str())?;
            if sv.info.size.checked_add(self.delta).is_none() {
                return Err(OperationError::InvalidRequest(format!(
                    "expanding subvolume {} by {} overflows its size",
                    sv.info.id, self.delta
                )));
            }
            let mut op = self.mgr.op.clone();
            op.record_expand_subvolume(&mut sv, self.delta);
            sv.save(tx)?;
            op.save(tx)?;
            Ok((sv, op))
        })?;
        self.sv = sv;
        self.mgr.op = op;
        Ok(())
    }

    async fn exec(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        let target = load_target(&self.mgr.store, &self.sv.info.id)?;
        let req = target.request(target.entry.info.size.saturating_add(self.delta));
        executor
            .subvolume_expand(&target.host, &target.volume_name, &req)
            .await
            .map_err(OperationError::Retryable)
    }

    fn finalize(&mut self) -> Result<(), OperationError> {
        let sv = self.mgr.store.update(|tx| {
            let mut sv = SubvolumeEntry::from_id(tx, &self.sv.info.id)?;
            sv.info.size = sv.info.size.saturating_add(self.delta);
            self.mgr.op.finalize_subvolume(&mut sv);
            sv.save(tx)?;
            self.mgr.op.delete(tx)?;
            Ok::<_, OperationError>(sv)
        })?;
        self.sv = sv;
        Ok(())
    }

    async fn clean(&self, _executor: &dyn Executor) -> Result<(), OperationError> {
        Ok(())
    }

    fn clean_done(&mut self) -> Result<(), OperationError> {
        release_subvolume(&self.mgr.store, &self.sv.info.id, &self.mgr.op)?;
        self.sv.pending.clear();
        Ok(())
    }
}
