// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Directory-volume operations: create, delete, expand, export, unexport.
//!
//! Every directory volume of a cluster shares the pool volume's export
//! directive. Build stages the new directive in the cluster record. Remote
//! calls that carry the directive always send the cluster's stored string,
//! read while holding the cluster's push lock, so the last push for a
//! cluster matches its record. Clean reverts the staged directive before
//! pushing again.

use async_trait::async_trait;
use std::marker::PhantomData;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

use super::{ensure_idle, Operation, OperationError, OperationManager};
use crate::domain::config::{OperationsConfig, RetryBudgets};
use crate::domain::dirvolume::{ip_difference, ip_union, DirvolumeEntry};
use crate::domain::executor::{DirvolumeRequest, Executor, ExecutorError};
use crate::domain::export::{append_export, delete_export, LOOPBACK_ADDRESS};
use crate::domain::ids::{ClusterId, DirvolumeId};
use crate::domain::pending::PendingOperationEntry;
use crate::domain::repository::StoreError;
use crate::domain::topology::{cluster_manage_host, ClusterEntry};
use crate::infrastructure::store::{Store, Tx};

/// Everything Exec needs, read in one snapshot
struct DirvolumeTarget {
    entry: DirvolumeEntry,
    host: String,
    export_dir_str: String,
}

impl DirvolumeTarget {
    fn load(tx: &Tx<'_>, id: &DirvolumeId) -> Result<Self, OperationError> {
        let entry = DirvolumeEntry::from_id(tx, id)?;
        let cluster = ClusterEntry::from_id(tx, &entry.info.cluster_id)?;
        let host = cluster_manage_host(tx, &cluster)?.ok_or_else(|| {
            OperationError::NoHost(format!(
                "failed to find host for dirvolume {} in cluster {}",
                entry.info.id, entry.info.cluster_id
            ))
        })?;
        Ok(Self {
            entry,
            host,
            export_dir_str: cluster.export_dir_str,
        })
    }

    fn request(&self, size: u64, export_dir_str: String) -> DirvolumeRequest {
        DirvolumeRequest {
            name: self.entry.info.name.clone(),
            size,
            export_dir_str,
        }
    }
}

fn load_target(store: &Store, id: &DirvolumeId) -> Result<DirvolumeTarget, OperationError> {
    store.view(|tx| DirvolumeTarget::load(tx, id))
}

/// Management host and current request payload for a stored dirvolume
pub(crate) fn dirvolume_request(store: &Store, id: &DirvolumeId) -> Result<(String, DirvolumeRequest), OperationError> {
    let target = load_target(store, id)?;
    let req = target.request(target.entry.info.size, target.export_dir_str.clone());
    Ok((target.host, req))
}

/// Serialize directive pushes for one cluster
async fn lock_cluster_exports(store: &Store, cluster_id: &ClusterId) -> OwnedMutexGuard<()> {
    store.lock_key(&format!("exports/{}", cluster_id)).await
}

/// Whether `token` can sit inside an export directive as is
fn is_directive_token(token: &str) -> bool {
    !token.is_empty()
        && !token.contains(|c: char| matches!(c, ',' | '|' | '(' | ')' | '/') || c.is_whitespace())
}

fn dirvolume_name_in_cluster(tx: &Tx<'_>, cluster: &ClusterEntry, name: &str) -> Result<bool, StoreError> {
    for id in &cluster.dirvolumes {
        if DirvolumeEntry::from_id(tx, id)?.info.name == name {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Unlink from the cluster, drop the export entry and delete the entry
fn teardown_dirvolume(tx: &Tx<'_>, dv: &DirvolumeEntry) -> Result<(), StoreError> {
    if let Some(mut cluster) = tx.try_load::<ClusterEntry>(dv.info.cluster_id.as_str())? {
        cluster.dirvolume_delete(&dv.info.id);
        cluster.export_dir_str = delete_export(&dv.info.name, &cluster.export_dir_str);
        cluster.save(tx)?;
    }
    dv.delete(tx)
}

/// Drop the entry's line from its cluster's directive
fn withdraw_export(store: &Store, id: &DirvolumeId) -> Result<(), OperationError> {
    store.update(|tx| {
        let Some(dv) = tx.try_load::<DirvolumeEntry>(id.as_str())? else {
            return Ok(());
        };
        if let Some(mut cluster) = tx.try_load::<ClusterEntry>(dv.info.cluster_id.as_str())? {
            cluster.export_dir_str = delete_export(&dv.info.name, &cluster.export_dir_str);
            cluster.save(tx)?;
        }
        Ok::<_, OperationError>(())
    })
}

/// Put the entry's committed address set back into its cluster's directive
fn restore_export(store: &Store, id: &DirvolumeId) -> Result<(), OperationError> {
    store.update(|tx| {
        let Some(dv) = tx.try_load::<DirvolumeEntry>(id.as_str())? else {
            return Ok(());
        };
        if let Some(mut cluster) = tx.try_load::<ClusterEntry>(dv.info.cluster_id.as_str())? {
            cluster.export_dir_str = dv.rewrite_export(&cluster.export_dir_str, &dv.info.export.ip_list);
            cluster.save(tx)?;
        }
        Ok::<_, OperationError>(())
    })
}

/// Send the cluster's stored directive; the caller holds the cluster lock
async fn push_exports(
    store: &Store,
    config: &OperationsConfig,
    executor: &dyn Executor,
    id: &DirvolumeId,
) -> Result<(), OperationError> {
    let target = match load_target(store, id) {
        Ok(target) => target,
        Err(e) if e.is_not_found() => return Ok(()),
        Err(e) => return Err(e),
    };
    let req = target.request(target.entry.info.size, target.export_dir_str.clone());
    executor
        .dirvolume_update_export(&target.host, &config.pool_volume_name, &req)
        .await
        .map_err(OperationError::Permanent)
}

/// Tear down the entry if it still exists and drop the pending record
fn expunge_dirvolume(store: &Store, id: &DirvolumeId, op: &PendingOperationEntry) -> Result<(), OperationError> {
    store.update(|tx| {
        if let Some(dv) = tx.try_load::<DirvolumeEntry>(id.as_str())? {
            teardown_dirvolume(tx, &dv)?;
        }
        op.delete(tx)?;
        Ok::<_, OperationError>(())
    })
}

/// Clear the entry's pending id if it still exists and drop the pending record
fn release_dirvolume(store: &Store, id: &DirvolumeId, op: &PendingOperationEntry) -> Result<(), OperationError> {
    store.update(|tx| {
        if let Some(mut dv) = tx.try_load::<DirvolumeEntry>(id.as_str())? {
            op.finalize_dirvolume(&mut dv);
            dv.save(tx)?;
        }
        op.delete(tx)?;
        Ok::<_, OperationError>(())
    })
}

fn destroy_error(e: ExecutorError) -> OperationError {
    match e {
        ExecutorError::LockConflict(_) => OperationError::Retryable(e),
        _ => OperationError::Permanent(e),
    }
}

/// Remove the remote directory; an entry or directory already gone is fine
///
/// The caller holds the cluster lock and has already withdrawn the entry
/// from the stored directive.
async fn destroy_remote(
    store: &Store,
    config: &OperationsConfig,
    executor: &dyn Executor,
    id: &DirvolumeId,
) -> Result<(), OperationError> {
    let target = match load_target(store, id) {
        Ok(target) => target,
        Err(e) if e.is_not_found() => {
            info!(dirvolume_id = %id, "Dirvolume already removed from store, skipping remote destroy");
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    let req = target.request(target.entry.info.size, target.export_dir_str.clone());
    match executor
        .dirvolume_destroy(&target.host, &config.pool_volume_name, &req)
        .await
    {
        Ok(()) => Ok(()),
        Err(e) if e.is_not_found() => {
            debug!(dirvolume_id = %id, "Remote dirvolume already gone");
            Ok(())
        }
        Err(e) => Err(destroy_error(e)),
    }
}

fn dirvolume_url(id: &DirvolumeId) -> String {
    format!("/dirvolumes/{}", id)
}

/// Create a directory volume in its cluster's pool volume
pub struct DirvolumeCreateOperation {
    mgr: OperationManager,
    dv: DirvolumeEntry,
}

impl DirvolumeCreateOperation {
    pub fn new(dv: DirvolumeEntry, store: Store, config: OperationsConfig) -> Self {
        Self {
            mgr: OperationManager::new(store, config),
            dv,
        }
    }

    pub fn from_pending(mgr: OperationManager, dv: DirvolumeEntry) -> Self {
        Self { mgr, dv }
    }

    pub fn entry(&self) -> &DirvolumeEntry {
        &self.dv
    }
}

#[async_trait]
impl Operation for DirvolumeCreateOperation {
    fn label(&self) -> &'static str {
        "Create Dirvolume"
    }

    fn resource_url(&self) -> String {
        dirvolume_url(&self.dv.info.id)
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
        if self.dv.info.size == 0 {
            return Err(OperationError::InvalidRequest(
                "dirvolume size must be greater than zero".to_string(),
            ));
        }
        if !is_directive_token(&self.dv.info.name) {
            return Err(OperationError::InvalidRequest(format!(
                "invalid dirvolume name '{}'",
                self.dv.info.name
            )));
        }
        self.mgr.op.assign_id();
        let (dv, op) = self.mgr.store.update(|tx| {
            let mut dv = self.dv.clone();
            let mut op = self.mgr.op.clone();
            let mut cluster = ClusterEntry::from_id(tx, &dv.info.cluster_id)?;
            if dirvolume_name_in_cluster(tx, &cluster, &dv.info.name)? {
                return Err(OperationError::Conflict(format!(
                    "Name {} already in use in cluster {}",
                    dv.info.name, dv.info.cluster_id
                )));
            }

            op.record_add_dirvolume(&mut dv);
            cluster.dirvolume_add(&dv.info.id);
            cluster.export_dir_str = append_export(&dv.info.name, &cluster.export_dir_str);

            cluster.save(tx)?;
            dv.save(tx)?;
            op.save(tx)?;
            Ok((dv, op))
        })?;
        self.dv = dv;
        self.mgr.op = op;
        Ok(())
    }

    async fn exec(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        let _push = lock_cluster_exports(&self.mgr.store, &self.dv.info.cluster_id).await;
        let target = load_target(&self.mgr.store, &self.dv.info.id)?;
        let req = target.request(target.entry.info.size, target.export_dir_str.clone());
        executor
            .dirvolume_create(&target.host, &self.mgr.config.pool_volume_name, &req)
            .await
            .map_err(OperationError::Retryable)
    }

    fn finalize(&mut self) -> Result<(), OperationError> {
        let dv = self.mgr.store.update(|tx| {
            let mut dv = DirvolumeEntry::from_id(tx, &self.dv.info.id)?;
            self.mgr.op.finalize_dirvolume(&mut dv);
            dv.save(tx)?;
            self.mgr.op.delete(tx)?;
            Ok::<_, OperationError>(dv)
        })?;
        self.dv = dv;
        Ok(())
    }

    async fn clean(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        let _push = lock_cluster_exports(&self.mgr.store, &self.dv.info.cluster_id).await;
        withdraw_export(&self.mgr.store, &self.dv.info.id)?;
        destroy_remote(&self.mgr.store, &self.mgr.config, executor, &self.dv.info.id).await
    }

    fn clean_done(&mut self) -> Result<(), OperationError> {
        expunge_dirvolume(&self.mgr.store, &self.dv.info.id, &self.mgr.op)
    }
}

/// Delete a directory volume; never retried automatically
pub struct DirvolumeDeleteOperation {
    mgr: OperationManager,
    dv: DirvolumeEntry,
}

impl DirvolumeDeleteOperation {
    pub fn new(dv: DirvolumeEntry, store: Store, config: OperationsConfig) -> Self {
        Self {
            mgr: OperationManager::new(store, config),
            dv,
        }
    }

    pub fn from_pending(mgr: OperationManager, dv: DirvolumeEntry) -> Self {
        Self { mgr, dv }
    }
}

#[async_trait]
impl Operation for DirvolumeDeleteOperation {
    fn label(&self) -> &'static str {
        "Delete Dirvolume"
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
        let (dv, op) = self.mgr.store.update(|tx| {
            let mut dv = DirvolumeEntry::from_id(tx, &self.dv.info.id)?;
            ensure_idle(&dv.pending, "dirvolume", dv.info.id.as_str())?;
            let mut op = self.mgr.op.clone();
            op.record_delete_dirvolume(&mut dv);
            if let Some(mut cluster) = tx.try_load::<ClusterEntry>(dv.info.cluster_id.as_str())? {
                cluster.export_dir_str = delete_export(&dv.info.name, &cluster.export_dir_str);
                cluster.save(tx)?;
            }
            dv.save(tx)?;
            op.save(tx)?;
            Ok::<_, OperationError>((dv, op))
        })?;
        self.dv = dv;
        self.mgr.op = op;
        Ok(())
    }

    async fn exec(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        let _push = lock_cluster_exports(&self.mgr.store, &self.dv.info.cluster_id).await;
        destroy_remote(&self.mgr.store, &self.mgr.config, executor, &self.dv.info.id).await
    }

    fn finalize(&mut self) -> Result<(), OperationError> {
        expunge_dirvolume(&self.mgr.store, &self.dv.info.id, &self.mgr.op)
    }

    /// The directory is still there: give its export line back and return
    /// the entry to idle
    async fn rollback(&mut self, executor: &dyn Executor) -> Result<(), OperationError> {
        {
            let _push = lock_cluster_exports(&self.mgr.store, &self.dv.info.cluster_id).await;
            restore_export(&self.mgr.store, &self.dv.info.id)?;
            push_exports(&self.mgr.store, &self.mgr.config, executor, &self.dv.info.id).await?;
        }
        release_dirvolume(&self.mgr.store, &self.dv.info.id, &self.mgr.op)?;
        self.dv.pending.clear();
        Ok(())
    }

    async fn clean(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        let _push = lock_cluster_exports(&self.mgr.store, &self.dv.info.cluster_id).await;
        withdraw_export(&self.mgr.store, &self.dv.info.id)?;
        destroy_remote(&self.mgr.store, &self.mgr.config, executor, &self.dv.info.id).await
    }

    fn clean_done(&mut self) -> Result<(), OperationError> {
        expunge_dirvolume(&self.mgr.store, &self.dv.info.id, &self.mgr.op)
    }
}

/// Grow a directory volume's quota by `delta` GiB
pub struct DirvolumeExpandOperation {
    mgr: OperationManager,
    dv: DirvolumeEntry,
    delta: u64,
}

impl DirvolumeExpandOperation {
    pub fn new(dv: DirvolumeEntry, delta: u64, store: Store, config: OperationsConfig) -> Self {
        Self {
            mgr: OperationManager::new(store, config),
            dv,
            delta,
        }
    }

    pub fn from_pending(mgr: OperationManager, dv: DirvolumeEntry, delta: u64) -> Self {
        Self { mgr, dv, delta }
    }

    pub fn delta(&self) -> u64 {
        self.delta
    }

    pub fn entry(&self) -> &DirvolumeEntry {
        &self.dv
    }
}

#[async_trait]
impl Operation for DirvolumeExpandOperation {
    fn label(&self) -> &'static str {
        "Expand Dirvolume"
    }

    fn resource_url(&self) -> String {
        dirvolume_url(&self.dv.info.id)
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
        let (dv, op) = self.mgr.store.update(|tx| {
            let mut dv = DirvolumeEntry::from_id(tx, &self.dv.info.id)?;
            ensure_idle(&dv.pending, "dirvolume", dv.info.id.as_str())?;
            if dv.info.size.checked_add(self.delta).is_none() {
                return Err(OperationError::InvalidRequest(format!(
                    "expanding dirvolume {} by {} overflows its size",
                    dv.info.id, self.delta
                )));
            }
            let mut op = self.mgr.op.clone();
            op.record_expand_dirvolume(&mut dv, self.delta);
            dv.save(tx)?;
            op.save(tx)?;
            Ok((dv, op))
        })?;
        self.dv = dv;
        self.mgr.op = op;
        Ok(())
    }

    async fn exec(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        let target = load_target(&self.mgr.store, &self.dv.info.id)?;
        let size = target.entry.info.size.saturating_add(self.delta);
        let req = target.request(size, target.export_dir_str.clone());
        executor
            .dirvolume_expand(&target.host, &self.mgr.config.pool_volume_name, &req)
            .await
            .map_err(OperationError::Retryable)
    }

    fn finalize(&mut self) -> Result<(), OperationError> {
        let dv = self.mgr.store.update(|tx| {
            let mut dv = DirvolumeEntry::from_id(tx, &self.dv.info.id)?;
            dv.info.size = dv.info.size.saturating_add(self.delta);
            self.mgr.op.finalize_dirvolume(&mut dv);
            dv.save(tx)?;
            self.mgr.op.delete(tx)?;
            Ok::<_, OperationError>(dv)
        })?;
        self.dv = dv;
        Ok(())
    }

    /// A quota resize is absolute, there is nothing to tear down
    async fn clean(&self, _executor: &dyn Executor) -> Result<(), OperationError> {
        debug!(dirvolume_id = %self.dv.info.id, "Nothing to clean for expand");
        Ok(())
    }

    fn clean_done(&mut self) -> Result<(), OperationError> {
        release_dirvolume(&self.mgr.store, &self.dv.info.id, &self.mgr.op)?;
        self.dv.pending.clear();
        Ok(())
    }
}

/// Direction of an export update
pub trait ExportChange: Send + Sync + 'static {
    const LABEL: &'static str;

    /// Resulting address set given the current one and the request
    fn stage(current: &[String], requested: &[String]) -> Vec<String>;

    fn record(op: &mut PendingOperationEntry, dv: &mut DirvolumeEntry, staged: &[String]);

    fn max_retries(budgets: &RetryBudgets) -> u32;
}

/// Grant addresses
pub struct Export;

/// Revoke addresses; addresses not currently granted are ignored
pub struct Unexport;

impl ExportChange for Export {
    const LABEL: &'static str = "Export Dirvolume";

    fn stage(current: &[String], requested: &[String]) -> Vec<String> {
        ip_union(current, requested)
    }

    fn record(op: &mut PendingOperationEntry, dv: &mut DirvolumeEntry, staged: &[String]) {
        op.record_export_dirvolume(dv, staged);
    }

    fn max_retries(budgets: &RetryBudgets) -> u32 {
        budgets.export
    }
}

impl ExportChange for Unexport {
    const LABEL: &'static str = "Unexport Dirvolume";

    fn stage(current: &[String], requested: &[String]) -> Vec<String> {
        ip_difference(current, requested)
    }

    fn record(op: &mut PendingOperationEntry, dv: &mut DirvolumeEntry, staged: &[String]) {
        op.record_unexport_dirvolume(dv, staged);
    }

    fn max_retries(budgets: &RetryBudgets) -> u32 {
        budgets.unexport
    }
}

/// Rewrite the address set a directory volume is exported to
pub struct DirvolumeExportUpdate<C: ExportChange> {
    mgr: OperationManager,
    dv: DirvolumeEntry,
    requested: Vec<String>,
    staged: Vec<String>,
    _change: PhantomData<C>,
}

pub type DirvolumeExportOperation = DirvolumeExportUpdate<Export>;
pub type DirvolumeUnexportOperation = DirvolumeExportUpdate<Unexport>;

impl<C: ExportChange> DirvolumeExportUpdate<C> {
    pub fn new(dv: DirvolumeEntry, ip_list: Vec<String>, store: Store, config: OperationsConfig) -> Self {
        Self {
            mgr: OperationManager::new(store, config),
            dv,
            requested: ip_list,
            staged: Vec::new(),
            _change: PhantomData,
        }
    }

    /// `staged` is the resulting address set stored in the action log
    pub fn from_pending(mgr: OperationManager, dv: DirvolumeEntry, staged: Vec<String>) -> Self {
        Self {
            mgr,
            dv,
            requested: staged.clone(),
            staged,
            _change: PhantomData,
        }
    }

    pub fn staged(&self) -> &[String] {
        &self.staged
    }

    fn validate_request(&self) -> Result<(), OperationError> {
        if self.requested.is_empty() {
            return Err(OperationError::InvalidRequest("ip list must not be empty".to_string()));
        }
        for ip in &self.requested {
            if ip == LOOPBACK_ADDRESS {
                return Err(OperationError::InvalidRequest(format!(
                    "{} is always granted and cannot be changed",
                    LOOPBACK_ADDRESS
                )));
            }
            if !is_directive_token(ip) {
                return Err(OperationError::InvalidRequest(format!("invalid address '{}'", ip)));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<C: ExportChange> Operation for DirvolumeExportUpdate<C> {
    fn label(&self) -> &'static str {
        C::LABEL
    }

    fn resource_url(&self) -> String {
        dirvolume_url(&self.dv.info.id)
    }

    fn max_retries(&self) -> u32 {
        C::max_retries(&self.mgr.config.max_retries)
    }

    fn manager(&self) -> &OperationManager {
        &self.mgr
    }

    fn manager_mut(&mut self) -> &mut OperationManager {
        &mut self.mgr
    }

    fn build(&mut self) -> Result<(), OperationError> {
        self.validate_request()?;
        self.mgr.op.assign_id();
        let (dv, op, staged) = self.mgr.store.update(|tx| {
            let mut dv = DirvolumeEntry::from_id(tx, &self.dv.info.id)?;
            ensure_idle(&dv.pending, "dirvolume", dv.info.id.as_str())?;
            let mut cluster = ClusterEntry::from_id(tx, &dv.info.cluster_id)?;
            let staged = C::stage(&dv.info.export.ip_list, &self.requested);
            let mut op = self.mgr.op.clone();
            C::record(&mut op, &mut dv, &staged);
            cluster.export_dir_str = dv.rewrite_export(&cluster.export_dir_str, &staged);
            cluster.save(tx)?;
            dv.save(tx)?;
            op.save(tx)?;
            Ok::<_, OperationError>((dv, op, staged))
        })?;
        self.dv = dv;
        self.mgr.op = op;
        self.staged = staged;
        Ok(())
    }

    async fn exec(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        let _push = lock_cluster_exports(&self.mgr.store, &self.dv.info.cluster_id).await;
        let target = load_target(&self.mgr.store, &self.dv.info.id)?;
        let req = target.request(target.entry.info.size, target.export_dir_str.clone());
        executor
            .dirvolume_update_export(&target.host, &self.mgr.config.pool_volume_name, &req)
            .await
            .map_err(OperationError::Retryable)
    }

    fn finalize(&mut self) -> Result<(), OperationError> {
        let dv = self.mgr.store.update(|tx| {
            let mut dv = DirvolumeEntry::from_id(tx, &self.dv.info.id)?;
            dv.info.export.ip_list = self.staged.clone();
            self.mgr.op.finalize_dirvolume(&mut dv);
            dv.save(tx)?;
            self.mgr.op.delete(tx)?;
            Ok::<_, OperationError>(dv)
        })?;
        self.dv = dv;
        Ok(())
    }

    /// Unstage the new address set and push the reverted directive
    async fn clean(&self, executor: &dyn Executor) -> Result<(), OperationError> {
        let _push = lock_cluster_exports(&self.mgr.store, &self.dv.info.cluster_id).await;
        restore_export(&self.mgr.store, &self.dv.info.id)?;
        push_exports(&self.mgr.store, &self.mgr.config, executor, &self.dv.info.id).await
    }

    fn clean_done(&mut self) -> Result<(), OperationError> {
        release_dirvolume(&self.mgr.store, &self.dv.info.id, &self.mgr.op)?;
        self.dv.pending.clear();
        Ok(())
    }
}
