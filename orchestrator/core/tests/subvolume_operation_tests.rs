// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end tests for sub-volume operations.

use std::sync::Arc;

use dirvol_core::application::operations::{
    Operation, SubvolumeCreateOperation, SubvolumeDeleteOperation, SubvolumeExpandOperation,
};
use dirvol_core::application::queries;
use dirvol_core::application::runner::OperationRunner;
use dirvol_core::domain::config::OperationsConfig;
use dirvol_core::domain::executor::ExecutorError;
use dirvol_core::domain::ids::SubvolumeId;
use dirvol_core::domain::pending::PendingOperationEntry;
use dirvol_core::domain::subvolume::{SubvolumeCreateRequest, SubvolumeEntry};
use dirvol_core::domain::topology::{ClusterEntry, NodeEntry, VolumeEntry};
use dirvol_core::infrastructure::event_bus::EventBus;
use dirvol_core::infrastructure::executor::{ExecCall, MockExecutor};
use dirvol_core::infrastructure::store::Store;

struct Fixture {
    store: Store,
    config: OperationsConfig,
    exec: MockExecutor,
    runner: OperationRunner,
    volume: VolumeEntry,
}

impl Fixture {
    fn new() -> Self {
        let store = Store::temporary().unwrap();
        let mut cluster = ClusterEntry::new();
        let node = NodeEntry::new(cluster.id.clone(), "node-7");
        let volume = VolumeEntry::new("vol_data", cluster.id.clone());
        cluster.node_add(&node.id);
        cluster.volume_add(&volume.id);
        store
            .update(|tx| {
                node.save(tx)?;
                volume.save(tx)?;
                cluster.save(tx)
            })
            .unwrap();

        let config = OperationsConfig::default();
        let exec = MockExecutor::new();
        let runner = OperationRunner::new(Arc::new(exec.clone()), EventBus::with_default_capacity(), &config);
        Self {
            store,
            config,
            exec,
            runner,
            volume,
        }
    }

    fn new_subvolume(&self, name: &str, size: u64) -> SubvolumeEntry {
        SubvolumeEntry::from_request(&SubvolumeCreateRequest {
            name: Some(name.to_string()),
            size,
            volume_id: self.volume.id.clone(),
        })
    }

    async fn create(&self, name: &str, size: u64) -> SubvolumeId {
        let mut op = SubvolumeCreateOperation::new(self.new_subvolume(name, size), self.store.clone(), self.config.clone());
        self.runner.run(&mut op).await.unwrap();
        op.entry().info.id.clone()
    }

    fn load(&self, id: &SubvolumeId) -> SubvolumeEntry {
        self.store.view(|tx| SubvolumeEntry::from_id(tx, id)).unwrap()
    }

    fn volume(&self) -> VolumeEntry {
        self.store.view(|tx| VolumeEntry::from_id(tx, &self.volume.id)).unwrap()
    }
}

#[tokio::test]
async fn test_create_expand_delete() {
    let fx = Fixture::new();
    let id = fx.create("scratch", 3).await;
    assert_eq!(fx.volume().subvolumes, vec![id.clone()]);
    assert_eq!(fx.exec.subvolume_size("vol_data", "scratch"), Some(3));
    assert_eq!(fx.exec.hosts(), vec!["node-7".to_string()]);

    let mut expand = SubvolumeExpandOperation::new(fx.load(&id), 2, fx.store.clone(), fx.config.clone());
    let url = fx.runner.run(&mut expand).await.unwrap();
    assert_eq!(url, format!("/subvolumes/{}", id));
    assert_eq!(fx.load(&id).info.size, 5);
    assert_eq!(fx.exec.subvolume_size("vol_data", "scratch"), Some(5));

    let mut delete = SubvolumeDeleteOperation::new(fx.load(&id), fx.store.clone(), fx.config.clone());
    assert_eq!(fx.runner.run(&mut delete).await.unwrap(), "");
    assert!(SubvolumeEntry::list(&fx.store).unwrap().is_empty());
    assert!(fx.volume().subvolumes.is_empty());
    assert_eq!(fx.exec.subvolume_count(), 0);
    assert!(PendingOperationEntry::list(&fx.store).unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_create_leaves_no_trace() {
    let fx = Fixture::new();
    fx.exec
        .fail_always(ExecCall::SubvolumeCreate, ExecutorError::CommandFailed("mkdir".into()));

    let mut op = SubvolumeCreateOperation::new(fx.new_subvolume("never", 1), fx.store.clone(), fx.config.clone());
    assert!(fx.runner.run(&mut op).await.is_err());
    assert_eq!(fx.exec.call_count(ExecCall::SubvolumeCreate), 5);
    assert!(SubvolumeEntry::list(&fx.store).unwrap().is_empty());
    assert!(fx.volume().subvolumes.is_empty());
    assert!(PendingOperationEntry::list(&fx.store).unwrap().is_empty());
}

#[tokio::test]
async fn test_in_flight_subvolume_is_hidden_and_busy() {
    let fx = Fixture::new();
    let done = fx.create("done", 1).await;

    let mut create = SubvolumeCreateOperation::new(fx.new_subvolume("inflight", 1), fx.store.clone(), fx.config.clone());
    create.build().unwrap();

    assert_eq!(queries::list_subvolumes(&fx.store).unwrap().len(), 2);
    assert_eq!(queries::list_complete_subvolumes(&fx.store).unwrap(), vec![done]);
    let info = queries::subvolume_info(&fx.store, &create.entry().info.id).unwrap();
    assert!(info.pending);

    let mut delete = SubvolumeDeleteOperation::new(create.entry().clone(), fx.store.clone(), fx.config.clone());
    assert!(delete.build().unwrap_err().is_conflict());
}

#[tokio::test]
async fn test_failed_expand_keeps_size() {
    let fx = Fixture::new();
    let id = fx.create("fixed", 4).await;
    fx.exec
        .fail_always(ExecCall::SubvolumeExpand, ExecutorError::Timeout("node-7".into()));

    let mut op = SubvolumeExpandOperation::new(fx.load(&id), 4, fx.store.clone(), fx.config.clone());
    assert!(fx.runner.run(&mut op).await.is_err());
    let sv = fx.load(&id);
    assert_eq!(sv.info.size, 4);
    assert!(!sv.pending.is_pending());
}
