// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::domain::executor::{
    DirvolumeRequest, DirvolumeUsage, Executor, ExecutorError, SubvolumeRequest,
};

/// Executor entry points, used to target fault injection and call counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecCall {
    DirvolumeCreate,
    DirvolumeDestroy,
    DirvolumeExpand,
    DirvolumeUpdateExport,
    DirvolumeStats,
    SubvolumeCreate,
    SubvolumeDestroy,
    SubvolumeExpand,
}

#[derive(Default)]
struct RemoteState {
    /// (volume, name) -> quota
    dirvolumes: HashMap<(String, String), u64>,
    subvolumes: HashMap<(String, String), u64>,
    /// volume -> export directive
    exports: HashMap<String, String>,
    /// (volume, name) -> used GiB reported by stats
    usage: HashMap<(String, String), u64>,
    calls: HashMap<ExecCall, usize>,
    hosts: Vec<String>,
    queued_faults: HashMap<ExecCall, VecDeque<ExecutorError>>,
    sticky_faults: HashMap<ExecCall, ExecutorError>,
}

/// In-memory executor simulating the storage nodes
#[derive(Clone, Default)]
pub struct MockExecutor {
    state: Arc<Mutex<RemoteState>>,
    delay: Option<Duration>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `times` calls of `call` with `error`
    pub fn fail_next(&self, call: ExecCall, error: ExecutorError, times: usize) {
        let mut state = self.state.lock();
        let queue = state.queued_faults.entry(call).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Fail every call of `call` until `clear_faults`
    pub fn fail_always(&self, call: ExecCall, error: ExecutorError) {
        self.state.lock().sticky_faults.insert(call, error);
    }

    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.queued_faults.clear();
        state.sticky_faults.clear();
    }

    /// Number of times `call` was invoked, failed attempts included
    pub fn call_count(&self, call: ExecCall) -> usize {
        self.state.lock().calls.get(&call).copied().unwrap_or(0)
    }

    /// Hosts commands were sent to, in order
    pub fn hosts(&self) -> Vec<String> {
        self.state.lock().hosts.clone()
    }

    pub fn dirvolume_size(&self, volume: &str, name: &str) -> Option<u64> {
        self.state
            .lock()
            .dirvolumes
            .get(&(volume.to_string(), name.to_string()))
            .copied()
    }

    pub fn dirvolume_count(&self) -> usize {
        self.state.lock().dirvolumes.len()
    }

    pub fn subvolume_size(&self, volume: &str, name: &str) -> Option<u64> {
        self.state
            .lock()
            .subvolumes
            .get(&(volume.to_string(), name.to_string()))
            .copied()
    }

    pub fn subvolume_count(&self) -> usize {
        self.state.lock().subvolumes.len()
    }

    /// Last export directive pushed for `volume`
    pub fn export_directive(&self, volume: &str) -> Option<String> {
        self.state.lock().exports.get(volume).cloned()
    }

    /// Used space reported by `dirvolume_stats`
    pub fn set_usage(&self, volume: &str, name: &str, used: u64) {
        self.state
            .lock()
            .usage
            .insert((volume.to_string(), name.to_string()), used);
    }

    async fn begin(&self, call: ExecCall, host: &str) -> Result<(), ExecutorError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        *state.calls.entry(call).or_insert(0) += 1;
        state.hosts.push(host.to_string());
        if let Some(error) = state.queued_faults.get_mut(&call).and_then(|q| q.pop_front()) {
            debug!("Injected fault for {:?}: {}", call, error);
            return Err(error);
        }
        if let Some(error) = state.sticky_faults.get(&call) {
            debug!("Injected fault for {:?}: {}", call, error);
            return Err(error.clone());
        }
        Ok(())
    }
}

fn key(volume: &str, name: &str) -> (String, String) {
    (volume.to_string(), name.to_string())
}

#[async_trait]
impl Executor for MockExecutor {
    async fn dirvolume_create(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<(), ExecutorError> {
        self.begin(ExecCall::DirvolumeCreate, host).await?;
        let mut state = self.state.lock();
        state.dirvolumes.insert(key(volume, &req.name), req.size);
        state
            .exports
            .insert(volume.to_string(), req.export_dir_str.clone());
        Ok(())
    }

    async fn dirvolume_destroy(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<(), ExecutorError> {
        self.begin(ExecCall::DirvolumeDestroy, host).await?;
        let mut state = self.state.lock();
        state
            .exports
            .insert(volume.to_string(), req.export_dir_str.clone());
        state.usage.remove(&key(volume, &req.name));
        match state.dirvolumes.remove(&key(volume, &req.name)) {
            Some(_) => Ok(()),
            None => Err(ExecutorError::NotFound(req.name.clone())),
        }
    }

    async fn dirvolume_expand(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<(), ExecutorError> {
        self.begin(ExecCall::DirvolumeExpand, host).await?;
        let mut state = self.state.lock();
        match state.dirvolumes.get_mut(&key(volume, &req.name)) {
            Some(size) => {
                *size = req.size;
                Ok(())
            }
            None => Err(ExecutorError::NotFound(req.name.clone())),
        }
    }

    async fn dirvolume_update_export(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<(), ExecutorError> {
        self.begin(ExecCall::DirvolumeUpdateExport, host).await?;
        self.state
            .lock()
            .exports
            .insert(volume.to_string(), req.export_dir_str.clone());
        Ok(())
    }

    async fn dirvolume_stats(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<DirvolumeUsage, ExecutorError> {
        self.begin(ExecCall::DirvolumeStats, host).await?;
        let state = self.state.lock();
        let total = state
            .dirvolumes
            .get(&key(volume, &req.name))
            .copied()
            .ok_or_else(|| ExecutorError::NotFound(req.name.clone()))?;
        let used = state
            .usage
            .get(&key(volume, &req.name))
            .copied()
            .unwrap_or(0)
            .min(total);
        Ok(DirvolumeUsage {
            total_size: total,
            used_size: used,
            avail_size: total - used,
        })
    }

    async fn subvolume_create(
        &self,
        host: &str,
        volume: &str,
        req: &SubvolumeRequest,
    ) -> Result<(), ExecutorError> {
        self.begin(ExecCall::SubvolumeCreate, host).await?;
        self.state
            .lock()
            .subvolumes
            .insert(key(volume, &req.name), req.size);
        Ok(())
    }

    async fn subvolume_destroy(
        &self,
        host: &str,
        volume: &str,
        req: &SubvolumeRequest,
    ) -> Result<(), ExecutorError> {
        self.begin(ExecCall::SubvolumeDestroy, host).await?;
        match self.state.lock().subvolumes.remove(&key(volume, &req.name)) {
            Some(_) => Ok(()),
            None => Err(ExecutorError::NotFound(req.name.clone())),
        }
    }

    async fn subvolume_expand(
        &self,
        host: &str,
        volume: &str,
        req: &SubvolumeRequest,
    ) -> Result<(), ExecutorError> {
        self.begin(ExecCall::SubvolumeExpand, host).await?;
        let mut state = self.state.lock();
        match state.subvolumes.get_mut(&key(volume, &req.name)) {
            Some(size) => {
                *size = req.size;
                Ok(())
            }
            None => Err(ExecutorError::NotFound(req.name.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dvr(name: &str, size: u64) -> DirvolumeRequest {
        DirvolumeRequest {
            name: name.to_string(),
            size,
            export_dir_str: format!("/{}(127.0.0.1)", name),
        }
    }

    #[tokio::test]
    async fn test_dirvolume_lifecycle() {
        let exec = MockExecutor::new();
        exec.dirvolume_create("h1", "pool", &dvr("a", 5)).await.unwrap();
        assert_eq!(exec.dirvolume_size("pool", "a"), Some(5));
        assert_eq!(exec.export_directive("pool").as_deref(), Some("/a(127.0.0.1)"));

        exec.dirvolume_expand("h1", "pool", &dvr("a", 8)).await.unwrap();
        exec.set_usage("pool", "a", 3);
        let usage = exec.dirvolume_stats("h1", "pool", &dvr("a", 8)).await.unwrap();
        assert_eq!(usage.total_size, 8);
        assert_eq!(usage.avail_size, 5);

        let mut gone = dvr("a", 8);
        gone.export_dir_str.clear();
        exec.dirvolume_destroy("h1", "pool", &gone).await.unwrap();
        assert_eq!(exec.export_directive("pool").as_deref(), Some(""));
        let err = exec.dirvolume_destroy("h1", "pool", &dvr("a", 8)).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(exec.call_count(ExecCall::DirvolumeDestroy), 2);
        assert!(exec.hosts().iter().all(|h| h == "h1"));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let exec = MockExecutor::new();
        exec.fail_next(
            ExecCall::SubvolumeCreate,
            ExecutorError::Timeout("h1".into()),
            2,
        );
        let req = SubvolumeRequest { name: "s".into(), size: 1 };
        assert!(exec.subvolume_create("h1", "v", &req).await.is_err());
        assert!(exec.subvolume_create("h1", "v", &req).await.is_err());
        exec.subvolume_create("h1", "v", &req).await.unwrap();
        assert_eq!(exec.subvolume_count(), 1);

        exec.fail_always(ExecCall::SubvolumeDestroy, ExecutorError::CommandFailed("rm".into()));
        assert!(exec.subvolume_destroy("h1", "v", &req).await.is_err());
        assert!(exec.subvolume_destroy("h1", "v", &req).await.is_err());
        exec.clear_faults();
        exec.subvolume_destroy("h1", "v", &req).await.unwrap();
        assert_eq!(exec.subvolume_size("v", "s"), None);
    }
}
