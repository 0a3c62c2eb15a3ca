// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Entry Store
//!
//! sled-backed persistence with one tree per bucket. Write transactions span
//! every bucket and are atomic and serializable; read views are consistent
//! snapshots. sled transactions are optimistic: on a conflict the closure is
//! run again from scratch, so closures passed to [`Store::update`] must only
//! communicate through their return value.
//!
//! # Usage
//!
//! ```no_run
//! use dirvol_core::infrastructure::store::Store;
//! use dirvol_core::domain::dirvolume::DirvolumeEntry;
//! use dirvol_core::domain::repository::StoreError;
//!
//! let store = Store::temporary()?;
//! let ids = store.list_keys(dirvol_core::domain::repository::Bucket::Dirvolume)?;
//! for id in ids {
//!     let dv: DirvolumeEntry = store.view(|tx| tx.load(&id))?;
//!     println!("{} {}", dv.info.id, dv.info.name);
//! }
//! # Ok::<(), StoreError>(())
//! ```

use sled::transaction::{
    ConflictableTransactionError, TransactionError, TransactionalTree,
    UnabortableTransactionError,
};
use parking_lot::Mutex;
use sled::Transactional;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::domain::config::BucketNames;
use crate::domain::repository::{Bucket, Entry, StoreError};

/// Handle to the embedded database
#[derive(Clone)]
pub struct Store {
    db: sled::Db,
    trees: Arc<Vec<sled::Tree>>,
    key_locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl Store {
    /// Open (or create) a store at `path` with the default bucket names
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with(path, &BucketNames::default())
    }

    pub fn open_with(path: impl AsRef<Path>, buckets: &BucketNames) -> Result<Self, StoreError> {
        let db = sled::Config::new().path(path.as_ref()).open()?;
        Self::from_db(db, buckets)
    }

    /// In-memory store removed when the last handle is dropped
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db, &BucketNames::default())
    }

    fn from_db(db: sled::Db, buckets: &BucketNames) -> Result<Self, StoreError> {
        let trees = Bucket::ALL
            .iter()
            .map(|bucket| db.open_tree(buckets.name(*bucket)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            db,
            trees: Arc::new(trees),
            key_locks: Arc::default(),
        })
    }

    /// In-process lock on `key`, shared by every clone of this handle
    ///
    /// Transactions cannot span a remote call. Holding this lock while
    /// reading a record and pushing it out keeps pushes for the same key in
    /// store order.
    pub async fn lock_key(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .key_locks
            .lock()
            .entry(key.to_string())
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// Run `f` inside a write transaction
    ///
    /// Any error returned by `f` aborts the transaction and nothing it wrote
    /// is kept.
    pub fn update<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: Fn(&Tx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        let result = self.trees.as_slice().transaction(|trees| {
            let tx = Tx::new(trees);
            let outcome = f(&tx);
            // conflicts must reach sled so the closure is retried
            if let Some(interrupted) = tx.interrupted.take() {
                return Err(ConflictableTransactionError::from(interrupted));
            }
            outcome.map_err(ConflictableTransactionError::Abort)
        });

        match result {
            Ok(value) => Ok(value),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(StoreError::Storage(e).into()),
        }
    }

    /// Run `f` against a consistent snapshot
    pub fn view<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: Fn(&Tx<'_>) -> Result<T, E>,
        E: From<StoreError>,
    {
        self.update(f)
    }

    /// All keys of a bucket
    pub fn list_keys(&self, bucket: Bucket) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for key in self.tree(bucket).iter().keys() {
            let key = key?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }

    /// Load and decode every record of a bucket
    pub fn list_entries<E: Entry>(&self) -> Result<Vec<E>, StoreError> {
        let mut entries = Vec::new();
        for value in self.tree(E::BUCKET).iter().values() {
            entries.push(E::unmarshal(&value?)?);
        }
        Ok(entries)
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        let bytes = self.db.flush()?;
        debug!("Flushed {} bytes to disk", bytes);
        Ok(())
    }

    fn tree(&self, bucket: Bucket) -> &sled::Tree {
        &self.trees[bucket.index()]
    }
}

/// Transaction handle passed to [`Store::update`] and [`Store::view`] closures
pub struct Tx<'a> {
    trees: &'a [TransactionalTree],
    interrupted: Cell<Option<UnabortableTransactionError>>,
}

impl<'a> Tx<'a> {
    fn new(trees: &'a [TransactionalTree]) -> Self {
        Self {
            trees,
            interrupted: Cell::new(None),
        }
    }

    fn interrupt(&self, e: UnabortableTransactionError) -> StoreError {
        let message = format!("{:?}", e);
        self.interrupted.set(Some(e));
        StoreError::Interrupted(message)
    }

    pub fn get(&self, bucket: Bucket, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.trees[bucket.index()].get(key.as_bytes()) {
            Ok(value) => Ok(value.map(|v| v.to_vec())),
            Err(e) => Err(self.interrupt(e)),
        }
    }

    pub fn put(&self, bucket: Bucket, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        match self.trees[bucket.index()].insert(key.as_bytes(), value) {
            Ok(_) => Ok(()),
            Err(e) => Err(self.interrupt(e)),
        }
    }

    /// Remove a key; returns whether it existed
    pub fn delete(&self, bucket: Bucket, key: &str) -> Result<bool, StoreError> {
        match self.trees[bucket.index()].remove(key.as_bytes()) {
            Ok(old) => Ok(old.is_some()),
            Err(e) => Err(self.interrupt(e)),
        }
    }

    /// Load a record, failing with `NotFound` when absent
    pub fn load<E: Entry>(&self, id: &str) -> Result<E, StoreError> {
        self.try_load(id)?.ok_or_else(|| StoreError::NotFound {
            bucket: E::BUCKET,
            id: id.to_string(),
        })
    }

    pub fn try_load<E: Entry>(&self, id: &str) -> Result<Option<E>, StoreError> {
        match self.get(E::BUCKET, id)? {
            Some(bytes) => Ok(Some(E::unmarshal(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Upsert a record under its own id
    pub fn save<E: Entry>(&self, entry: &E) -> Result<(), StoreError> {
        let id = entry.entry_id();
        if id.is_empty() {
            return Err(StoreError::InvalidId(E::BUCKET));
        }
        self.put(E::BUCKET, id, entry.marshal()?)
    }

    pub fn remove<E: Entry>(&self, id: &str) -> Result<bool, StoreError> {
        self.delete(E::BUCKET, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Sample {
        id: String,
        value: u64,
    }

    impl Entry for Sample {
        const BUCKET: Bucket = Bucket::Volume;

        fn entry_id(&self) -> &str {
            &self.id
        }
    }

    #[tokio::test]
    async fn test_lock_key_is_shared_between_clones() {
        let store = Store::temporary().unwrap();
        let other = store.clone();

        let guard = store.lock_key("cluster-1").await;
        assert!(tokio::time::timeout(std::time::Duration::from_millis(20), other.lock_key("cluster-1"))
            .await
            .is_err());
        // other keys are independent
        drop(other.lock_key("cluster-2").await);
        drop(guard);
        drop(other.lock_key("cluster-1").await);
    }

    #[test]
    fn test_save_load_delete() {
        let store = Store::temporary().unwrap();
        let sample = Sample { id: "a".into(), value: 7 };

        store.update(|tx| tx.save(&sample)).unwrap();
        let loaded: Sample = store.view(|tx| tx.load("a")).unwrap();
        assert_eq!(loaded, sample);
        assert_eq!(store.list_keys(Bucket::Volume).unwrap(), vec!["a".to_string()]);
        assert!(store.list_keys(Bucket::Dirvolume).unwrap().is_empty());

        let existed = store.update(|tx| tx.remove::<Sample>("a")).unwrap();
        assert!(existed);
        let err = store.view(|tx| tx.load::<Sample>("a")).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_failed_closure_leaves_no_writes() {
        let store = Store::temporary().unwrap();
        let result: Result<(), StoreError> = store.update(|tx| {
            tx.save(&Sample { id: "a".into(), value: 1 })?;
            tx.save(&Sample { id: "b".into(), value: 2 })?;
            Err(StoreError::InvalidId(Bucket::Volume))
        });
        assert!(result.is_err());
        assert!(store.list_keys(Bucket::Volume).unwrap().is_empty());
    }

    #[test]
    fn test_save_requires_id() {
        let store = Store::temporary().unwrap();
        let err = store
            .update(|tx| tx.save(&Sample { id: String::new(), value: 1 }))
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(Bucket::Volume)));
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_writes() {
        let store = Store::temporary().unwrap();
        store.update(|tx| tx.save(&Sample { id: "counter".into(), value: 0 })).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        store
                            .update(|tx| {
                                let mut s: Sample = tx.load("counter")?;
                                s.value += 1;
                                tx.save(&s)
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let counter: Sample = store.view(|tx| tx.load("counter")).unwrap();
        assert_eq!(counter.value, 80);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("db");
        {
            let store = Store::open(&path).unwrap();
            store.update(|tx| tx.save(&Sample { id: "x".into(), value: 3 })).unwrap();
            store.flush().unwrap();
        }
        let store = Store::open(&path).unwrap();
        let all: Vec<Sample> = store.list_entries().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value, 3);
    }

    #[test]
    fn test_custom_bucket_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut names = BucketNames::default();
        names.volume = "VOLS".to_string();
        let store = Store::open_with(dir.path().join("db"), &names).unwrap();
        store.update(|tx| tx.save(&Sample { id: "v".into(), value: 1 })).unwrap();
        assert!(store.db.tree_names().iter().any(|n| &n[..] == b"VOLS"));
    }
}
