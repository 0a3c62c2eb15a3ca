// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Persistence Contracts
//!
//! Every persisted record lives in exactly one bucket, keyed by its own id.
//! There are no secondary indexes; listing a kind is a bucket scan.
//!
//! | Bucket | Record |
//! |--------|--------|
//! | `Cluster` | `ClusterEntry` |
//! | `Node` | `NodeEntry` |
//! | `Volume` | `VolumeEntry` |
//! | `Dirvolume` | `DirvolumeEntry` |
//! | `Subvolume` | `SubvolumeEntry` |
//! | `PendingOperation` | `PendingOperationEntry` |
//!
//! The transactional engine lives in `crate::infrastructure::store`.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Storage bucket, one per entity kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    Cluster,
    Node,
    Volume,
    Dirvolume,
    Subvolume,
    PendingOperation,
}

impl Bucket {
    pub const ALL: [Bucket; 6] = [
        Bucket::Cluster,
        Bucket::Node,
        Bucket::Volume,
        Bucket::Dirvolume,
        Bucket::Subvolume,
        Bucket::PendingOperation,
    ];

    /// Position of the bucket in `Bucket::ALL`
    pub fn index(self) -> usize {
        match self {
            Bucket::Cluster => 0,
            Bucket::Node => 1,
            Bucket::Volume => 2,
            Bucket::Dirvolume => 3,
            Bucket::Subvolume => 4,
            Bucket::PendingOperation => 5,
        }
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Bucket::Cluster => "cluster",
            Bucket::Node => "node",
            Bucket::Volume => "volume",
            Bucket::Dirvolume => "dirvolume",
            Bucket::Subvolume => "subvolume",
            Bucket::PendingOperation => "pending operation",
        };
        f.write_str(name)
    }
}

/// A record that can be stored in a bucket
pub trait Entry: Serialize + DeserializeOwned {
    const BUCKET: Bucket;

    /// Key under which the record is stored
    fn entry_id(&self) -> &str;

    fn marshal(&self) -> Result<Vec<u8>, StoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    fn unmarshal(buffer: &[u8]) -> Result<Self, StoreError> {
        Ok(serde_json::from_slice(buffer)?)
    }
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Id not found: {bucket} {id}")]
    NotFound { bucket: Bucket, id: String },

    #[error("Refusing to store {0} entry without an id")]
    InvalidId(Bucket),

    #[error("Transaction interrupted: {0}")]
    Interrupted(String),

    #[error("Database error: {0}")]
    Storage(#[from] sled::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
