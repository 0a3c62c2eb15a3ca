// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Topology records
//!
//! Only the slice of cluster/node/volume management the operation core needs:
//! resolving a parent, keeping the parent's child-id set, and picking the
//! management host commands are sent to.

use serde::{Deserialize, Serialize};

use crate::domain::ids::{ClusterId, DirvolumeId, NodeId, SubvolumeId, VolumeId};
use crate::domain::repository::{Bucket, Entry, StoreError};
use crate::infrastructure::store::Tx;

/// Cluster: owner of the pool volume directory volumes are carved from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterEntry {
    pub id: ClusterId,
    pub nodes: Vec<NodeId>,
    pub volumes: Vec<VolumeId>,
    pub dirvolumes: Vec<DirvolumeId>,
    /// Export directive of the pool volume, see `domain::export`
    pub export_dir_str: String,
}

impl ClusterEntry {
    pub fn new() -> Self {
        Self {
            id: ClusterId::generate(),
            ..Self::default()
        }
    }

    pub fn from_id(tx: &Tx<'_>, id: &ClusterId) -> Result<Self, StoreError> {
        tx.load(id.as_str())
    }

    pub fn save(&self, tx: &Tx<'_>) -> Result<(), StoreError> {
        tx.save(self)
    }

    pub fn dirvolume_add(&mut self, id: &DirvolumeId) {
        if !self.dirvolumes.contains(id) {
            self.dirvolumes.push(id.clone());
        }
    }

    pub fn dirvolume_delete(&mut self, id: &DirvolumeId) {
        self.dirvolumes.retain(|d| d != id);
    }

    pub fn node_add(&mut self, id: &NodeId) {
        if !self.nodes.contains(id) {
            self.nodes.push(id.clone());
        }
    }

    pub fn volume_add(&mut self, id: &VolumeId) {
        if !self.volumes.contains(id) {
            self.volumes.push(id.clone());
        }
    }
}

impl Entry for ClusterEntry {
    const BUCKET: Bucket = Bucket::Cluster;

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Storage node reachable over the command channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub id: NodeId,
    pub cluster_id: ClusterId,
    pub manage_hostname: String,
}

impl NodeEntry {
    pub fn new(cluster_id: ClusterId, manage_hostname: impl Into<String>) -> Self {
        Self {
            id: NodeId::generate(),
            cluster_id,
            manage_hostname: manage_hostname.into(),
        }
    }

    pub fn from_id(tx: &Tx<'_>, id: &NodeId) -> Result<Self, StoreError> {
        tx.load(id.as_str())
    }

    pub fn save(&self, tx: &Tx<'_>) -> Result<(), StoreError> {
        tx.save(self)
    }
}

impl Entry for NodeEntry {
    const BUCKET: Bucket = Bucket::Node;

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Volume: parent of sub-volumes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeEntry {
    pub id: VolumeId,
    pub name: String,
    pub cluster_id: ClusterId,
    pub subvolumes: Vec<SubvolumeId>,
}

impl VolumeEntry {
    pub fn new(name: impl Into<String>, cluster_id: ClusterId) -> Self {
        Self {
            id: VolumeId::generate(),
            name: name.into(),
            cluster_id,
            subvolumes: Vec::new(),
        }
    }

    pub fn from_id(tx: &Tx<'_>, id: &VolumeId) -> Result<Self, StoreError> {
        tx.load(id.as_str())
    }

    pub fn save(&self, tx: &Tx<'_>) -> Result<(), StoreError> {
        tx.save(self)
    }

    pub fn subvolume_add(&mut self, id: &SubvolumeId) {
        if !self.subvolumes.contains(id) {
            self.subvolumes.push(id.clone());
        }
    }

    pub fn subvolume_delete(&mut self, id: &SubvolumeId) {
        self.subvolumes.retain(|s| s != id);
    }
}

impl Entry for VolumeEntry {
    const BUCKET: Bucket = Bucket::Volume;

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }
}

/// Management host of the cluster's first node
///
/// `None` when the cluster has no nodes or the node has no host name.
// TODO: skip nodes that are offline once node state is tracked
pub fn cluster_manage_host(tx: &Tx<'_>, cluster: &ClusterEntry) -> Result<Option<String>, StoreError> {
    let Some(node_id) = cluster.nodes.first() else {
        return Ok(None);
    };
    let node = NodeEntry::from_id(tx, node_id)?;
    if node.manage_hostname.is_empty() {
        Ok(None)
    } else {
        Ok(Some(node.manage_hostname))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::Store;

    #[test]
    fn test_cluster_child_sets_are_sets() {
        let mut cluster = ClusterEntry::new();
        let id = DirvolumeId::generate();
        cluster.dirvolume_add(&id);
        cluster.dirvolume_add(&id);
        assert_eq!(cluster.dirvolumes.len(), 1);
        cluster.dirvolume_delete(&id);
        assert!(cluster.dirvolumes.is_empty());
    }

    #[test]
    fn test_cluster_manage_host() {
        let store = Store::temporary().unwrap();
        let mut cluster = ClusterEntry::new();
        let node = NodeEntry::new(cluster.id.clone(), "storage-1.example.com");
        cluster.node_add(&node.id);

        let empty = ClusterEntry::new();

        store
            .update(|tx| {
                node.save(tx)?;
                cluster.save(tx)?;
                empty.save(tx)
            })
            .unwrap();

        let host = store.view(|tx| cluster_manage_host(tx, &cluster)).unwrap();
        assert_eq!(host.as_deref(), Some("storage-1.example.com"));

        let none = store.view(|tx| cluster_manage_host(tx, &empty)).unwrap();
        assert!(none.is_none());
    }
}
