// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Sub-volume: a quota-limited sub-allocation of one volume.

use serde::{Deserialize, Serialize};

use crate::domain::ids::{SubvolumeId, VolumeId};
use crate::domain::pending::PendingItem;
use crate::domain::repository::{Bucket, Entry, StoreError};
use crate::infrastructure::store::{Store, Tx};

pub const SUBVOLUME_NAME_PREFIX: &str = "svol_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubvolumeCreateRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub size: u64,
    pub volume_id: VolumeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubvolumeInfo {
    pub id: SubvolumeId,
    pub name: String,
    pub size: u64,
    pub volume_id: VolumeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubvolumeEntry {
    pub info: SubvolumeInfo,
    #[serde(default)]
    pub pending: PendingItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubvolumeInfoResponse {
    #[serde(flatten)]
    pub info: SubvolumeInfo,
    pub pending: bool,
}

impl SubvolumeEntry {
    pub fn from_request(req: &SubvolumeCreateRequest) -> Self {
        let id = SubvolumeId::generate();
        let name = match &req.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}{}", SUBVOLUME_NAME_PREFIX, id),
        };
        Self {
            info: SubvolumeInfo {
                id,
                name,
                size: req.size,
                volume_id: req.volume_id.clone(),
            },
            pending: PendingItem::default(),
        }
    }

    pub fn from_id(tx: &Tx<'_>, id: &SubvolumeId) -> Result<Self, StoreError> {
        tx.load(id.as_str())
    }

    pub fn list(store: &Store) -> Result<Vec<SubvolumeId>, StoreError> {
        Ok(store
            .list_keys(Bucket::Subvolume)?
            .into_iter()
            .map(SubvolumeId::from)
            .collect())
    }

    pub fn save(&self, tx: &Tx<'_>) -> Result<(), StoreError> {
        tx.save(self)
    }

    pub fn delete(&self, tx: &Tx<'_>) -> Result<(), StoreError> {
        tx.remove::<Self>(self.info.id.as_str())?;
        Ok(())
    }

    pub fn new_info_response(&self) -> SubvolumeInfoResponse {
        SubvolumeInfoResponse {
            info: self.info.clone(),
            pending: self.pending.is_pending(),
        }
    }
}

impl Entry for SubvolumeEntry {
    const BUCKET: Bucket = Bucket::Subvolume;

    fn entry_id(&self) -> &str {
        self.info.id.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_name_and_storage() {
        let store = Store::temporary().unwrap();
        let sv = SubvolumeEntry::from_request(&SubvolumeCreateRequest {
            name: None,
            size: 2,
            volume_id: VolumeId::from("v1"),
        });
        assert!(sv.info.name.starts_with("svol_"));

        store.update(|tx| sv.save(tx)).unwrap();
        let loaded = store.view(|tx| SubvolumeEntry::from_id(tx, &sv.info.id)).unwrap();
        assert_eq!(loaded.info.volume_id.as_str(), "v1");

        let json = serde_json::to_value(loaded.new_info_response()).unwrap();
        assert_eq!(json["size"], 2);
        assert_eq!(json["pending"], false);
    }
}
