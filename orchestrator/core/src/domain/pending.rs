// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pending Operation Ledger
//!
//! A `PendingOperationEntry` exists for exactly as long as a mutating action
//! is in flight. Success deletes it; a failed compensation keeps it with
//! status `Failed` so a later cleanup sweep can finish the job. Its action
//! log names every resource the action touches and is enough to rebuild the
//! operation object after a restart.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::dirvolume::DirvolumeEntry;
use crate::domain::ids::PendingOperationId;
use crate::domain::repository::{Bucket, Entry, StoreError};
use crate::domain::subvolume::SubvolumeEntry;
use crate::infrastructure::store::{Store, Tx};

/// Kind of mutating action a record stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOperationType {
    #[default]
    Unknown,
    CreateDirvolume,
    DeleteDirvolume,
    ExpandDirvolume,
    ExportDirvolume,
    UnexportDirvolume,
    CreateSubvolume,
    DeleteSubvolume,
    ExpandSubvolume,
}

/// In-progress is implicit; completion is the record's deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingOperationStatus {
    #[default]
    New,
    Failed,
}

/// Entity-level change; the entity type is implied by the variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingChangeType {
    AddDirvolume,
    DeleteDirvolume,
    ExpandDirvolume,
    ExportDirvolume,
    UnexportDirvolume,
    AddSubvolume,
    DeleteSubvolume,
    ExpandSubvolume,
}

impl PendingChangeType {
    pub fn is_dirvolume(self) -> bool {
        matches!(
            self,
            Self::AddDirvolume
                | Self::DeleteDirvolume
                | Self::ExpandDirvolume
                | Self::ExportDirvolume
                | Self::UnexportDirvolume
        )
    }

    pub fn is_subvolume(self) -> bool {
        !self.is_dirvolume()
    }
}

/// One `{entity, id, action}` item of the action log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub change: PendingChangeType,
    pub id: String,
    /// Size increment for expand actions
    #[serde(default)]
    pub delta: u64,
    /// Address set for export/unexport actions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ip_list: Vec<String>,
}

/// Back-pointer from a resource to its in-flight pending operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingItem {
    #[serde(default)]
    pub id: Option<PendingOperationId>,
}

impl PendingItem {
    pub fn is_pending(&self) -> bool {
        self.id.is_some()
    }

    pub fn clear(&mut self) {
        self.id = None;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperationEntry {
    pub id: PendingOperationId,
    /// Creation time, unix seconds
    pub timestamp: i64,
    pub op_type: PendingOperationType,
    pub status: PendingOperationStatus,
    pub actions: Vec<PendingAction>,
}

impl Default for PendingOperationEntry {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingOperationEntry {
    /// A record carrying the placeholder id; Build swaps in a real one
    pub fn new() -> Self {
        Self {
            id: PendingOperationId::new_placeholder(),
            timestamp: Utc::now().timestamp(),
            op_type: PendingOperationType::Unknown,
            status: PendingOperationStatus::New,
            actions: Vec::new(),
        }
    }

    pub fn from_id(tx: &Tx<'_>, id: &PendingOperationId) -> Result<Self, StoreError> {
        tx.load(id.as_str())
    }

    /// Ids of every stored record
    pub fn list(store: &Store) -> Result<Vec<PendingOperationId>, StoreError> {
        Ok(store
            .list_keys(Bucket::PendingOperation)?
            .into_iter()
            .map(PendingOperationId::from)
            .collect())
    }

    /// Swap the placeholder for a generated id
    pub fn assign_id(&mut self) {
        if self.id.is_placeholder() {
            self.id = PendingOperationId::generate();
        }
    }

    pub fn save(&self, tx: &Tx<'_>) -> Result<(), StoreError> {
        if self.id.is_placeholder() {
            return Err(StoreError::InvalidId(Bucket::PendingOperation));
        }
        tx.save(self)
    }

    /// Delete the record; deleting an already removed record is not an error
    pub fn delete(&self, tx: &Tx<'_>) -> Result<(), StoreError> {
        tx.remove::<Self>(self.id.as_str())?;
        Ok(())
    }

    pub fn is_failed(&self) -> bool {
        self.status == PendingOperationStatus::Failed
    }

    fn record_change(&mut self, change: PendingChangeType, id: &str, delta: u64, ip_list: &[String]) {
        self.actions.push(PendingAction {
            change,
            id: id.to_string(),
            delta,
            ip_list: ip_list.to_vec(),
        });
    }

    pub fn record_add_dirvolume(&mut self, dv: &mut DirvolumeEntry) {
        self.record_change(PendingChangeType::AddDirvolume, dv.info.id.as_str(), 0, &[]);
        self.op_type = PendingOperationType::CreateDirvolume;
        dv.pending.id = Some(self.id.clone());
    }

    pub fn record_delete_dirvolume(&mut self, dv: &mut DirvolumeEntry) {
        self.record_change(PendingChangeType::DeleteDirvolume, dv.info.id.as_str(), 0, &[]);
        self.op_type = PendingOperationType::DeleteDirvolume;
        dv.pending.id = Some(self.id.clone());
    }

    pub fn record_expand_dirvolume(&mut self, dv: &mut DirvolumeEntry, delta: u64) {
        self.record_change(PendingChangeType::ExpandDirvolume, dv.info.id.as_str(), delta, &[]);
        self.op_type = PendingOperationType::ExpandDirvolume;
        dv.pending.id = Some(self.id.clone());
    }

    /// Stages the complete resulting address set, not the increment
    pub fn record_export_dirvolume(&mut self, dv: &mut DirvolumeEntry, ip_list: &[String]) {
        self.record_change(PendingChangeType::ExportDirvolume, dv.info.id.as_str(), 0, ip_list);
        self.op_type = PendingOperationType::ExportDirvolume;
        dv.pending.id = Some(self.id.clone());
    }

    /// Stages the complete resulting address set, not the removed addresses
    pub fn record_unexport_dirvolume(&mut self, dv: &mut DirvolumeEntry, ip_list: &[String]) {
        self.record_change(PendingChangeType::UnexportDirvolume, dv.info.id.as_str(), 0, ip_list);
        self.op_type = PendingOperationType::UnexportDirvolume;
        dv.pending.id = Some(self.id.clone());
    }

    pub fn record_add_subvolume(&mut self, sv: &mut SubvolumeEntry) {
        self.record_change(PendingChangeType::AddSubvolume, sv.info.id.as_str(), 0, &[]);
        self.op_type = PendingOperationType::CreateSubvolume;
        sv.pending.id = Some(self.id.clone());
    }

    pub fn record_delete_subvolume(&mut self, sv: &mut SubvolumeEntry) {
        self.record_change(PendingChangeType::DeleteSubvolume, sv.info.id.as_str(), 0, &[]);
        self.op_type = PendingOperationType::DeleteSubvolume;
        sv.pending.id = Some(self.id.clone());
    }

    pub fn record_expand_subvolume(&mut self, sv: &mut SubvolumeEntry, delta: u64) {
        self.record_change(PendingChangeType::ExpandSubvolume, sv.info.id.as_str(), delta, &[]);
        self.op_type = PendingOperationType::ExpandSubvolume;
        sv.pending.id = Some(self.id.clone());
    }

    pub fn finalize_dirvolume(&self, dv: &mut DirvolumeEntry) {
        dv.pending.clear();
    }

    pub fn finalize_subvolume(&self, sv: &mut SubvolumeEntry) {
        sv.pending.clear();
    }

    /// Actions touching directory volumes
    pub fn dirvolume_actions(&self) -> impl Iterator<Item = &PendingAction> {
        self.actions.iter().filter(|a| a.change.is_dirvolume())
    }

    /// Actions touching sub-volumes
    pub fn subvolume_actions(&self) -> impl Iterator<Item = &PendingAction> {
        self.actions.iter().filter(|a| a.change.is_subvolume())
    }
}

impl Entry for PendingOperationEntry {
    const BUCKET: Bucket = Bucket::PendingOperation;

    fn entry_id(&self) -> &str {
        self.id.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::dirvolume::DirvolumeCreateRequest;
    use crate::domain::ids::ClusterId;

    fn sample_dirvolume() -> DirvolumeEntry {
        DirvolumeEntry::from_request(&DirvolumeCreateRequest {
            name: None,
            size: 10,
            cluster_id: ClusterId::generate(),
        })
    }

    #[test]
    fn test_new_record_has_placeholder() {
        let mut op = PendingOperationEntry::new();
        assert!(op.id.is_placeholder());
        assert_eq!(op.status, PendingOperationStatus::New);
        op.assign_id();
        assert!(!op.id.is_placeholder());
        let id = op.id.clone();
        op.assign_id();
        assert_eq!(op.id, id);
    }

    #[test]
    fn test_record_stamps_entry() {
        let mut op = PendingOperationEntry::new();
        op.assign_id();
        let mut dv = sample_dirvolume();

        op.record_expand_dirvolume(&mut dv, 5);
        assert_eq!(op.op_type, PendingOperationType::ExpandDirvolume);
        assert_eq!(dv.pending.id.as_ref(), Some(&op.id));
        assert_eq!(op.actions.len(), 1);
        assert_eq!(op.actions[0].delta, 5);
        assert_eq!(op.dirvolume_actions().count(), 1);
        assert_eq!(op.subvolume_actions().count(), 0);

        op.finalize_dirvolume(&mut dv);
        assert!(!dv.pending.is_pending());
    }

    #[test]
    fn test_placeholder_record_is_not_saved() {
        let store = Store::temporary().unwrap();
        let op = PendingOperationEntry::new();
        let err = store.update(|tx| op.save(tx)).unwrap_err();
        assert!(matches!(err, StoreError::InvalidId(Bucket::PendingOperation)));
    }

    #[test]
    fn test_delete_twice_is_fine() {
        let store = Store::temporary().unwrap();
        let mut op = PendingOperationEntry::new();
        op.assign_id();
        store.update(|tx| op.save(tx)).unwrap();
        assert_eq!(PendingOperationEntry::list(&store).unwrap(), vec![op.id.clone()]);

        store.update(|tx| op.delete(tx)).unwrap();
        store.update(|tx| op.delete(tx)).unwrap();
        assert!(PendingOperationEntry::list(&store).unwrap().is_empty());
    }
}
