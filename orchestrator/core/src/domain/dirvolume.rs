// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Directory Volume
//!
//! A quota-limited directory carved out of the cluster's pool volume and
//! exported to a list of client addresses. The entry is only ever saved,
//! loaded or deleted inside a store transaction supplied by the caller.

use serde::{Deserialize, Serialize};

use crate::domain::export::set_export_ip_list;
use crate::domain::ids::{ClusterId, DirvolumeId};
use crate::domain::pending::PendingItem;
use crate::domain::repository::{Bucket, Entry, StoreError};
use crate::infrastructure::store::{Store, Tx};

/// Prefix of generated directory-volume names
pub const DIRVOLUME_NAME_PREFIX: &str = "dvol_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirvolumeCreateRequest {
    /// Generated as `dvol_<id>` when absent
    #[serde(default)]
    pub name: Option<String>,
    /// Quota in GiB
    pub size: u64,
    pub cluster_id: ClusterId,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportInfo {
    /// Ordered set of client addresses
    #[serde(default)]
    pub ip_list: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirvolumeInfo {
    pub id: DirvolumeId,
    pub name: String,
    pub size: u64,
    pub cluster_id: ClusterId,
    #[serde(default)]
    pub export: ExportInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirvolumeEntry {
    pub info: DirvolumeInfo,
    #[serde(default)]
    pub pending: PendingItem,
}

/// Read model handed back to callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirvolumeInfoResponse {
    #[serde(flatten)]
    pub info: DirvolumeInfo,
    pub pending: bool,
}

impl DirvolumeEntry {
    pub fn from_request(req: &DirvolumeCreateRequest) -> Self {
        let id = DirvolumeId::generate();
        let name = match &req.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}{}", DIRVOLUME_NAME_PREFIX, id),
        };
        Self {
            info: DirvolumeInfo {
                id,
                name,
                size: req.size,
                cluster_id: req.cluster_id.clone(),
                export: ExportInfo::default(),
            },
            pending: PendingItem::default(),
        }
    }

    pub fn from_id(tx: &Tx<'_>, id: &DirvolumeId) -> Result<Self, StoreError> {
        tx.load(id.as_str())
    }

    /// Ids of every stored directory volume
    pub fn list(store: &Store) -> Result<Vec<DirvolumeId>, StoreError> {
        Ok(store
            .list_keys(Bucket::Dirvolume)?
            .into_iter()
            .map(DirvolumeId::from)
            .collect())
    }

    pub fn save(&self, tx: &Tx<'_>) -> Result<(), StoreError> {
        tx.save(self)
    }

    /// Remove the entry; an entry that is already gone is not an error
    pub fn delete(&self, tx: &Tx<'_>) -> Result<(), StoreError> {
        tx.remove::<Self>(self.info.id.as_str())?;
        Ok(())
    }

    /// Rewrite this volume's entry in `directive` so it grants `ip_list`
    /// plus loopback, whatever the entry held before
    pub fn rewrite_export(&self, directive: &str, ip_list: &[String]) -> String {
        set_export_ip_list(&self.info.name, ip_list, directive)
    }

    pub fn new_info_response(&self) -> DirvolumeInfoResponse {
        DirvolumeInfoResponse {
            info: self.info.clone(),
            pending: self.pending.is_pending(),
        }
    }
}

impl Entry for DirvolumeEntry {
    const BUCKET: Bucket = Bucket::Dirvolume;

    fn entry_id(&self) -> &str {
        self.info.id.as_str()
    }
}

/// Union of two address lists, keeping first-seen order
pub fn ip_union(current: &[String], added: &[String]) -> Vec<String> {
    let mut out = current.to_vec();
    for ip in added {
        if !out.contains(ip) {
            out.push(ip.clone());
        }
    }
    out
}

/// `current` without any address in `removed`
pub fn ip_difference(current: &[String], removed: &[String]) -> Vec<String> {
    current
        .iter()
        .filter(|ip| !removed.contains(ip))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::export::append_export;

    fn request(name: Option<&str>) -> DirvolumeCreateRequest {
        DirvolumeCreateRequest {
            name: name.map(str::to_string),
            size: 10,
            cluster_id: ClusterId::from("c1"),
        }
    }

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_name() {
        let dv = DirvolumeEntry::from_request(&request(None));
        assert_eq!(dv.info.name, format!("dvol_{}", dv.info.id));
        assert!(!dv.pending.is_pending());

        let named = DirvolumeEntry::from_request(&request(Some("home")));
        assert_eq!(named.info.name, "home");
    }

    #[test]
    fn test_save_load_delete() {
        let store = Store::temporary().unwrap();
        let dv = DirvolumeEntry::from_request(&request(None));
        store.update(|tx| dv.save(tx)).unwrap();

        let loaded = store.view(|tx| DirvolumeEntry::from_id(tx, &dv.info.id)).unwrap();
        assert_eq!(loaded, dv);
        assert_eq!(DirvolumeEntry::list(&store).unwrap(), vec![dv.info.id.clone()]);

        store.update(|tx| dv.delete(tx)).unwrap();
        store.update(|tx| dv.delete(tx)).unwrap();
        let err = store.view(|tx| DirvolumeEntry::from_id(tx, &dv.info.id)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_rewrite_export() {
        let mut dv = DirvolumeEntry::from_request(&request(Some("a")));
        let directive = append_export("a", "/b(10.0.0.9)");
        let directive = dv.rewrite_export(&directive, &ips(&["10.0.0.1", "10.0.0.2"]));
        assert_eq!(directive, "/b(10.0.0.9),/a(127.0.0.1|10.0.0.1|10.0.0.2)");

        dv.info.export.ip_list = ips(&["10.0.0.1", "10.0.0.2"]);
        let directive = dv.rewrite_export(&directive, &ips(&["10.0.0.2"]));
        assert_eq!(directive, "/b(10.0.0.9),/a(127.0.0.1|10.0.0.2)");

        // the stored list does not matter, a lost entry comes back whole
        dv.info.export.ip_list.clear();
        let directive = dv.rewrite_export("/b(10.0.0.9)", &ips(&["10.0.0.2"]));
        assert_eq!(directive, "/b(10.0.0.9),/a(127.0.0.1|10.0.0.2)");
    }

    #[test]
    fn test_ip_set_algebra() {
        let base = ips(&["1.1.1.1", "2.2.2.2"]);
        assert_eq!(
            ip_union(&base, &ips(&["2.2.2.2", "3.3.3.3"])),
            ips(&["1.1.1.1", "2.2.2.2", "3.3.3.3"])
        );
        assert_eq!(ip_difference(&base, &ips(&["2.2.2.2", "9.9.9.9"])), ips(&["1.1.1.1"]));
    }
}
