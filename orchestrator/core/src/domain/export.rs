// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Export Directive Codec
//!
//! The pool volume carries a single `export-dir` option listing, for every
//! directory volume, the addresses allowed to mount it:
//!
//! ```text
//! /dvol_a(127.0.0.1|10.0.0.1),/dvol_b(127.0.0.1),/dvol_c
//! ```
//!
//! The cluster record keeps this string verbatim because the remote side
//! consumes exactly this textual form. Entries are matched by exact name.
//! An entry with no addresses renders as the bare `/name`; `/name()` parses
//! to the same empty entry.
//!
//! The remote side treats an entry with no addresses as open to everyone, so
//! none of the helpers below ever take [`LOOPBACK_ADDRESS`] away from an
//! entry.

/// Address implicitly granted to every directory volume
pub const LOOPBACK_ADDRESS: &str = "127.0.0.1";

const ENTRY_SEPARATOR: char = ',';
const ADDRESS_SEPARATOR: char = '|';

/// One `/name(ip|ip)` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportEntry {
    pub name: String,
    pub addresses: Vec<String>,
}

impl ExportEntry {
    fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let raw = raw.strip_prefix('/').unwrap_or(raw);
        match raw.find('(') {
            Some(open) => {
                let name = raw[..open].to_string();
                let inner = raw[open + 1..].trim_end_matches(')');
                let addresses = inner
                    .split(ADDRESS_SEPARATOR)
                    .map(str::trim)
                    .filter(|ip| !ip.is_empty())
                    .map(str::to_string)
                    .collect();
                Self { name, addresses }
            }
            None => Self {
                name: raw.to_string(),
                addresses: Vec::new(),
            },
        }
    }

    fn render(&self) -> String {
        if self.addresses.is_empty() {
            format!("/{}", self.name)
        } else {
            format!("/{}({})", self.name, self.addresses.join("|"))
        }
    }

    fn add_addresses(&mut self, addresses: &[String]) {
        for ip in addresses {
            if !self.addresses.contains(ip) {
                self.addresses.push(ip.clone());
            }
        }
    }

    fn remove_addresses(&mut self, addresses: &[String]) {
        self.addresses
            .retain(|ip| ip == LOOPBACK_ADDRESS || !addresses.contains(ip));
    }

    fn set_addresses(&mut self, addresses: &[String]) {
        self.addresses = vec![LOOPBACK_ADDRESS.to_string()];
        self.add_addresses(addresses);
    }
}

/// Parsed form of the whole export directive
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportDirective {
    entries: Vec<ExportEntry>,
}

impl ExportDirective {
    pub fn parse(directive: &str) -> Self {
        let entries = directive
            .split(ENTRY_SEPARATOR)
            .filter(|raw| !raw.trim().is_empty())
            .map(ExportEntry::parse)
            .collect();
        Self { entries }
    }

    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(ExportEntry::render)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn entries(&self) -> &[ExportEntry] {
        &self.entries
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.name == name)
    }

    /// Addresses currently granted to `name`, `None` if there is no entry
    pub fn addresses_for(&self, name: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.addresses.as_slice())
    }

    /// Append an entry unless one already exists for `name`
    pub fn append(&mut self, name: &str, addresses: &[String]) {
        if self.contains(name) {
            return;
        }
        let mut entry = ExportEntry {
            name: name.to_string(),
            addresses: Vec::new(),
        };
        entry.add_addresses(addresses);
        self.entries.push(entry);
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|e| e.name != name);
    }

    pub fn add_addresses(&mut self, name: &str, addresses: &[String]) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.add_addresses(addresses);
        }
    }

    pub fn remove_addresses(&mut self, name: &str, addresses: &[String]) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.remove_addresses(addresses);
        }
    }

    /// Grant `name` exactly loopback plus `addresses`, appending the entry
    /// at the end when it is missing
    pub fn set_addresses(&mut self, name: &str, addresses: &[String]) {
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.set_addresses(addresses),
            None => {
                let mut entry = ExportEntry {
                    name: name.to_string(),
                    addresses: Vec::new(),
                };
                entry.set_addresses(addresses);
                self.entries.push(entry);
            }
        }
    }
}

/// Append a loopback-only entry for a new directory volume
pub fn append_export(name: &str, directive: &str) -> String {
    let mut parsed = ExportDirective::parse(directive);
    parsed.append(name, &[LOOPBACK_ADDRESS.to_string()]);
    parsed.render()
}

/// Drop the entry for `name`
pub fn delete_export(name: &str, directive: &str) -> String {
    let mut parsed = ExportDirective::parse(directive);
    parsed.remove(name);
    parsed.render()
}

/// Union `addresses` into the entry for `name`
pub fn append_ip_list_to_export(name: &str, addresses: &[String], directive: &str) -> String {
    let mut parsed = ExportDirective::parse(directive);
    parsed.add_addresses(name, addresses);
    parsed.render()
}

/// Remove `addresses` from the entry for `name`; loopback always stays
pub fn delete_ip_list_from_export(name: &str, addresses: &[String], directive: &str) -> String {
    let mut parsed = ExportDirective::parse(directive);
    parsed.remove_addresses(name, addresses);
    parsed.render()
}

/// Replace the entry for `name` with loopback plus `addresses`
pub fn set_export_ip_list(name: &str, addresses: &[String], directive: &str) -> String {
    let mut parsed = ExportDirective::parse(directive);
    parsed.set_addresses(name, addresses);
    parsed.render()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_append_export() {
        let res1 = append_export("dir1", "");
        assert_eq!(res1, "/dir1(127.0.0.1)");
        let res2 = append_export("dir2", &res1);
        assert_eq!(res2, "/dir1(127.0.0.1),/dir2(127.0.0.1)");
        // appending twice does not duplicate the entry
        assert_eq!(append_export("dir2", &res2), res2);
    }

    #[test]
    fn test_delete_export() {
        let directive = "/dir1(127.0.0.1),/dir2(127.0.0.1)";
        let res1 = delete_export("dir2", directive);
        assert_eq!(res1, "/dir1(127.0.0.1)");
        let res2 = delete_export("dir1", &res1);
        assert_eq!(res2, "");
    }

    #[test]
    fn test_delete_export_matches_exact_name() {
        let directive = "/dir1(127.0.0.1),/dir10(127.0.0.1)";
        assert_eq!(delete_export("dir1", directive), "/dir10(127.0.0.1)");
    }

    #[test]
    fn test_append_ip_list_to_export() {
        let directive = "/dir1(127.0.0.1),/dir2(127.0.0.1)";
        let res1 = append_ip_list_to_export("dir1", &ips(&["10.0.0.1"]), directive);
        assert_eq!(res1, "/dir1(127.0.0.1|10.0.0.1),/dir2(127.0.0.1)");
        let res2 = append_ip_list_to_export("dir2", &ips(&["10.0.0.1", "10.0.0.2"]), &res1);
        assert_eq!(
            res2,
            "/dir1(127.0.0.1|10.0.0.1),/dir2(127.0.0.1|10.0.0.1|10.0.0.2)"
        );
        // union is idempotent
        let res3 = append_ip_list_to_export("dir2", &ips(&["10.0.0.2"]), &res2);
        assert_eq!(res3, res2);
    }

    #[test]
    fn test_delete_ip_list_from_export() {
        let directive = "/dir1(127.0.0.1|10.0.0.1),/dir2(127.0.0.1|10.0.0.1|10.0.0.2)";
        let res1 = delete_ip_list_from_export("dir2", &ips(&["10.0.0.1", "10.0.0.2"]), directive);
        assert_eq!(res1, "/dir1(127.0.0.1|10.0.0.1),/dir2(127.0.0.1)");
        let res2 = delete_ip_list_from_export("dir1", &ips(&["10.0.0.1"]), &res1);
        assert_eq!(res2, "/dir1(127.0.0.1),/dir2(127.0.0.1)");
        // removing an absent address is a no-op
        assert_eq!(delete_ip_list_from_export("dir1", &ips(&["10.9.9.9"]), &res2), res2);
    }

    #[test]
    fn test_empty_entry_representation() {
        let parsed = ExportDirective::parse("/dir1(),/dir2");
        assert_eq!(parsed.addresses_for("dir1"), Some(&[][..]));
        assert_eq!(parsed.render(), "/dir1,/dir2");

        let readded = append_ip_list_to_export("dir1", &ips(&["10.0.0.3"]), "/dir1,/dir2(127.0.0.1)");
        assert_eq!(readded, "/dir1(10.0.0.3),/dir2(127.0.0.1)");
        let emptied = delete_ip_list_from_export("dir1", &ips(&["10.0.0.3"]), &readded);
        assert_eq!(emptied, "/dir1,/dir2(127.0.0.1)");
    }

    #[test]
    fn test_loopback_is_never_removed() {
        let directive = "/dir1(127.0.0.1|10.0.0.1),/dir2(127.0.0.1)";
        let res = delete_ip_list_from_export("dir1", &ips(&["127.0.0.1", "10.0.0.1"]), directive);
        assert_eq!(res, "/dir1(127.0.0.1),/dir2(127.0.0.1)");
        assert_eq!(delete_ip_list_from_export("dir2", &ips(&["127.0.0.1"]), &res), res);
    }

    #[test]
    fn test_set_export_ip_list() {
        let directive = "/dir1(127.0.0.1|10.0.0.1),/dir2(127.0.0.1)";
        let res1 = set_export_ip_list("dir1", &ips(&["10.0.0.2"]), directive);
        assert_eq!(res1, "/dir1(127.0.0.1|10.0.0.2),/dir2(127.0.0.1)");
        // an empty set still keeps loopback
        let res2 = set_export_ip_list("dir1", &[], &res1);
        assert_eq!(res2, "/dir1(127.0.0.1),/dir2(127.0.0.1)");
        // a missing entry is appended rather than silently skipped
        let res3 = set_export_ip_list("dir3", &ips(&["10.0.0.3", "127.0.0.1"]), &res2);
        assert_eq!(res3, "/dir1(127.0.0.1),/dir2(127.0.0.1),/dir3(127.0.0.1|10.0.0.3)");
    }

    #[test]
    fn test_unaffected_entries_keep_order() {
        let directive = "/c(1.1.1.1),/a(2.2.2.2),/b(3.3.3.3)";
        let res = append_ip_list_to_export("a", &ips(&["4.4.4.4"]), directive);
        assert_eq!(res, "/c(1.1.1.1),/a(2.2.2.2|4.4.4.4),/b(3.3.3.3)");
    }

    #[test]
    fn test_operations_on_missing_name_are_noops() {
        let directive = "/dir1(127.0.0.1)";
        assert_eq!(append_ip_list_to_export("ghost", &ips(&["10.0.0.1"]), directive), directive);
        assert_eq!(delete_ip_list_from_export("ghost", &ips(&["127.0.0.1"]), directive), directive);
        assert_eq!(delete_export("ghost", directive), directive);
    }
}
