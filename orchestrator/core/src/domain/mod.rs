// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! Persisted records, the pending-operation ledger, the export-directive
//! codec and the executor contract. Nothing here talks to a remote host.

pub mod config;
pub mod dirvolume;
pub mod events;
pub mod executor;
pub mod export;
pub mod ids;
pub mod pending;
pub mod repository;
pub mod subvolume;
pub mod topology;
