// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Executor - Anti-Corruption Layer for the storage nodes
//!
//! The only path from the control plane to the remote side. Operations hand
//! it a management host, the parent volume name and a request payload; how
//! that becomes commands on the node is the implementation's business.
//!
//! Exec steps call the executor outside of any store transaction, always
//! with data freshly read from the store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Payload for directory-volume commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirvolumeRequest {
    pub name: String,
    /// Quota in GiB
    pub size: u64,
    /// Complete export directive the pool volume should carry
    pub export_dir_str: String,
}

/// Payload for sub-volume commands
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubvolumeRequest {
    pub name: String,
    /// Quota in GiB
    pub size: u64,
}

/// Usage reported by the remote side for one directory volume
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirvolumeUsage {
    pub total_size: u64,
    pub used_size: u64,
    pub avail_size: u64,
}

#[async_trait]
pub trait Executor: Send + Sync {
    /// Create the directory, apply its quota and push `req.export_dir_str`
    async fn dirvolume_create(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<(), ExecutorError>;

    /// Push `req.export_dir_str`, then remove the directory
    ///
    /// Reports `NotFound` for a missing directory after the push.
    async fn dirvolume_destroy(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<(), ExecutorError>;

    /// Set the quota to `req.size`; absolute, so repeating it is harmless
    async fn dirvolume_expand(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<(), ExecutorError>;

    /// Push `req.export_dir_str` as the pool volume's export directive
    async fn dirvolume_update_export(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<(), ExecutorError>;

    async fn dirvolume_stats(
        &self,
        host: &str,
        volume: &str,
        req: &DirvolumeRequest,
    ) -> Result<DirvolumeUsage, ExecutorError>;

    async fn subvolume_create(
        &self,
        host: &str,
        volume: &str,
        req: &SubvolumeRequest,
    ) -> Result<(), ExecutorError>;

    async fn subvolume_destroy(
        &self,
        host: &str,
        volume: &str,
        req: &SubvolumeRequest,
    ) -> Result<(), ExecutorError>;

    async fn subvolume_expand(
        &self,
        host: &str,
        volume: &str,
        req: &SubvolumeRequest,
    ) -> Result<(), ExecutorError>;
}

/// Remote command errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// Another command holds the remote lock
    #[error("Remote lock conflict on {0}")]
    LockConflict(String),

    #[error("Remote object not found: {0}")]
    NotFound(String),

    #[error("Timeout while communicating with {0}")]
    Timeout(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("Host unavailable: {0}")]
    Unavailable(String),
}

impl ExecutorError {
    /// Whether repeating the same command may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExecutorError::LockConflict(_) | ExecutorError::Timeout(_) | ExecutorError::Unavailable(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ExecutorError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ExecutorError::LockConflict("pool".into()).is_retryable());
        assert!(ExecutorError::Timeout("node-1".into()).is_retryable());
        assert!(!ExecutorError::CommandFailed("quota".into()).is_retryable());
        assert!(!ExecutorError::NotFound("dvol_x".into()).is_retryable());
        assert!(ExecutorError::NotFound("dvol_x".into()).is_not_found());
    }
}
