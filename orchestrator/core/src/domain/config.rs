// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator Configuration
//
// Explicit configuration handed to the store, the operations and the runner:
// - Store location and bucket-name table
// - Per-kind retry budgets for the Exec step
// - Logging level
//
// Loaded from YAML with serde defaults, then overridden from the environment.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::repository::Bucket;

/// Top-level configuration document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub operations: OperationsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of the embedded database
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Tree name used for each bucket
    #[serde(default)]
    pub buckets: BucketNames,
}

/// Bucket-name table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketNames {
    #[serde(default = "default_cluster_bucket")]
    pub cluster: String,
    #[serde(default = "default_node_bucket")]
    pub node: String,
    #[serde(default = "default_volume_bucket")]
    pub volume: String,
    #[serde(default = "default_dirvolume_bucket")]
    pub dirvolume: String,
    #[serde(default = "default_subvolume_bucket")]
    pub subvolume: String,
    #[serde(default = "default_pending_bucket")]
    pub pending_operations: String,
}

impl BucketNames {
    pub fn name(&self, bucket: Bucket) -> &str {
        match bucket {
            Bucket::Cluster => &self.cluster,
            Bucket::Node => &self.node,
            Bucket::Volume => &self.volume,
            Bucket::Dirvolume => &self.dirvolume,
            Bucket::Subvolume => &self.subvolume,
            Bucket::PendingOperation => &self.pending_operations,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationsConfig {
    #[serde(default)]
    pub max_retries: RetryBudgets,

    /// Pause between Exec attempts
    #[serde(default)]
    pub retry_delay_ms: u64,

    /// Attempts made when querying usage statistics
    #[serde(default = "default_stats_attempts")]
    pub stats_attempts: u32,

    /// Pool volume directory volumes are carved from
    #[serde(default = "default_pool_volume_name")]
    pub pool_volume_name: String,
}

/// Extra Exec attempts allowed per operation kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryBudgets {
    #[serde(default = "default_max_retries")]
    pub create: u32,
    #[serde(default = "default_max_retries")]
    pub expand: u32,
    #[serde(default = "default_max_retries")]
    pub export: u32,
    #[serde(default = "default_max_retries")]
    pub unexport: u32,
    /// Delete never retries automatically
    #[serde(default)]
    pub delete: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of the compact human format
    #[serde(default)]
    pub json: bool,
}

// Default value functions
fn default_store_path() -> PathBuf {
    PathBuf::from("/var/lib/dirvol/store.db")
}

fn default_cluster_bucket() -> String {
    "CLUSTER".to_string()
}

fn default_node_bucket() -> String {
    "NODE".to_string()
}

fn default_volume_bucket() -> String {
    "VOLUME".to_string()
}

fn default_dirvolume_bucket() -> String {
    "DIRVOLUME".to_string()
}

fn default_subvolume_bucket() -> String {
    "SUBVOLUME".to_string()
}

fn default_pending_bucket() -> String {
    "PENDING_OPERATIONS".to_string()
}

fn default_max_retries() -> u32 {
    4
}

fn default_stats_attempts() -> u32 {
    3
}

fn default_pool_volume_name() -> String {
    "dirvol_pool".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            buckets: BucketNames::default(),
        }
    }
}

impl Default for BucketNames {
    fn default() -> Self {
        Self {
            cluster: default_cluster_bucket(),
            node: default_node_bucket(),
            volume: default_volume_bucket(),
            dirvolume: default_dirvolume_bucket(),
            subvolume: default_subvolume_bucket(),
            pending_operations: default_pending_bucket(),
        }
    }
}

impl Default for OperationsConfig {
    fn default() -> Self {
        Self {
            max_retries: RetryBudgets::default(),
            retry_delay_ms: 0,
            stats_attempts: default_stats_attempts(),
            pool_volume_name: default_pool_volume_name(),
        }
    }
}

impl Default for RetryBudgets {
    fn default() -> Self {
        Self {
            create: default_max_retries(),
            expand: default_max_retries(),
            export: default_max_retries(),
            unexport: default_max_retries(),
            delete: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Load from an explicit path, falling back to defaults when none is given
    pub fn load_or_default(path: Option<PathBuf>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => {
                tracing::info!("Loading configuration from {:?}", path);
                Self::from_yaml_file(&path).map_err(|e| {
                    anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
                })?
            }
            None => {
                tracing::warn!("No configuration file given. Using defaults.");
                Self::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("DIRVOL_STORE_PATH") {
            tracing::info!("Environment override: DIRVOL_STORE_PATH={}", val);
            self.store.path = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("DIRVOL_MAX_RETRIES") {
            match val.parse::<u32>() {
                Ok(n) => {
                    tracing::info!("Environment override: DIRVOL_MAX_RETRIES={}", n);
                    let budgets = &mut self.operations.max_retries;
                    budgets.create = n;
                    budgets.expand = n;
                    budgets.export = n;
                    budgets.unexport = n;
                }
                Err(_) => {
                    tracing::warn!(
                        "Invalid value for DIRVOL_MAX_RETRIES: '{}'. Expected a number. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("DIRVOL_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        let buckets = &self.store.buckets;
        let mut seen = std::collections::HashSet::new();
        for bucket in Bucket::ALL {
            let name = buckets.name(bucket);
            if name.is_empty() {
                anyhow::bail!("Bucket name for {} must not be empty", bucket);
            }
            if !seen.insert(name) {
                anyhow::bail!("Bucket name '{}' is used more than once", name);
            }
        }

        if self.operations.stats_attempts == 0 {
            anyhow::bail!("operations.stats_attempts must be at least 1");
        }

        if self.operations.pool_volume_name.is_empty() {
            anyhow::bail!("operations.pool_volume_name must not be empty");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.operations.max_retries.create, 4);
        assert_eq!(config.operations.max_retries.delete, 0);
        assert_eq!(config.store.buckets.name(Bucket::Dirvolume), "DIRVOLUME");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = r#"
store:
  path: /tmp/dirvol-test
  buckets:
    dirvolume: DVOLS
operations:
  max_retries:
    create: 2
"#;
        let config = OrchestratorConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.store.path, PathBuf::from("/tmp/dirvol-test"));
        assert_eq!(config.store.buckets.dirvolume, "DVOLS");
        assert_eq!(config.store.buckets.subvolume, "SUBVOLUME");
        assert_eq!(config.operations.max_retries.create, 2);
        assert_eq!(config.operations.max_retries.expand, 4);
        assert_eq!(config.operations.stats_attempts, 3);
        assert_eq!(config.operations.pool_volume_name, "dirvol_pool");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validation_rejects_duplicate_buckets() {
        let mut config = OrchestratorConfig::default();
        config.store.buckets.subvolume = "DIRVOLUME".to_string();
        assert!(config.validate().is_err());

        config.store.buckets.subvolume = "".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_file_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dirvol.yaml");
        let config = OrchestratorConfig::default();
        std::fs::write(&path, serde_yaml::to_string(&config).unwrap()).unwrap();

        let loaded = OrchestratorConfig::load_or_default(Some(path)).unwrap();
        assert_eq!(loaded.store.buckets, config.store.buckets);
        assert_eq!(loaded.operations.max_retries, config.operations.max_retries);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = OrchestratorConfig::load_or_default(Some(PathBuf::from("/nonexistent/dirvol.yaml")));
        assert!(result.is_err());
    }
}
