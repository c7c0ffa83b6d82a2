use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tidelog_stream::WalConfig;
use tidelog_types::BucketName;

use crate::error::{StoreError, StoreResult};

/// Upper bound for `operation_timeout_ms`: one day.
pub const MAX_OPERATION_TIMEOUT_MS: u64 = 24 * 60 * 60 * 1000;

/// What `delete` does for a key with no live object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Fail with `NotFound`.
    #[default]
    Strict,
    /// Append a tombstone anyway.
    Permissive,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Bucket the store reads and writes.
    pub bucket: String,
    /// Deadline applied by [`ObjectStore::deadline`](crate::ObjectStore::deadline).
    pub operation_timeout_ms: u64,
    pub delete_policy: DeletePolicy,
    /// Used when the store is backed by a file log.
    pub wal: WalConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            bucket: "objects".into(),
            operation_timeout_ms: 30_000,
            delete_policy: DeletePolicy::Strict,
            wal: WalConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn with_bucket(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Self::default()
        }
    }

    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StoreResult<String> {
        toml::to_string_pretty(self).map_err(|e| StoreError::Config(e.to_string()))
    }

    pub fn validate(&self) -> StoreResult<()> {
        self.bucket_name()?;
        if self.operation_timeout_ms == 0 || self.operation_timeout_ms > MAX_OPERATION_TIMEOUT_MS {
            return Err(StoreError::Config(format!(
                "operation_timeout_ms must be between 1 and {MAX_OPERATION_TIMEOUT_MS}, got {}",
                self.operation_timeout_ms
            )));
        }
        Ok(())
    }

    pub fn bucket_name(&self) -> StoreResult<BucketName> {
        Ok(BucketName::new(self.bucket.clone())?)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}
