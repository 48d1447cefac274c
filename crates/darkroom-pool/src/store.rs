use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use crate::state::{ApiKey, Validity};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Persistence boundary for the key pool. The full entry list is the unit of
/// persistence; callers decide when to save (per pass, not per attempt).
#[async_trait]
pub trait PoolStore: Send + Sync {
    async fn load(&self) -> Result<Vec<ApiKey>, StoreError>;
    async fn save(&self, keys: &[ApiKey]) -> Result<(), StoreError>;
}

/// Stores the pool as one JSON document on disk.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl PoolStore for JsonFileStore {
    /// A missing file means an empty pool. A corrupt file is discarded with a
    /// warning rather than taking the process down.
    async fn load(&self) -> Result<Vec<ApiKey>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(keys) => Ok(keys),
            Err(err) => {
                warn!(event = "pool_store_corrupt", path = %self.path.display(), error = %err,
                    "discarding unreadable key store");
                Ok(Vec::new())
            }
        }
    }

    async fn save(&self, keys: &[ApiKey]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        // `Checking` is an in-flight state and must never hit disk.
        let keys: Vec<ApiKey> = keys
            .iter()
            .cloned()
            .map(|mut key| {
                if key.validity == Validity::Checking {
                    key.validity = Validity::Unknown;
                }
                key
            })
            .collect();
        let json = serde_json::to_vec_pretty(&keys)?;
        // Write-then-rename so a crash mid-save never truncates the live file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    keys: Mutex<Vec<ApiKey>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keys(keys: Vec<ApiKey>) -> Self {
        Self {
            keys: Mutex::new(keys),
        }
    }
}

#[async_trait]
impl PoolStore for MemoryStore {
    async fn load(&self) -> Result<Vec<ApiKey>, StoreError> {
        Ok(self.keys.lock().await.clone())
    }

    async fn save(&self, keys: &[ApiKey]) -> Result<(), StoreError> {
        *self.keys.lock().await = keys.to_vec();
        Ok(())
    }
}
