use std::sync::Arc;

use medgrid_storage::DynStorage;
use serde::{Deserialize, Serialize};

use crate::InMemoryStorage;

/// Supported storage backend types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Snapshot store kept in process memory.
    #[default]
    Memory,
}

/// Backend tuning options.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// How many times a commit is re-validated after losing a race with
    /// another writer before giving up with `StorageError::Contention`.
    pub max_commit_attempts: usize,
}

impl Default for StorageOptions {
    fn default() -> Self {
        Self {
            max_commit_attempts: 64,
        }
    }
}

/// Factory configuration to construct a storage instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    #[serde(flatten)]
    pub options: StorageOptions,
}

/// Create a storage instance based on the provided configuration.
pub fn create_storage(config: &StorageConfig) -> DynStorage {
    match config.backend {
        StorageBackend::Memory => Arc::new(InMemoryStorage::with_options(config.options.clone())),
    }
}
