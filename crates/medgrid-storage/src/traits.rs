//! Storage trait definitions.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{Collection, Filter, StoredDocument, WriteBatch};

/// Shared handle to a storage backend.
pub type DynStorage = Arc<dyn DocumentStorage>;

/// The persistence boundary every backend implements.
///
/// Implementations must be `Send + Sync` to support concurrent access from
/// request handlers. Reads observe only committed state: a batch applied by
/// [`commit`](Self::commit) is visible entirely or not at all.
#[async_trait]
pub trait DocumentStorage: Send + Sync {
    /// Creates a new document. The id is taken from the document's `id` field.
    ///
    /// # Errors
    ///
    /// - `StorageError::AlreadyExists` if the id is taken
    /// - `StorageError::InvalidDocument` if the document has no usable id
    async fn create(
        &self,
        collection: Collection,
        document: Value,
    ) -> Result<StoredDocument, StorageError>;

    /// Reads the current version of a document.
    ///
    /// Returns `Ok(None)` if it does not exist.
    async fn read(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDocument>, StorageError>;

    /// Replaces an existing document.
    ///
    /// # Arguments
    ///
    /// * `if_match` - Optional version for optimistic locking.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` if the document does not exist
    /// - `StorageError::VersionConflict` if `if_match` is stale
    async fn update(
        &self,
        collection: Collection,
        id: &str,
        document: Value,
        if_match: Option<u64>,
    ) -> Result<StoredDocument, StorageError>;

    /// Deletes a document.
    ///
    /// # Errors
    ///
    /// - `StorageError::NotFound` if the document does not exist
    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StorageError>;

    /// Lists the documents of a collection matching `filter`, ordered by id.
    async fn list(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, StorageError>;

    /// Applies a batch all-or-nothing.
    ///
    /// Returns one document per operation, in order: the written document for
    /// creates and updates, the removed one for deletes and the current one
    /// for checks.
    ///
    /// # Errors
    ///
    /// - `StorageError::PreconditionFailed` if any condition does not hold
    /// - `StorageError::AlreadyExists` / `StorageError::NotFound` for the
    ///   implicit conditions of creates, updates and deletes
    /// - `StorageError::Contention` if the backend could not commit within
    ///   its retry limit
    ///
    /// On any error nothing was written.
    async fn commit(&self, batch: WriteBatch) -> Result<Vec<StoredDocument>, StorageError>;

    /// Returns a name identifying the backend, for logs.
    fn backend_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn DocumentStorage) {}
    }

    #[test]
    fn test_dyn_storage_is_send_sync() {
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<DynStorage>();
    }
}
