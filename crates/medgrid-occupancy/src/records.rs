//! Typed access to stored documents.

use medgrid_core::{Bed, OccupancyEvent};
use medgrid_storage::{Collection, DocumentStorage, Filter, StorageError, StoredDocument};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{OccupancyError, Result};

/// Commit attempts for operations that re-validate after losing a race.
pub(crate) const MAX_ATTEMPTS: usize = 4;

/// A decoded record plus the version it was read at.
#[derive(Debug, Clone)]
pub(crate) struct Versioned<T> {
    pub record: T,
    pub version: u64,
}

pub(crate) fn decode<T: DeserializeOwned>(doc: &StoredDocument) -> Result<T> {
    doc.decode().map_err(|e| {
        tracing::error!(collection = %doc.collection, id = %doc.id, error = %e, "stored record does not match its type");
        OccupancyError::internal(format!("corrupt {} record {}", doc.collection, doc.id))
    })
}

pub(crate) fn encode<T: Serialize>(record: &T) -> Result<Value> {
    serde_json::to_value(record).map_err(|e| OccupancyError::internal(e.to_string()))
}

pub(crate) async fn load<T: DeserializeOwned>(
    storage: &dyn DocumentStorage,
    collection: Collection,
    id: &str,
) -> Result<Option<Versioned<T>>> {
    match storage.read(collection, id).await? {
        Some(doc) => Ok(Some(Versioned {
            record: decode(&doc)?,
            version: doc.version,
        })),
        None => Ok(None),
    }
}

pub(crate) async fn require<T: DeserializeOwned>(
    storage: &dyn DocumentStorage,
    collection: Collection,
    kind: &'static str,
    id: &str,
) -> Result<Versioned<T>> {
    load(storage, collection, id)
        .await?
        .ok_or_else(|| OccupancyError::not_found(kind, id))
}

pub(crate) async fn list<T: DeserializeOwned>(
    storage: &dyn DocumentStorage,
    collection: Collection,
    filter: &Filter,
) -> Result<Vec<T>> {
    storage
        .list(collection, filter)
        .await?
        .iter()
        .map(decode::<T>)
        .collect()
}

/// Whether a failed commit lost a race and is worth re-evaluating.
pub(crate) fn lost_race(err: &StorageError) -> bool {
    matches!(
        err,
        StorageError::PreconditionFailed { .. }
            | StorageError::VersionConflict { .. }
            | StorageError::NotFound { .. }
    )
}

pub(crate) fn exhausted(operation: &str) -> OccupancyError {
    tracing::warn!(operation, attempts = MAX_ATTEMPTS, "gave up after repeated commit conflicts");
    OccupancyError::Transient(StorageError::contention(format!(
        "{operation} conflicted {MAX_ATTEMPTS} times"
    )))
}

/// Occupancy events for `beds`, each stamped with the version the commit that
/// produced `written` assigned to it.
pub(crate) fn bed_events(written: &[StoredDocument], beds: &[&Bed]) -> Vec<OccupancyEvent> {
    beds.iter()
        .filter_map(|bed| {
            let stored = written
                .iter()
                .find(|doc| doc.collection == Collection::Beds && doc.id == bed.id);
            if stored.is_none() {
                tracing::warn!(bed_id = %bed.id, "commit did not return the written bed, skipping event");
            }
            stored.map(|doc| OccupancyEvent::from_bed(bed, doc.version))
        })
        .collect()
}
