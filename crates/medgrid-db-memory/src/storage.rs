use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use medgrid_storage::{
    Collection, Condition, DocumentStorage, Filter, StorageError, StoredDocument, WriteBatch,
    WriteOp, document_id,
};
use serde_json::Value;
use time::OffsetDateTime;

use crate::factory::StorageOptions;

/// Documents are shared between tables, so cloning a table copies pointers
/// and never document bodies.
type Table = BTreeMap<Arc<str>, Arc<StoredDocument>>;

/// One immutable generation of the whole store. Tables are shared between
/// generations and only cloned when a commit touches them.
#[derive(Debug, Clone, Default)]
struct Snapshot {
    tables: HashMap<Collection, Arc<Table>>,
}

impl Snapshot {
    fn get(&self, collection: Collection, id: &str) -> Option<&StoredDocument> {
        self.tables
            .get(&collection)
            .and_then(|t| t.get(id))
            .map(Arc::as_ref)
    }

    fn table_mut(&mut self, collection: Collection) -> &mut Table {
        Arc::make_mut(self.tables.entry(collection).or_default())
    }
}

/// Counters describing commit outcomes since startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    /// Batches that were applied.
    pub committed: u64,
    /// Batches rejected because a condition did not hold.
    pub rejected: u64,
    /// Times a validated batch lost the swap to another writer and was retried.
    pub retried: u64,
}

#[derive(Debug, Default)]
struct StatCounters {
    committed: AtomicU64,
    rejected: AtomicU64,
    retried: AtomicU64,
}

/// In-memory document store with atomic conditional batches.
///
/// This storage implementation provides:
/// - Lock-free reads of the latest committed snapshot
/// - All-or-nothing [`WriteBatch`] commits validated against one snapshot
/// - Optimistic retry when two writers race on the snapshot pointer
///
/// Commits never await, so once started a commit runs to completion even if
/// the caller's future is dropped afterwards.
#[derive(Debug)]
pub struct InMemoryStorage {
    state: ArcSwap<Snapshot>,
    /// Atomic counter for generating document versions
    version_counter: AtomicU64,
    stats: StatCounters,
    options: StorageOptions,
}

impl InMemoryStorage {
    /// Creates a new in-memory storage with default options.
    pub fn new() -> Self {
        Self::with_options(StorageOptions::default())
    }

    /// Creates a new in-memory storage with the given options.
    pub fn with_options(options: StorageOptions) -> Self {
        Self {
            state: ArcSwap::from_pointee(Snapshot::default()),
            version_counter: AtomicU64::new(1),
            stats: StatCounters::default(),
            options,
        }
    }

    fn next_version(&self) -> u64 {
        self.version_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Returns commit counters.
    pub fn commit_stats(&self) -> CommitStats {
        CommitStats {
            committed: self.stats.committed.load(Ordering::Relaxed),
            rejected: self.stats.rejected.load(Ordering::Relaxed),
            retried: self.stats.retried.load(Ordering::Relaxed),
        }
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: Collection) -> usize {
        self.state
            .load()
            .tables
            .get(&collection)
            .map_or(0, |t| t.len())
    }

    /// Validates and applies `ops` on top of `base`, producing the next
    /// generation. Conditions see the effects of earlier operations.
    fn apply(
        &self,
        base: &Snapshot,
        ops: &[WriteOp],
        now: OffsetDateTime,
    ) -> Result<(Snapshot, Vec<StoredDocument>), StorageError> {
        let mut next = base.clone();
        let mut results = Vec::with_capacity(ops.len());

        for op in ops {
            match op {
                WriteOp::Create {
                    collection,
                    document,
                } => {
                    let id = document_id(document)?.to_string();
                    if next.get(*collection, &id).is_some() {
                        return Err(StorageError::already_exists(collection, id));
                    }
                    let stored = StoredDocument {
                        id: id.clone(),
                        collection: *collection,
                        version: self.next_version(),
                        document: document.clone(),
                        created_at: now,
                        updated_at: now,
                    };
                    next.table_mut(*collection)
                        .insert(Arc::from(id), Arc::new(stored.clone()));
                    results.push(stored);
                }
                WriteOp::Update {
                    collection,
                    id,
                    document,
                    conditions,
                } => {
                    if document_id(document)? != id {
                        return Err(StorageError::invalid_document(format!(
                            "document id does not match {collection}/{id}"
                        )));
                    }
                    let current = next
                        .get(*collection, id)
                        .ok_or_else(|| StorageError::not_found(collection, id.clone()))?;
                    check_all(*collection, id, conditions, Some(current))?;
                    let stored = StoredDocument {
                        id: id.clone(),
                        collection: *collection,
                        version: self.next_version(),
                        document: document.clone(),
                        created_at: current.created_at,
                        updated_at: now,
                    };
                    next.table_mut(*collection)
                        .insert(Arc::from(id.as_str()), Arc::new(stored.clone()));
                    results.push(stored);
                }
                WriteOp::Delete {
                    collection,
                    id,
                    conditions,
                } => {
                    let current = next
                        .get(*collection, id)
                        .ok_or_else(|| StorageError::not_found(collection, id.clone()))?;
                    check_all(*collection, id, conditions, Some(current))?;
                    let removed = next
                        .table_mut(*collection)
                        .remove(id.as_str())
                        .ok_or_else(|| StorageError::not_found(collection, id.clone()))?;
                    results.push(Arc::unwrap_or_clone(removed));
                }
                WriteOp::Check {
                    collection,
                    id,
                    conditions,
                } => {
                    let current = next.get(*collection, id);
                    check_all(*collection, id, conditions, current)?;
                    let current =
                        current.ok_or_else(|| StorageError::not_found(collection, id.clone()))?;
                    results.push(current.clone());
                }
            }
        }

        Ok((next, results))
    }

    fn commit_ops(&self, ops: &[WriteOp]) -> Result<Vec<StoredDocument>, StorageError> {
        let attempts = self.options.max_commit_attempts.max(1);
        for attempt in 1..=attempts {
            let current = self.state.load_full();
            let (next, results) = match self.apply(&current, ops, OffsetDateTime::now_utc()) {
                Ok(applied) => applied,
                Err(e) => {
                    self.stats.rejected.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(error = %e, ops = ops.len(), "batch rejected");
                    return Err(e);
                }
            };

            let previous = self.state.compare_and_swap(&current, Arc::new(next));
            if Arc::ptr_eq(&previous, &current) {
                self.stats.committed.fetch_add(1, Ordering::Relaxed);
                return Ok(results);
            }

            self.stats.retried.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(attempt, "snapshot changed during commit, retrying");
            std::hint::spin_loop();
        }

        tracing::warn!(attempts, "commit gave up under contention");
        Err(StorageError::contention(format!(
            "commit lost {attempts} consecutive races"
        )))
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn check_all(
    collection: Collection,
    id: &str,
    conditions: &[Condition],
    current: Option<&StoredDocument>,
) -> Result<(), StorageError> {
    for condition in conditions {
        condition
            .check(current)
            .map_err(|reason| StorageError::precondition_failed(collection, id, reason))?;
    }
    Ok(())
}

fn single(mut results: Vec<StoredDocument>) -> Result<StoredDocument, StorageError> {
    results
        .pop()
        .ok_or_else(|| StorageError::internal("commit returned no document"))
}

#[async_trait]
impl DocumentStorage for InMemoryStorage {
    async fn create(
        &self,
        collection: Collection,
        document: Value,
    ) -> Result<StoredDocument, StorageError> {
        single(self.commit_ops(&[WriteOp::Create {
            collection,
            document,
        }])?)
    }

    async fn read(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<StoredDocument>, StorageError> {
        Ok(self.state.load().get(collection, id).cloned())
    }

    async fn update(
        &self,
        collection: Collection,
        id: &str,
        document: Value,
        if_match: Option<u64>,
    ) -> Result<StoredDocument, StorageError> {
        let op = WriteOp::Update {
            collection,
            id: id.to_string(),
            document,
            conditions: if_match.map(Condition::VersionIs).into_iter().collect(),
        };
        match self.commit_ops(std::slice::from_ref(&op)) {
            Ok(results) => single(results),
            Err(StorageError::PreconditionFailed { .. }) if if_match.is_some() => {
                let actual = self
                    .state
                    .load()
                    .get(collection, id)
                    .map_or(0, |doc| doc.version);
                Err(StorageError::version_conflict(
                    if_match.unwrap_or_default(),
                    actual,
                ))
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<(), StorageError> {
        self.commit_ops(&[WriteOp::Delete {
            collection,
            id: id.to_string(),
            conditions: Vec::new(),
        }])?;
        Ok(())
    }

    async fn list(
        &self,
        collection: Collection,
        filter: &Filter,
    ) -> Result<Vec<StoredDocument>, StorageError> {
        let snapshot = self.state.load();
        Ok(snapshot
            .tables
            .get(&collection)
            .map(|table| {
                table
                    .values()
                    .filter(|doc| filter.matches(&doc.document))
                    .map(|doc| StoredDocument::clone(doc))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, batch: WriteBatch) -> Result<Vec<StoredDocument>, StorageError> {
        self.commit_ops(batch.ops())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::task::JoinSet;

    fn bed(id: &str, status: &str, patient: Option<&str>) -> Value {
        json!({"id": id, "departmentId": "d1", "status": status, "currentPatientId": patient})
    }

    fn available() -> Condition {
        Condition::field_equals("/status", "available")
    }

    #[tokio::test]
    async fn test_storage_basic_operations() {
        let storage = InMemoryStorage::new();

        let created = storage
            .create(Collection::Beds, bed("b1", "available", None))
            .await
            .unwrap();
        assert_eq!(created.id, "b1");
        assert_eq!(storage.count(Collection::Beds), 1);

        let read = storage.read(Collection::Beds, "b1").await.unwrap().unwrap();
        assert_eq!(read, created);
        assert!(storage.read(Collection::Beds, "nope").await.unwrap().is_none());

        let updated = storage
            .update(
                Collection::Beds,
                "b1",
                bed("b1", "maintenance", None),
                Some(created.version),
            )
            .await
            .unwrap();
        assert!(updated.version > created.version);
        assert_eq!(updated.created_at, created.created_at);
        assert_eq!(updated.field("/status"), Some(&json!("maintenance")));

        storage.delete(Collection::Beds, "b1").await.unwrap();
        assert_eq!(storage.count(Collection::Beds), 0);
    }

    #[tokio::test]
    async fn test_storage_conflicts_and_not_found() {
        let storage = InMemoryStorage::new();
        let created = storage
            .create(Collection::Beds, bed("b1", "available", None))
            .await
            .unwrap();

        let dup = storage
            .create(Collection::Beds, bed("b1", "available", None))
            .await;
        assert!(matches!(dup, Err(StorageError::AlreadyExists { .. })));

        storage
            .update(Collection::Beds, "b1", bed("b1", "maintenance", None), None)
            .await
            .unwrap();
        let stale = storage
            .update(
                Collection::Beds,
                "b1",
                bed("b1", "available", None),
                Some(created.version),
            )
            .await;
        assert!(matches!(
            stale,
            Err(StorageError::VersionConflict { expected, .. }) if expected == created.version
        ));

        let missing = storage
            .update(Collection::Beds, "b9", bed("b9", "available", None), None)
            .await;
        assert!(matches!(missing, Err(StorageError::NotFound { .. })));
        assert!(storage.delete(Collection::Beds, "b9").await.unwrap_err().is_not_found());

        let wrong_id = storage
            .update(Collection::Beds, "b1", bed("b2", "available", None), None)
            .await;
        assert!(matches!(wrong_id, Err(StorageError::InvalidDocument { .. })));
    }

    #[tokio::test]
    async fn test_commit_shares_untouched_documents() {
        let storage = InMemoryStorage::new();
        for id in ["b1", "b2"] {
            storage
                .create(Collection::Beds, bed(id, "available", None))
                .await
                .unwrap();
        }
        let shared = |storage: &InMemoryStorage, id: &str| {
            storage.state.load().tables[&Collection::Beds][id].clone()
        };
        let b1_before = shared(&storage, "b1");
        let b2_before = shared(&storage, "b2");

        storage
            .update(Collection::Beds, "b1", bed("b1", "occupied", Some("p1")), None)
            .await
            .unwrap();

        assert!(!Arc::ptr_eq(&b1_before, &shared(&storage, "b1")));
        assert!(Arc::ptr_eq(&b2_before, &shared(&storage, "b2")));
    }

    #[tokio::test]
    async fn test_list_filters_and_orders_by_id() {
        let storage = InMemoryStorage::new();
        for (id, status) in [("b3", "available"), ("b1", "available"), ("b2", "occupied")] {
            storage
                .create(Collection::Beds, bed(id, status, None))
                .await
                .unwrap();
        }

        let all = storage.list(Collection::Beds, &Filter::new()).await.unwrap();
        let ids: Vec<_> = all.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["b1", "b2", "b3"]);

        let free = storage
            .list(Collection::Beds, &Filter::new().eq("/status", "available"))
            .await
            .unwrap();
        assert_eq!(free.len(), 2);

        let none = storage.list(Collection::Bills, &Filter::new()).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_failed_condition_writes_nothing() {
        let storage = InMemoryStorage::new();
        storage
            .create(Collection::Beds, bed("b1", "occupied", Some("p0")))
            .await
            .unwrap();

        let batch = WriteBatch::new()
            .create(Collection::Patients, json!({"id": "p1"}))
            .update(
                Collection::Beds,
                "b1",
                bed("b1", "occupied", Some("p1")),
                [available()],
            );
        let err = storage.commit(batch).await.unwrap_err();
        assert!(matches!(err, StorageError::PreconditionFailed { ref id, .. } if id == "b1"));

        assert!(storage.read(Collection::Patients, "p1").await.unwrap().is_none());
        let b1 = storage.read(Collection::Beds, "b1").await.unwrap().unwrap();
        assert_eq!(b1.field("/currentPatientId"), Some(&json!("p0")));
        assert_eq!(storage.commit_stats().rejected, 1);
    }

    #[tokio::test]
    async fn test_batch_conditions_see_earlier_operations() {
        let storage = InMemoryStorage::new();
        storage
            .create(Collection::Beds, bed("b1", "available", None))
            .await
            .unwrap();

        let batch = WriteBatch::new()
            .update(
                Collection::Beds,
                "b1",
                bed("b1", "occupied", Some("p1")),
                [available()],
            )
            .update(
                Collection::Beds,
                "b1",
                bed("b1", "occupied", Some("p2")),
                [available()],
            );
        assert!(storage.commit(batch).await.is_err());

        let batch = WriteBatch::new()
            .create(Collection::Patients, json!({"id": "p1"}))
            .check(Collection::Patients, "p1", [Condition::Exists])
            .update(
                Collection::Beds,
                "b1",
                bed("b1", "occupied", Some("p1")),
                [available()],
            );
        let results = storage.commit(batch).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[2].field("/status"), Some(&json!("occupied")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_conditional_updates_single_winner() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .create(Collection::Beds, bed("b1", "available", None))
            .await
            .unwrap();

        let mut tasks = JoinSet::new();
        for i in 0..32 {
            let storage = storage.clone();
            tasks.spawn(async move {
                let patient = format!("p{i}");
                let batch = WriteBatch::new()
                    .create(Collection::Patients, json!({"id": &patient}))
                    .update(
                        Collection::Beds,
                        "b1",
                        bed("b1", "occupied", Some(&patient)),
                        [available()],
                    );
                storage.commit(batch).await.is_ok()
            });
        }

        let mut winners = 0;
        while let Some(res) = tasks.join_next().await {
            if res.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(storage.count(Collection::Patients), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_independent_commits_all_land() {
        let storage = Arc::new(InMemoryStorage::new());
        let mut tasks = JoinSet::new();
        for i in 0..64 {
            let storage = storage.clone();
            tasks.spawn(async move {
                storage
                    .create(Collection::Beds, bed(&format!("b{i:02}"), "available", None))
                    .await
            });
        }
        while let Some(res) = tasks.join_next().await {
            res.unwrap().unwrap();
        }
        assert_eq!(storage.count(Collection::Beds), 64);
        assert_eq!(storage.commit_stats().committed, 64);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_observe_partial_batches() {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .create(Collection::Beds, bed("a", "occupied", Some("p1")))
            .await
            .unwrap();
        storage
            .create(Collection::Beds, bed("b", "available", None))
            .await
            .unwrap();

        let writer = {
            let storage = storage.clone();
            tokio::spawn(async move {
                let (mut from, mut to) = ("a", "b");
                for _ in 0..200 {
                    let batch = WriteBatch::new()
                        .update(
                            Collection::Beds,
                            from,
                            bed(from, "available", None),
                            [Condition::Exists],
                        )
                        .update(
                            Collection::Beds,
                            to,
                            bed(to, "occupied", Some("p1")),
                            [available()],
                        );
                    storage.commit(batch).await.unwrap();
                    std::mem::swap(&mut from, &mut to);
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let storage = storage.clone();
            tokio::spawn(async move {
                for _ in 0..500 {
                    let beds = storage.list(Collection::Beds, &Filter::new()).await.unwrap();
                    let occupied = beds
                        .iter()
                        .filter(|d| d.field("/status") == Some(&json!("occupied")))
                        .count();
                    assert_eq!(occupied, 1, "observed a half-applied transfer");
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
    }

    #[tokio::test]
    async fn test_random_batches_keep_single_occupant() {
        let storage = InMemoryStorage::new();
        let beds = ["b1", "b2", "b3"];
        for id in beds {
            storage
                .create(Collection::Beds, bed(id, "available", None))
                .await
                .unwrap();
        }

        let mut rng = fastrand::Rng::with_seed(7);
        for step in 0..300 {
            let target = beds[rng.usize(..beds.len())];
            let patient = format!("p{}", rng.usize(..5));
            let batch = if rng.bool() {
                WriteBatch::new().update(
                    Collection::Beds,
                    target,
                    bed(target, "occupied", Some(&patient)),
                    [available()],
                )
            } else {
                WriteBatch::new().update(
                    Collection::Beds,
                    target,
                    bed(target, "available", None),
                    [Condition::field_equals("/currentPatientId", patient.as_str())],
                )
            };
            let _ = storage.commit(batch).await;

            for doc in storage.list(Collection::Beds, &Filter::new()).await.unwrap() {
                let occupied = doc.field("/status") == Some(&json!("occupied"));
                let has_patient = !doc.field("/currentPatientId").unwrap_or(&Value::Null).is_null();
                assert_eq!(occupied, has_patient, "step {step}: {}", doc.document);
            }
        }
    }
}
