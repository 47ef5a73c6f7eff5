//! Core types for the storage abstraction layer.

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use time::OffsetDateTime;

use crate::error::StorageError;

/// The document collections MedGrid persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    Departments,
    Beds,
    Patients,
    Bills,
    Users,
    /// Uniqueness index: one document per normalized e-mail address.
    UserEmails,
}

impl Collection {
    /// Returns the collection name as used in logs and errors.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Departments => "departments",
            Self::Beds => "beds",
            Self::Patients => "patients",
            Self::Bills => "bills",
            Self::Users => "users",
            Self::UserEmails => "user_emails",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document as returned from storage, with its version and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    /// The document id (mirrors the document's `id` field).
    pub id: String,
    /// The collection the document lives in.
    pub collection: Collection,
    /// Opaque, strictly increasing per write. Used for optimistic concurrency.
    pub version: u64,
    /// The document body.
    pub document: Value,
    /// When the document was first created.
    pub created_at: OffsetDateTime,
    /// When the document was last written.
    pub updated_at: OffsetDateTime,
}

impl StoredDocument {
    /// Deserializes the body into a typed record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Serialization` if the body does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, StorageError> {
        Ok(T::deserialize(&self.document)?)
    }

    /// Returns the value at a JSON pointer, if present.
    #[must_use]
    pub fn field(&self, pointer: &str) -> Option<&Value> {
        self.document.pointer(pointer)
    }
}

/// Extracts the `id` field that every stored document must carry.
///
/// # Errors
///
/// Returns `StorageError::InvalidDocument` if the document is not an object
/// or its `id` is missing or empty.
pub fn document_id(document: &Value) -> Result<&str, StorageError> {
    if !document.is_object() {
        return Err(StorageError::invalid_document("document must be a JSON object"));
    }
    match document.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(StorageError::invalid_document("document must have a non-empty string id")),
    }
}

/// A conjunction of "field at pointer equals value" clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<(String, Value)>,
}

impl Filter {
    /// Creates an empty filter that matches every document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality clause on a JSON pointer such as `/departmentId`.
    #[must_use]
    pub fn eq(mut self, pointer: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((pointer.into(), value.into()));
        self
    }

    /// Returns `true` if the filter has no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Checks a document body against every clause. A missing field only
    /// matches `null`.
    #[must_use]
    pub fn matches(&self, document: &Value) -> bool {
        self.clauses
            .iter()
            .all(|(pointer, expected)| document.pointer(pointer).unwrap_or(&Value::Null) == expected)
    }
}

/// A condition on the current state of one document, checked atomically
/// with the write it guards.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The document must exist.
    Exists,
    /// The document must not exist.
    Absent,
    /// The document must exist at exactly this version.
    VersionIs(u64),
    /// The document must exist and the value at `pointer` must equal `value`.
    /// A missing field compares equal to `null`.
    FieldEquals {
        /// JSON pointer into the document body.
        pointer: String,
        /// Expected value.
        value: Value,
    },
}

impl Condition {
    /// Shorthand for [`Condition::FieldEquals`].
    #[must_use]
    pub fn field_equals(pointer: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::FieldEquals {
            pointer: pointer.into(),
            value: value.into(),
        }
    }

    /// Evaluates the condition against the current document.
    ///
    /// # Errors
    ///
    /// Returns a human readable reason when the condition does not hold.
    pub fn check(&self, current: Option<&StoredDocument>) -> Result<(), String> {
        match (self, current) {
            (Self::Exists, Some(_)) | (Self::Absent, None) => Ok(()),
            (Self::Exists, None) => Err("document does not exist".to_string()),
            (Self::Absent, Some(_)) => Err("document already exists".to_string()),
            (Self::VersionIs(expected), Some(doc)) if doc.version == *expected => Ok(()),
            (Self::VersionIs(expected), Some(doc)) => Err(format!(
                "version is {}, expected {expected}",
                doc.version
            )),
            (Self::FieldEquals { pointer, value }, Some(doc)) => {
                let actual = doc.field(pointer).unwrap_or(&Value::Null);
                if actual == value {
                    Ok(())
                } else {
                    Err(format!("{pointer} is {actual}, expected {value}"))
                }
            }
            (Self::VersionIs(_) | Self::FieldEquals { .. }, None) => {
                Err("document does not exist".to_string())
            }
        }
    }
}

/// One operation of a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a new document; implies [`Condition::Absent`].
    Create {
        /// Target collection.
        collection: Collection,
        /// Document body; must carry an `id`.
        document: Value,
    },
    /// Replace an existing document; implies [`Condition::Exists`].
    Update {
        /// Target collection.
        collection: Collection,
        /// Document id.
        id: String,
        /// New document body.
        document: Value,
        /// Conditions on the current document.
        conditions: Vec<Condition>,
    },
    /// Remove an existing document; implies [`Condition::Exists`].
    Delete {
        /// Target collection.
        collection: Collection,
        /// Document id.
        id: String,
        /// Conditions on the current document.
        conditions: Vec<Condition>,
    },
    /// Assert conditions on a document without writing it.
    Check {
        /// Target collection.
        collection: Collection,
        /// Document id.
        id: String,
        /// Conditions on the current document.
        conditions: Vec<Condition>,
    },
}

impl WriteOp {
    /// The collection this operation targets.
    #[must_use]
    pub fn collection(&self) -> Collection {
        match self {
            Self::Create { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. }
            | Self::Check { collection, .. } => *collection,
        }
    }
}

/// An ordered, all-or-nothing group of conditional writes.
///
/// Operations are applied in order to a working copy of the store; each
/// condition sees the effects of the operations before it. If any condition
/// fails the whole batch is discarded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a create.
    #[must_use]
    pub fn create(mut self, collection: Collection, document: Value) -> Self {
        self.ops.push(WriteOp::Create {
            collection,
            document,
        });
        self
    }

    /// Appends a conditional update.
    #[must_use]
    pub fn update(
        mut self,
        collection: Collection,
        id: impl Into<String>,
        document: Value,
        conditions: impl IntoIterator<Item = Condition>,
    ) -> Self {
        self.ops.push(WriteOp::Update {
            collection,
            id: id.into(),
            document,
            conditions: conditions.into_iter().collect(),
        });
        self
    }

    /// Appends a conditional delete.
    #[must_use]
    pub fn delete(
        mut self,
        collection: Collection,
        id: impl Into<String>,
        conditions: impl IntoIterator<Item = Condition>,
    ) -> Self {
        self.ops.push(WriteOp::Delete {
            collection,
            id: id.into(),
            conditions: conditions.into_iter().collect(),
        });
        self
    }

    /// Appends a read-only assertion.
    #[must_use]
    pub fn check(
        mut self,
        collection: Collection,
        id: impl Into<String>,
        conditions: impl IntoIterator<Item = Condition>,
    ) -> Self {
        self.ops.push(WriteOp::Check {
            collection,
            id: id.into(),
            conditions: conditions.into_iter().collect(),
        });
        self
    }

    /// Returns the operations in order.
    #[must_use]
    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    /// Returns the number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if the batch has no operations.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
