//! # medgrid-storage
//!
//! Persistence boundary for MedGrid.
//!
//! This crate defines the traits and types that every storage backend
//! implements. It does not contain implementations; see `medgrid-db-memory`.
//!
//! ## Overview
//!
//! [`DocumentStorage`] stores JSON documents in named [`Collection`]s and
//! offers:
//! - CRUD operations with optimistic versioning (`if_match`)
//! - equality filtered listing
//! - [`DocumentStorage::commit`], an all-or-nothing batch of writes where
//!   every operation carries [`Condition`]s that are checked against the same
//!   state the batch is applied to
//!
//! The conditional batch is what keeps bed occupancy consistent: "mark bed B
//! occupied only if its status is still `available`" and "create the patient"
//! either both happen or neither does.
//!
//! ## Example
//!
//! ```ignore
//! use medgrid_storage::{Collection, Condition, DocumentStorage, WriteBatch};
//!
//! async fn reserve(storage: &dyn DocumentStorage, bed: serde_json::Value, patient: serde_json::Value)
//!     -> Result<(), StorageError>
//! {
//!     let id = bed["id"].as_str().unwrap_or_default().to_string();
//!     let batch = WriteBatch::new()
//!         .update(Collection::Beds, id, bed, [Condition::field_equals("/status", "available")])
//!         .create(Collection::Patients, patient);
//!     storage.commit(batch).await?;
//!     Ok(())
//! }
//! ```

mod error;
mod traits;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use traits::{DocumentStorage, DynStorage};
pub use types::{
    Collection, Condition, Filter, StoredDocument, WriteBatch, WriteOp, document_id,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{
        Collection, Condition, DocumentStorage, DynStorage, Filter, StorageError, StoredDocument,
        WriteBatch,
    };
}
