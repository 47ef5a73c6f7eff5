//! In-memory document storage backend for MedGrid.
//!
//! This crate provides an in-memory implementation of the `DocumentStorage`
//! trait from `medgrid-storage`. All collections live in one immutable
//! snapshot behind an `arc_swap::ArcSwap`; readers load the current snapshot
//! without locking and writers publish a successor with compare-and-swap.
//!
//! # Example
//!
//! ```ignore
//! use medgrid_db_memory::InMemoryStorage;
//! use medgrid_storage::{Collection, DocumentStorage};
//!
//! let storage = InMemoryStorage::new();
//! let created = storage
//!     .create(Collection::Departments, serde_json::json!({"id": "icu", "name": "ICU"}))
//!     .await?;
//! ```

pub mod factory;
pub mod storage;

pub use factory::{StorageBackend, StorageConfig, StorageOptions, create_storage};
pub use medgrid_storage::{DocumentStorage, DynStorage, StorageError, StoredDocument};
pub use storage::{CommitStats, InMemoryStorage};
