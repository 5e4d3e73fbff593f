//! Persistent storage for revision ledgers.
//!
//! Architecture:
//! ```text
//! ┌──────────────────┐   append / replace_head   ┌───────────────────┐
//! │ Commit / Prune   │ ────────────────────────► │ RevisionStore     │
//! │ Reconstruct      │ ◄──────────────────────── │ (trait)           │
//! └──────────────────┘   list_by_document        └─────────┬─────────┘
//!                                                          │
//!                                     ┌────────────────────┴───────────┐
//!                                     ▼                                ▼
//!                              ┌─────────────┐                 ┌──────────────┐
//!                              │ MemoryStore │                 │ RevisionDb   │
//!                              │ (tests)     │                 │ (RocksDB)    │
//!                              └─────────────┘                 └──────────────┘
//! ```
//!
//! Every method is atomic on its own. `replace_head` is the one multi-record
//! mutation and must commit the demotion and the new head together.

pub mod memory;
pub mod rocks;

pub use memory::MemoryStore;
pub use rocks::{RevisionDb, StoreConfig};

use uuid::Uuid;

use crate::revision::{DocumentId, RevisionId, RevisionRecord};

/// Minimal storage contract consumed by the engine.
pub trait RevisionStore: Send + Sync {
    /// Insert a new record. Fails on a duplicate id or a duplicate
    /// `(document_id, created_at)` pair.
    fn append(&self, record: RevisionRecord) -> Result<(), StoreError>;

    /// All records of a document, newest first.
    fn list_by_document(&self, document_id: DocumentId) -> Result<Vec<RevisionRecord>, StoreError>;

    /// Drop the full-text snapshot of a record (demotion from head).
    fn clear_content(&self, record_id: RevisionId) -> Result<(), StoreError>;

    /// Delete records by id. Unknown ids are ignored. Returns the number removed.
    fn delete_many(&self, record_ids: &[RevisionId]) -> Result<usize, StoreError>;

    /// Newest record of a document.
    fn head(&self, document_id: DocumentId) -> Result<Option<RevisionRecord>, StoreError> {
        Ok(self.list_by_document(document_id)?.into_iter().next())
    }

    /// Demote `demote` (if any) and append `record` as one unit.
    ///
    /// The default composes the primitives and is only as atomic as they are;
    /// backends that can batch should override it.
    fn replace_head(
        &self,
        demote: Option<RevisionId>,
        record: RevisionRecord,
    ) -> Result<(), StoreError> {
        if let Some(id) = demote {
            self.clear_content(id)?;
        }
        self.append(record)
    }

    /// Delete every record of a document.
    fn purge_document(&self, document_id: DocumentId) -> Result<usize, StoreError> {
        let ids: Vec<RevisionId> = self
            .list_by_document(document_id)?
            .iter()
            .map(|r| r.id)
            .collect();
        self.delete_many(&ids)
    }
}

/// Storage errors.
#[derive(Debug, Clone)]
pub enum StoreError {
    /// RocksDB internal error
    DatabaseError(String),
    /// Record not found
    NotFound(Uuid),
    /// A record with the same id or position already exists
    Conflict(String),
    /// Serialization failed
    SerializationError(String),
    /// Deserialization failed
    DeserializationError(String),
    /// Compression error
    CompressionError(String),
    /// In-memory lock poisoned by a panicking writer
    Poisoned,
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::DatabaseError(e) => write!(f, "Database error: {e}"),
            StoreError::NotFound(id) => write!(f, "Revision not found: {id}"),
            StoreError::Conflict(e) => write!(f, "Conflicting write: {e}"),
            StoreError::SerializationError(e) => write!(f, "Serialization error: {e}"),
            StoreError::DeserializationError(e) => write!(f, "Deserialization error: {e}"),
            StoreError::CompressionError(e) => write!(f, "Compression error: {e}"),
            StoreError::Poisoned => write!(f, "Store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rocksdb::Error> for StoreError {
    fn from(e: rocksdb::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(_: std::sync::PoisonError<T>) -> Self {
        StoreError::Poisoned
    }
}
