//! In-memory revision store.
//!
//! Holds every ledger in one map behind a single `RwLock`, so each trait
//! call (including `replace_head`) is applied under one write guard.

use std::collections::HashMap;
use std::sync::RwLock;

use super::{RevisionStore, StoreError};
use crate::revision::{DocumentId, RevisionId, RevisionRecord};

#[derive(Default)]
struct Tables {
    /// Per-document ledgers, oldest first
    ledgers: HashMap<DocumentId, Vec<RevisionRecord>>,
    /// revision id → owning document
    index: HashMap<RevisionId, DocumentId>,
}

impl Tables {
    fn insert(&mut self, record: RevisionRecord) -> Result<(), StoreError> {
        if self.index.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!("revision {} exists", record.id)));
        }
        let ledger = self.ledgers.entry(record.document_id).or_default();
        let pos = ledger.partition_point(|r| r.created_at < record.created_at);
        if ledger.get(pos).is_some_and(|r| r.created_at == record.created_at) {
            return Err(StoreError::Conflict(format!(
                "document {} already has a revision at {}",
                record.document_id, record.created_at
            )));
        }
        self.index.insert(record.id, record.document_id);
        ledger.insert(pos, record);
        Ok(())
    }

    fn clear(&mut self, record_id: RevisionId) -> Result<(), StoreError> {
        let doc = self
            .index
            .get(&record_id)
            .ok_or(StoreError::NotFound(record_id))?;
        let record = self
            .ledgers
            .get_mut(doc)
            .and_then(|l| l.iter_mut().find(|r| r.id == record_id))
            .ok_or(StoreError::NotFound(record_id))?;
        record.content = None;
        Ok(())
    }
}

/// Revision store backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents with at least one revision.
    pub fn document_count(&self) -> Result<usize, StoreError> {
        Ok(self.tables.read()?.ledgers.len())
    }

    /// Overwrite a stored record in place.
    ///
    /// Bypasses every ledger rule; intended for fault-injection in tests.
    pub fn overwrite(&self, record: RevisionRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write()?;
        let slot = tables
            .ledgers
            .get_mut(&record.document_id)
            .and_then(|l| l.iter_mut().find(|r| r.id == record.id))
            .ok_or(StoreError::NotFound(record.id))?;
        *slot = record;
        Ok(())
    }
}

impl RevisionStore for MemoryStore {
    fn append(&self, record: RevisionRecord) -> Result<(), StoreError> {
        self.tables.write()?.insert(record)
    }

    fn list_by_document(&self, document_id: DocumentId) -> Result<Vec<RevisionRecord>, StoreError> {
        let tables = self.tables.read()?;
        Ok(tables
            .ledgers
            .get(&document_id)
            .map(|l| l.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn clear_content(&self, record_id: RevisionId) -> Result<(), StoreError> {
        self.tables.write()?.clear(record_id)
    }

    fn delete_many(&self, record_ids: &[RevisionId]) -> Result<usize, StoreError> {
        let mut tables = self.tables.write()?;
        let mut removed = 0;
        for id in record_ids {
            let Some(doc) = tables.index.remove(id) else {
                continue;
            };
            if let Some(ledger) = tables.ledgers.get_mut(&doc) {
                let before = ledger.len();
                ledger.retain(|r| r.id != *id);
                removed += before - ledger.len();
                if ledger.is_empty() {
                    tables.ledgers.remove(&doc);
                }
            }
        }
        Ok(removed)
    }

    fn head(&self, document_id: DocumentId) -> Result<Option<RevisionRecord>, StoreError> {
        let tables = self.tables.read()?;
        Ok(tables
            .ledgers
            .get(&document_id)
            .and_then(|l| l.last())
            .cloned())
    }

    fn replace_head(
        &self,
        demote: Option<RevisionId>,
        record: RevisionRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write()?;
        // Validate the insert first so a failure leaves the head untouched
        if tables.index.contains_key(&record.id) {
            return Err(StoreError::Conflict(format!("revision {} exists", record.id)));
        }
        if let Some(id) = demote {
            if !tables.index.contains_key(&id) {
                return Err(StoreError::NotFound(id));
            }
        }
        let previous = demote
            .and_then(|id| {
                let doc = tables.index.get(&id).copied()?;
                tables.ledgers.get(&doc)?.iter().find(|r| r.id == id).cloned()
            });

        if let Some(id) = demote {
            tables.clear(id)?;
        }
        if let Err(e) = tables.insert(record) {
            if let Some(prev) = previous {
                // Put the demoted content back
                if let Some(slot) = tables
                    .ledgers
                    .get_mut(&prev.document_id)
                    .and_then(|l| l.iter_mut().find(|r| r.id == prev.id))
                {
                    *slot = prev;
                }
            }
            return Err(e);
        }
        Ok(())
    }
}
