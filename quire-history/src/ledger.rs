//! Per-document revision ledger.
//!
//! A [`Chain`] is a validated, newest-first snapshot of one document's
//! records as loaded from a [`RevisionStore`]. Loading checks the one
//! invariant every reader relies on: a non-empty ledger starts with a head
//! that carries full content.

use crate::error::{HistoryError, Result};
use crate::revision::{DocumentId, RevisionId, RevisionRecord, RevisionSummary};
use crate::storage::RevisionStore;

/// Newest-first view of a document's revisions.
#[derive(Debug, Clone)]
pub struct Chain {
    document_id: DocumentId,
    records: Vec<RevisionRecord>,
}

impl Chain {
    /// Load a document's ledger and check its head.
    pub fn load<S: RevisionStore + ?Sized>(store: &S, document_id: DocumentId) -> Result<Self> {
        let records = store.list_by_document(document_id)?;
        if let Some(head) = records.first() {
            if head.content.is_none() {
                log::error!("Ledger of document {document_id} has no head content at {}", head.id);
                return Err(HistoryError::corrupted(
                    document_id,
                    head.id,
                    "newest revision carries no content",
                ));
            }
        }
        Ok(Self {
            document_id,
            records,
        })
    }

    pub fn document_id(&self) -> DocumentId {
        self.document_id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records, newest first.
    pub fn records(&self) -> &[RevisionRecord] {
        &self.records
    }

    pub fn head(&self) -> Option<&RevisionRecord> {
        self.records.first()
    }

    /// Full text of the head. `None` only for an empty ledger.
    pub fn head_content(&self) -> Option<&str> {
        self.head().and_then(|h| h.content.as_deref())
    }

    /// Newest-first index of a revision.
    pub fn position(&self, revision_id: RevisionId) -> Option<usize> {
        self.records.iter().position(|r| r.id == revision_id)
    }

    /// Index of a revision, or `RevisionNotFound`.
    pub fn require(&self, revision_id: RevisionId) -> Result<usize> {
        self.position(revision_id)
            .ok_or(HistoryError::RevisionNotFound {
                document_id: self.document_id,
                revision_id,
            })
    }

    pub fn summaries(&self) -> Vec<RevisionSummary> {
        self.records.iter().map(RevisionRecord::summary).collect()
    }

    pub fn stats(&self) -> LedgerStats {
        LedgerStats {
            revision_count: self.records.len(),
            patch_bytes: self.records.iter().map(RevisionRecord::patch_size).sum(),
            head_bytes: self.head_content().map_or(0, str::len),
        }
    }
}

/// Storage footprint of a ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub revision_count: usize,
    /// Sum of compressed patch sizes
    pub patch_bytes: usize,
    /// UTF-8 size of the head's full text
    pub head_bytes: usize,
}

impl std::fmt::Display for LedgerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} revisions, {} patch bytes, {} head bytes",
            self.revision_count, self.patch_bytes, self.head_bytes
        )
    }
}
