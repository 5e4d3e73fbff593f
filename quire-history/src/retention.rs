//! Retention pruning.

use crate::error::Result;
use crate::revision::{DocumentId, RevisionId};
use crate::storage::RevisionStore;

/// Keep the newest `max_count` revisions of a document and delete the rest.
///
/// The head is never deleted: `max_count` is clamped to at least 1. The
/// oldest survivor keeps its patch, which is simply never read again.
/// Returns the number of records removed.
pub fn prune<S: RevisionStore + ?Sized>(
    store: &S,
    document_id: DocumentId,
    max_count: usize,
) -> Result<usize> {
    let keep = max_count.max(1);
    let records = store.list_by_document(document_id)?;
    if records.len() <= keep {
        return Ok(0);
    }

    let expired: Vec<RevisionId> = records[keep..].iter().map(|r| r.id).collect();
    let removed = store.delete_many(&expired)?;
    log::info!("Pruned {removed} revisions of document {document_id} (keeping {keep})");
    Ok(removed)
}
