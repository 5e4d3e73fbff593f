//! Commit engine: turns a save into a new head revision.
//!
//! ```text
//!   before:  [H: content=A]  [R1: patch]  ...
//!   commit(B), d = diff(A, B)
//!   after:   [H': content=B, patch=d]  [H: patch only]  [R1: patch]  ...
//! ```
//!
//! The demotion of the old head and the insertion of the new one go to the
//! store as a single `replace_head` call.

use crate::config::HistoryConfig;
use crate::error::Result;
use crate::ledger::Chain;
use crate::patch::{diff_with_budget, to_patch};
use crate::retention;
use crate::revision::{DocumentId, EditorId, RevisionRecord, Timestamp};
use crate::storage::RevisionStore;

/// Record `new_content` as the document's new head.
///
/// Returns `Ok(None)` when the content equals the current head. An empty
/// ledger always gets a genesis revision. `created_at` is `now`, bumped past
/// the current head if the clock has not advanced. Retention runs after a
/// successful commit; its failures are logged and do not undo the commit.
pub fn commit<S: RevisionStore + ?Sized>(
    store: &S,
    document_id: DocumentId,
    new_content: &str,
    editor_id: Option<EditorId>,
    now: Timestamp,
    config: &HistoryConfig,
) -> Result<Option<RevisionRecord>> {
    let chain = Chain::load(store, document_id)?;

    let record = match chain.head() {
        None => RevisionRecord::genesis(document_id, new_content.to_owned(), editor_id, now),
        Some(head) => {
            let baseline = chain.head_content().unwrap_or_default();
            let delta = diff_with_budget(baseline, new_content, config.diff_edit_budget);
            if delta.is_noop() {
                log::trace!("Document {document_id} unchanged since {}, skipping", head.id);
                return Ok(None);
            }
            log::trace!(
                "Document {document_id}: +{} -{} chars",
                delta.inserted_chars(),
                delta.deleted_chars()
            );
            let created_at = now.max(head.created_at.saturating_add(1));
            RevisionRecord::successor(
                document_id,
                new_content.to_owned(),
                to_patch(&delta)?,
                editor_id,
                created_at,
            )
        }
    };

    store.replace_head(chain.head().map(|h| h.id), record.clone())?;
    log::debug!(
        "Committed revision {} of document {document_id} ({} chars, {} patch bytes)",
        record.id,
        record.length,
        record.patch_size()
    );

    if let Err(e) = retention::prune(store, document_id, config.max_revisions) {
        log::warn!("Retention for document {document_id} failed after commit: {e}");
    }

    Ok(Some(record))
}
