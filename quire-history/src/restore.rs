//! Restore engine: bring back an old revision as a new head.
//!
//! Restoring never rewrites history. The reconstructed text is committed on
//! top of the ledger like any other edit, so the restore itself can be undone
//! by restoring the revision before it.

use crate::commit::commit;
use crate::config::HistoryConfig;
use crate::error::Result;
use crate::ledger::Chain;
use crate::reconstruct::reconstruct_in;
use crate::revision::{DocumentId, EditorId, RevisionId, Timestamp};
use crate::storage::RevisionStore;

/// Restore `target` and return its text.
///
/// `current_text` is the document's live content. When it differs from the
/// head (edits saved since the last checkpoint), it is committed first so
/// the patch chain stays gap-free. The restored text is then committed as the
/// new head. If it already equals the head, no revision is added.
pub fn restore<S: RevisionStore + ?Sized>(
    store: &S,
    document_id: DocumentId,
    target: RevisionId,
    current_text: &str,
    editor_id: Option<EditorId>,
    now: Timestamp,
    config: &HistoryConfig,
) -> Result<String> {
    let chain = Chain::load(store, document_id)?;
    let restored = reconstruct_in(&chain, target)?;

    if chain.head_content() != Some(current_text) {
        if let Some(saved) = commit(store, document_id, current_text, editor_id, now, config)? {
            log::debug!(
                "Checkpointed unsaved edits of document {document_id} as {} before restore",
                saved.id
            );
        }
    }

    match commit(store, document_id, &restored, editor_id, now, config)? {
        Some(head) => log::info!(
            "Restored document {document_id} to revision {target} as {}",
            head.id
        ),
        None => log::debug!("Document {document_id} already matches revision {target}"),
    }

    Ok(restored)
}
