//! Reconstruction of historical revisions.
//!
//! Starting from the head's full text, the patches of every revision newer
//! than the target are undone in newest-to-oldest order:
//!
//! ```text
//!   ledger:  [0: H, content]  [1: R1, patch p0→1]  [2: R2, patch ...]
//!   text(R1) = reverse(patch(H)).apply(text(H))
//!   text(R2) = reverse(patch(R1)).apply(text(R1))
//! ```
//!
//! Cost is linear in the target's distance from the head.

use crate::error::{HistoryError, Result};
use crate::ledger::Chain;
use crate::patch::from_patch;
use crate::revision::{DocumentId, RevisionId, RevisionRecord};
use crate::storage::RevisionStore;

/// Text of `target` as it was when that revision was committed.
pub fn reconstruct<S: RevisionStore + ?Sized>(
    store: &S,
    document_id: DocumentId,
    target: RevisionId,
) -> Result<String> {
    let chain = Chain::load(store, document_id)?;
    reconstruct_in(&chain, target)
}

/// Reconstruct against an already-loaded chain.
pub(crate) fn reconstruct_in(chain: &Chain, target: RevisionId) -> Result<String> {
    let index = chain.require(target)?;
    let records = chain.records();

    let mut text = chain.head_content().unwrap_or_default().to_owned();
    for newer in &records[..index] {
        text = undo(chain.document_id(), newer, &text)?;
    }

    check_length(chain.document_id(), &records[index], &text)?;
    Ok(text)
}

/// Outcome of a full chain walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainReport {
    pub document_id: DocumentId,
    /// Revisions whose text was reconstructed and checked
    pub revisions_checked: usize,
    pub head: Option<RevisionId>,
    /// True when the oldest surviving revision is the genesis (nothing pruned)
    pub reaches_genesis: bool,
}

/// Walk the whole chain from head to oldest, reconstructing every revision.
///
/// Checks the head invariant, the ordering of `created_at`, every patch and
/// every cached `length`. The first problem found is returned as
/// `ChainCorrupted`.
pub fn verify_chain<S: RevisionStore + ?Sized>(
    store: &S,
    document_id: DocumentId,
) -> Result<ChainReport> {
    let chain = Chain::load(store, document_id)?;
    let records = chain.records();

    let Some(head) = records.first() else {
        return Ok(ChainReport {
            document_id,
            revisions_checked: 0,
            head: None,
            reaches_genesis: false,
        });
    };

    let mut text = chain.head_content().unwrap_or_default().to_owned();
    check_length(document_id, head, &text)?;

    for pair in records.windows(2) {
        let (newer, older) = (&pair[0], &pair[1]);
        if older.content.is_some() {
            return Err(corrupted(document_id, older.id, "content on a non-head revision"));
        }
        if older.created_at >= newer.created_at {
            return Err(corrupted(document_id, older.id, "created_at out of order"));
        }
        text = undo(document_id, newer, &text)?;
        check_length(document_id, older, &text)?;
    }

    log::debug!("Verified {} revisions of document {document_id}", records.len());
    Ok(ChainReport {
        document_id,
        revisions_checked: records.len(),
        head: Some(head.id),
        reaches_genesis: records.last().is_some_and(RevisionRecord::is_genesis),
    })
}

/// Undo `newer`'s patch: turn its text into its predecessor's.
fn undo(document_id: DocumentId, newer: &RevisionRecord, text: &str) -> Result<String> {
    let blob = newer
        .patch_from_previous
        .as_ref()
        .ok_or_else(|| corrupted(document_id, newer.id, "missing patch"))?;
    let delta = from_patch(blob).map_err(|e| corrupted(document_id, newer.id, e.to_string()))?;
    delta
        .reverse()
        .apply(text)
        .map_err(|e| corrupted(document_id, newer.id, e.to_string()))
}

fn check_length(document_id: DocumentId, record: &RevisionRecord, text: &str) -> Result<()> {
    let actual = text.chars().count();
    if actual != record.length {
        return Err(corrupted(
            document_id,
            record.id,
            format!("length {actual} does not match recorded {}", record.length),
        ));
    }
    Ok(())
}

fn corrupted(document_id: DocumentId, at: RevisionId, reason: impl Into<String>) -> HistoryError {
    let err = HistoryError::corrupted(document_id, at, reason);
    log::error!("{err}");
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commit::commit;
    use crate::config::HistoryConfig;
    use crate::patch::{diff, to_patch};
    use crate::storage::MemoryStore;
    use uuid::Uuid;

    const VERSIONS: &[&str] = &[
        "Hello",
        "Hello world",
        "Hello, world!",
        "Goodbye, world!",
        "Goodbye, cruel world!",
        "",
        "Fresh start ✨",
    ];

    fn build(store: &MemoryStore, doc: DocumentId) -> Vec<RevisionId> {
        let config = HistoryConfig::for_testing().with_max_revisions(100);
        VERSIONS
            .iter()
            .enumerate()
            .map(|(i, text)| {
                commit(store, doc, text, None, i as u64 + 1, &config)
                    .unwrap()
                    .unwrap()
                    .id
            })
            .collect()
    }

    #[test]
    fn test_reconstruct_every_revision() {
        let store = MemoryStore::new();
        let doc = Uuid::new_v4();
        let ids = build(&store, doc);

        for (id, expected) in ids.iter().zip(VERSIONS) {
            assert_eq!(reconstruct(&store, doc, *id).unwrap(), *expected);
        }
    }

    #[test]
    fn test_reconstruct_unknown_revision() {
        let store = MemoryStore::new();
        let doc = Uuid::new_v4();
        build(&store, doc);

        let err = reconstruct(&store, doc, Uuid::new_v4()).unwrap_err();
        assert!(err.is_not_found());

        // Revision ids are scoped to their document
        let other = Uuid::new_v4();
        let ids = build(&store, other);
        assert!(reconstruct(&store, doc, ids[0]).unwrap_err().is_not_found());
    }

    #[test]
    fn test_reconstruct_detects_bad_patch() {
        let store = MemoryStore::new();
        let doc = Uuid::new_v4();
        let ids = build(&store, doc);

        // Replace the head's patch with one that ends in unrelated text
        let mut head = store.head(doc).unwrap().unwrap();
        head.patch_from_previous = Some(to_patch(&diff("unrelated", "something else")).unwrap());
        store.overwrite(head.clone()).unwrap();

        let err = reconstruct(&store, doc, ids[0]).unwrap_err();
        match err {
            HistoryError::ChainCorrupted { at_revision, .. } => assert_eq!(at_revision, head.id),
            other => panic!("unexpected error: {other}"),
        }
        // The head itself is still readable
        assert_eq!(reconstruct(&store, doc, head.id).unwrap(), VERSIONS[6]);
    }

    #[test]
    fn test_reconstruct_detects_length_mismatch() {
        let store = MemoryStore::new();
        let doc = Uuid::new_v4();
        let ids = build(&store, doc);

        let mut genesis = store
            .list_by_document(doc)
            .unwrap()
            .pop()
            .unwrap();
        genesis.length += 1;
        store.overwrite(genesis).unwrap();

        let err = reconstruct(&store, doc, ids[0]).unwrap_err();
        assert!(matches!(err, HistoryError::ChainCorrupted { .. }));
    }

    #[test]
    fn test_verify_chain_ok() {
        let store = MemoryStore::new();
        let doc = Uuid::new_v4();
        let ids = build(&store, doc);

        let report = verify_chain(&store, doc).unwrap();
        assert_eq!(report.revisions_checked, VERSIONS.len());
        assert_eq!(report.head, ids.last().copied());
        assert!(report.reaches_genesis);
    }

    #[test]
    fn test_verify_chain_after_pruning() {
        let store = MemoryStore::new();
        let doc = Uuid::new_v4();
        build(&store, doc);
        crate::retention::prune(&store, doc, 3).unwrap();

        let report = verify_chain(&store, doc).unwrap();
        assert_eq!(report.revisions_checked, 3);
        assert!(!report.reaches_genesis);
    }

    #[test]
    fn test_verify_chain_detects_stray_content() {
        let store = MemoryStore::new();
        let doc = Uuid::new_v4();
        build(&store, doc);

        let mut older = store.list_by_document(doc).unwrap().remove(2);
        older.content = Some("leftover".into());
        store.overwrite(older).unwrap();

        assert!(matches!(
            verify_chain(&store, doc),
            Err(HistoryError::ChainCorrupted { .. })
        ));
    }

    #[test]
    fn test_verify_empty_ledger() {
        let store = MemoryStore::new();
        let report = verify_chain(&store, Uuid::new_v4()).unwrap();
        assert_eq!(report.revisions_checked, 0);
        assert!(report.head.is_none());
    }
}
