//! Engine-level errors.

use crate::patch::PatchError;
use crate::revision::{DocumentId, RevisionId};
use crate::storage::StoreError;

/// Errors surfaced by the history engine.
///
/// An unchanged save is not an error: commits report it as `Ok(None)`.
#[derive(Debug, Clone)]
pub enum HistoryError {
    /// Requested revision does not exist for this document
    RevisionNotFound {
        document_id: DocumentId,
        revision_id: RevisionId,
    },
    /// A stored patch could not be replayed, or the chain shape is broken
    ChainCorrupted {
        document_id: DocumentId,
        at_revision: RevisionId,
        reason: String,
    },
    /// A delta could not be encoded for storage
    Patch(PatchError),
    /// Storage backend failure
    Store(StoreError),
}

impl HistoryError {
    pub(crate) fn corrupted(
        document_id: DocumentId,
        at_revision: RevisionId,
        reason: impl Into<String>,
    ) -> Self {
        HistoryError::ChainCorrupted {
            document_id,
            at_revision,
            reason: reason.into(),
        }
    }

    /// True for the "no such revision" case (404-equivalent).
    pub fn is_not_found(&self) -> bool {
        matches!(self, HistoryError::RevisionNotFound { .. })
    }
}

impl std::fmt::Display for HistoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryError::RevisionNotFound {
                document_id,
                revision_id,
            } => write!(f, "Revision {revision_id} not found for document {document_id}"),
            HistoryError::ChainCorrupted {
                document_id,
                at_revision,
                reason,
            } => write!(
                f,
                "Revision chain of document {document_id} corrupted at {at_revision}: {reason}"
            ),
            HistoryError::Patch(e) => write!(f, "Patch error: {e}"),
            HistoryError::Store(e) => write!(f, "Store error: {e}"),
        }
    }
}

impl std::error::Error for HistoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HistoryError::Patch(e) => Some(e),
            HistoryError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for HistoryError {
    fn from(e: StoreError) -> Self {
        HistoryError::Store(e)
    }
}

impl From<PatchError> for HistoryError {
    fn from(e: PatchError) -> Self {
        HistoryError::Patch(e)
    }
}

pub type Result<T, E = HistoryError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_history_error_display() {
        let doc = Uuid::new_v4();
        let rev = Uuid::new_v4();

        let err = HistoryError::RevisionNotFound {
            document_id: doc,
            revision_id: rev,
        };
        assert!(err.is_not_found());
        assert!(err.to_string().contains("not found"));
        assert!(err.to_string().contains(&rev.to_string()));

        let err = HistoryError::corrupted(doc, rev, "length mismatch");
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("corrupted"));
        assert!(err.to_string().contains("length mismatch"));
    }

    #[test]
    fn test_store_error_converts() {
        let err: HistoryError = StoreError::DatabaseError("disk full".into()).into();
        assert!(matches!(err, HistoryError::Store(_)));
        assert!(std::error::Error::source(&err).is_some());
    }
}
