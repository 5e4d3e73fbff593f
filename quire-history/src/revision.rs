//! Revision records and the identifiers they carry.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

use crate::patch::PatchBlob;

pub type DocumentId = Uuid;
pub type RevisionId = Uuid;
pub type EditorId = Uuid;

/// Milliseconds since the Unix epoch.
pub type Timestamp = u64;

/// Current wall-clock time as a [`Timestamp`].
pub fn now_millis() -> Timestamp {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as Timestamp
}

/// One entry in a document's revision ledger.
///
/// Only the head carries `content`. Every other revision is recovered by
/// undoing the patches of the revisions newer than it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionRecord {
    pub id: RevisionId,
    pub document_id: DocumentId,
    /// Strictly increasing per document; defines ledger order
    pub created_at: Timestamp,
    /// Delta from the previous revision's text to this one's.
    /// `None` only on the genesis revision.
    pub patch_from_previous: Option<PatchBlob>,
    /// Full text, present on the head only
    pub content: Option<String>,
    /// Text length in characters
    pub length: usize,
    pub editor_id: Option<EditorId>,
}

impl RevisionRecord {
    /// First revision of a document: full content, no patch.
    pub fn genesis(
        document_id: DocumentId,
        content: String,
        editor_id: Option<EditorId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            created_at,
            patch_from_previous: None,
            length: content.chars().count(),
            content: Some(content),
            editor_id,
        }
    }

    /// New head following an existing one.
    pub fn successor(
        document_id: DocumentId,
        content: String,
        patch_from_previous: PatchBlob,
        editor_id: Option<EditorId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            document_id,
            created_at,
            patch_from_previous: Some(patch_from_previous),
            length: content.chars().count(),
            content: Some(content),
            editor_id,
        }
    }

    pub fn is_head(&self) -> bool {
        self.content.is_some()
    }

    pub fn is_genesis(&self) -> bool {
        self.patch_from_previous.is_none()
    }

    /// Size of the stored patch in bytes (0 for genesis).
    pub fn patch_size(&self) -> usize {
        self.patch_from_previous.as_ref().map_or(0, PatchBlob::len)
    }

    /// Metadata-only view for listings.
    pub fn summary(&self) -> RevisionSummary {
        RevisionSummary {
            id: self.id,
            length: self.length,
            created_at: self.created_at,
            editor_id: self.editor_id,
        }
    }
}

/// Revision metadata returned by listings (no text).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionSummary {
    pub id: RevisionId,
    pub length: usize,
    pub created_at: Timestamp,
    pub editor_id: Option<EditorId>,
}

/// A revision together with its reconstructed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionDetail {
    pub id: RevisionId,
    pub content: String,
    pub length: usize,
    pub created_at: Timestamp,
    pub editor_id: Option<EditorId>,
}
