//! Document-facing history API.
//!
//! [`RevisionHistory`] is what the surrounding application talks to. It owns
//! the store handle, the configuration and a per-document lock table, and
//! wires the autosave policy into the commit path.
//!
//! Locking:
//! ```text
//!   consider_checkpoint / checkpoint_now / restore / purge  → write lock
//!   list_revisions / get_revision* / verify_chain / stats   → read lock
//! ```
//! Locks are per document; operations on different documents never wait on
//! each other. A document's lock entry is dropped again once no operation
//! holds it.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::commit::commit;
use crate::config::HistoryConfig;
use crate::error::Result;
use crate::ledger::{Chain, LedgerStats};
use crate::reconstruct::{self, reconstruct_in, ChainReport};
use crate::restore::restore;
use crate::revision::{
    now_millis, DocumentId, EditorId, RevisionDetail, RevisionId, RevisionRecord,
    RevisionSummary, Timestamp,
};
use crate::storage::RevisionStore;

/// The live state of a document, owned by the caller.
///
/// `content` is the latest saved text, which may be ahead of the newest
/// revision when saves were not checkpointed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub id: DocumentId,
    pub content: String,
    /// `None` until the first save
    pub last_edited_at: Option<Timestamp>,
    /// `None` until the first checkpoint
    pub last_checkpoint_at: Option<Timestamp>,
}

impl Document {
    pub fn new(id: DocumentId, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
            last_edited_at: None,
            last_checkpoint_at: None,
        }
    }
}

/// Per-document reader/writer locks, created on first use.
#[derive(Default)]
pub struct DocumentLocks {
    locks: RwLock<HashMap<DocumentId, Arc<RwLock<()>>>>,
}

impl DocumentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for a document.
    pub async fn get(&self, document_id: DocumentId) -> Arc<RwLock<()>> {
        // Fast path: read lock
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(&document_id) {
                return lock.clone();
            }
        }

        // Slow path: write lock to create
        let mut locks = self.locks.write().await;
        // Double-check after acquiring write lock
        if let Some(lock) = locks.get(&document_id) {
            return lock.clone();
        }

        let lock = Arc::new(RwLock::new(()));
        locks.insert(document_id, lock.clone());
        lock
    }

    /// Drop a document's lock if nobody else holds a handle to it.
    pub async fn remove_if_idle(&self, document_id: &DocumentId) -> bool {
        let mut locks = self.locks.write().await;
        if let Some(lock) = locks.get(document_id) {
            if Arc::strong_count(lock) == 1 {
                locks.remove(document_id);
                return true;
            }
        }
        false
    }

    /// Number of documents with a lock entry.
    pub async fn len(&self) -> usize {
        self.locks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.locks.read().await.is_empty()
    }
}

/// Revision history over a [`RevisionStore`].
pub struct RevisionHistory<S> {
    store: Arc<S>,
    config: HistoryConfig,
    locks: DocumentLocks,
}

impl<S: RevisionStore> RevisionHistory<S> {
    pub fn new(store: Arc<S>, config: HistoryConfig) -> Self {
        Self {
            store,
            config,
            locks: DocumentLocks::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Run `f` under the document's read lock.
    async fn read<T>(
        &self,
        document_id: DocumentId,
        f: impl FnOnce(&S) -> Result<T>,
    ) -> Result<T> {
        let result = {
            let lock = self.locks.get(document_id).await;
            let _guard = lock.read().await;
            f(&*self.store)
        };
        self.locks.remove_if_idle(&document_id).await;
        result
    }

    /// Run `f` under the document's write lock.
    async fn write<T>(
        &self,
        document_id: DocumentId,
        f: impl FnOnce(&S) -> Result<T>,
    ) -> Result<T> {
        let result = {
            let lock = self.locks.get(document_id).await;
            let _guard = lock.write().await;
            f(&*self.store)
        };
        self.locks.remove_if_idle(&document_id).await;
        result
    }

    /// Save `new_content` and record a revision if the autosave policy says so.
    pub async fn consider_checkpoint(
        &self,
        document: &mut Document,
        new_content: &str,
        editor_id: Option<EditorId>,
    ) -> Result<Option<RevisionRecord>> {
        self.consider_checkpoint_at(document, new_content, editor_id, now_millis())
            .await
    }

    /// [`consider_checkpoint`](Self::consider_checkpoint) at an explicit time.
    ///
    /// The policy sees the document's pre-save `last_edited_at`. On success
    /// the document takes the new content and `last_edited_at = Some(now)`;
    /// `last_checkpoint_at` moves only when the commit engine ran. On error
    /// the document is left untouched.
    pub async fn consider_checkpoint_at(
        &self,
        document: &mut Document,
        new_content: &str,
        editor_id: Option<EditorId>,
        now: Timestamp,
    ) -> Result<Option<RevisionRecord>> {
        let document_id = document.id;
        self.write(document_id, |store| {
            let due = self.config.policy.should_checkpoint(
                document.last_edited_at,
                document.last_checkpoint_at,
                now,
            );

            let committed = if due {
                let committed =
                    commit(store, document_id, new_content, editor_id, now, &self.config)?;
                document.last_checkpoint_at = Some(now);
                committed
            } else {
                log::trace!("Save of document {document_id} not due for a checkpoint");
                None
            };

            document.content = new_content.to_owned();
            document.last_edited_at = Some(now);
            Ok(committed)
        })
        .await
    }

    /// Record the document's current content now, bypassing the policy.
    pub async fn checkpoint_now(
        &self,
        document: &mut Document,
        editor_id: Option<EditorId>,
    ) -> Result<Option<RevisionRecord>> {
        self.checkpoint_now_at(document, editor_id, now_millis()).await
    }

    pub async fn checkpoint_now_at(
        &self,
        document: &mut Document,
        editor_id: Option<EditorId>,
        now: Timestamp,
    ) -> Result<Option<RevisionRecord>> {
        self.write(document.id, |store| {
            let committed = commit(
                store,
                document.id,
                &document.content,
                editor_id,
                now,
                &self.config,
            )?;
            document.last_checkpoint_at = Some(now);
            Ok(committed)
        })
        .await
    }

    /// Revision metadata, newest first.
    pub async fn list_revisions(&self, document_id: DocumentId) -> Result<Vec<RevisionSummary>> {
        self.read(document_id, |store| Ok(Chain::load(store, document_id)?.summaries()))
            .await
    }

    /// Full text of a revision.
    pub async fn get_revision_content(
        &self,
        document_id: DocumentId,
        revision_id: RevisionId,
    ) -> Result<String> {
        self.read(document_id, |store| {
            reconstruct::reconstruct(store, document_id, revision_id)
        })
        .await
    }

    /// Metadata and full text of a revision.
    pub async fn get_revision(
        &self,
        document_id: DocumentId,
        revision_id: RevisionId,
    ) -> Result<RevisionDetail> {
        self.read(document_id, |store| {
            let chain = Chain::load(store, document_id)?;
            let content = reconstruct_in(&chain, revision_id)?;
            let record = &chain.records()[chain.require(revision_id)?];
            Ok(RevisionDetail {
                id: record.id,
                content,
                length: record.length,
                created_at: record.created_at,
                editor_id: record.editor_id,
            })
        })
        .await
    }

    /// Restore a revision and write its text back into `document`.
    pub async fn restore_to_revision(
        &self,
        document: &mut Document,
        revision_id: RevisionId,
        editor_id: Option<EditorId>,
    ) -> Result<String> {
        self.restore_to_revision_at(document, revision_id, editor_id, now_millis())
            .await
    }

    pub async fn restore_to_revision_at(
        &self,
        document: &mut Document,
        revision_id: RevisionId,
        editor_id: Option<EditorId>,
        now: Timestamp,
    ) -> Result<String> {
        self.write(document.id, |store| {
            let restored = restore(
                store,
                document.id,
                revision_id,
                &document.content,
                editor_id,
                now,
                &self.config,
            )?;

            document.content = restored.clone();
            document.last_edited_at = Some(now);
            document.last_checkpoint_at = Some(now);
            Ok(restored)
        })
        .await
    }

    /// Reconstruct and check every revision of a document.
    pub async fn verify_chain(&self, document_id: DocumentId) -> Result<ChainReport> {
        self.read(document_id, |store| reconstruct::verify_chain(store, document_id))
            .await
    }

    pub async fn stats(&self, document_id: DocumentId) -> Result<LedgerStats> {
        self.read(document_id, |store| Ok(Chain::load(store, document_id)?.stats()))
            .await
    }

    /// Delete a document's entire ledger. Returns the number of revisions removed.
    pub async fn purge_document(&self, document_id: DocumentId) -> Result<usize> {
        let removed = self
            .write(document_id, |store| Ok(store.purge_document(document_id)?))
            .await?;

        log::info!("Purged {removed} revisions of document {document_id}");
        Ok(removed)
    }
}
