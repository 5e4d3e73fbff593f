//! # quire-history: revision history for auto-saved text documents
//!
//! Keeps a bounded, per-document ledger of revisions without storing a full
//! copy on every save. Only the newest revision (the head) holds full text;
//! every other revision holds the patch that produced it from its
//! predecessor, and older texts are rebuilt by undoing patches backwards
//! from the head.
//!
//! ## Architecture
//!
//! ```text
//!   save(text)
//!       │
//!       ▼
//! ┌──────────────────┐  due?   ┌──────────────┐  diff   ┌──────────────┐
//! │ RevisionHistory  │ ──────► │ Checkpoint   │ ──────► │ Commit       │
//! │ (per-doc locks)  │         │ Policy       │         │ Engine       │
//! └────────┬─────────┘         └──────────────┘         └──────┬───────┘
//!          │ read                                              │ replace_head
//!          ▼                                                   ▼
//! ┌──────────────────┐  list_by_document         ┌──────────────────────┐
//! │ Reconstruct /    │ ◄──────────────────────── │ RevisionStore        │
//! │ Restore          │                           │ (memory | RocksDB)   │
//! └──────────────────┘                           └──────────┬───────────┘
//!                                                           │ delete_many
//!                                                   ┌───────┴───────┐
//!                                                   │ Retention     │
//!                                                   └───────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`patch`]: Reversible character-level deltas and their LZ4 blobs
//! - [`revision`]: Revision records, summaries, identifiers
//! - [`ledger`]: Validated newest-first view of a document's revisions
//! - [`policy`]: Idle / force autosave thresholds
//! - [`commit`]: Diff against the head, demote it, append the new head
//! - [`reconstruct`]: Rebuild any revision's text; full-chain verification
//! - [`restore`]: Re-commit an old revision as the new head
//! - [`retention`]: Cap revisions per document
//! - [`storage`]: Store trait with in-memory and RocksDB backends
//! - [`history`]: The async, lock-guarded API used by applications

pub mod commit;
pub mod config;
pub mod error;
pub mod history;
pub mod ledger;
pub mod patch;
pub mod policy;
pub mod reconstruct;
pub mod restore;
pub mod retention;
pub mod revision;
pub mod storage;

// Re-exports for convenience
pub use commit::commit;
pub use config::HistoryConfig;
pub use error::{HistoryError, Result};
pub use history::{Document, DocumentLocks, RevisionHistory};
pub use ledger::{Chain, LedgerStats};
pub use patch::{diff, from_patch, to_patch, Delta, Edit, PatchBlob, PatchError};
pub use policy::{should_checkpoint, CheckpointPolicy};
pub use reconstruct::{reconstruct, verify_chain, ChainReport};
pub use restore::restore;
pub use retention::prune;
pub use revision::{
    now_millis, DocumentId, EditorId, RevisionDetail, RevisionId, RevisionRecord,
    RevisionSummary, Timestamp,
};
pub use storage::{MemoryStore, RevisionDb, RevisionStore, StoreConfig, StoreError};
