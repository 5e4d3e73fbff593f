//! RocksDB-backed revision store.
//!
//! Column families:
//! - `revisions`: records keyed by `<document_id:16><created_at:8 BE>`,
//!   so a prefix scan returns a ledger in creation order
//! - `revision_index`: `<revision_id:16>` → key in `revisions`
//!
//! Head content is LZ4-compressed inside the record; patches are already
//! compressed by the codec. Multi-key mutations go through one `WriteBatch`.
//!
//! Reference: Kleppmann, DDIA, Chapter 3 (LSM Trees, SSTables)

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode,
    Direction, IteratorMode, Options, ReadOptions, SingleThreaded, WriteBatch, WriteOptions,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::{RevisionStore, StoreError};
use crate::patch::PatchBlob;
use crate::revision::{DocumentId, EditorId, RevisionId, RevisionRecord, Timestamp};

/// Column family names.
const CF_REVISIONS: &str = "revisions";
const CF_REVISION_INDEX: &str = "revision_index";

/// All column family names for initialization.
const COLUMN_FAMILIES: &[&str] = &[CF_REVISIONS, CF_REVISION_INDEX];

/// Length of a `revisions` key.
const RECORD_KEY_LEN: usize = 24;

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Block cache size in bytes (default: 64MB)
    pub block_cache_size: usize,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: i32,
    /// Enable fsync on every write (default: true)
    pub sync_writes: bool,
    /// Max open files for RocksDB (default: 256)
    pub max_open_files: i32,
    /// Write buffer size per column family (default: 16MB)
    pub write_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("quire_history"),
            block_cache_size: 64 * 1024 * 1024, // 64MB
            bloom_filter_bits: 10,
            sync_writes: true,
            max_open_files: 256,
            write_buffer_size: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl StoreConfig {
    /// Create config for testing (small caches, no fsync).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024, // 8MB
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 64,
            write_buffer_size: 4 * 1024 * 1024, // 4MB
        }
    }
}

/// On-disk shape of a record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRevision {
    id: RevisionId,
    document_id: DocumentId,
    created_at: Timestamp,
    patch: Option<Vec<u8>>,
    /// LZ4-compressed UTF-8 content (head only)
    content: Option<Vec<u8>>,
    length: u64,
    editor_id: Option<EditorId>,
}

impl StoredRevision {
    fn from_record(record: &RevisionRecord) -> Self {
        Self {
            id: record.id,
            document_id: record.document_id,
            created_at: record.created_at,
            patch: record
                .patch_from_previous
                .as_ref()
                .map(|p| p.as_bytes().to_vec()),
            content: record
                .content
                .as_ref()
                .map(|c| lz4_flex::compress_prepend_size(c.as_bytes())),
            length: record.length as u64,
            editor_id: record.editor_id,
        }
    }

    fn into_record(self) -> Result<RevisionRecord, StoreError> {
        let content = match self.content {
            Some(compressed) => {
                let bytes = lz4_flex::decompress_size_prepended(&compressed)
                    .map_err(|e| StoreError::CompressionError(e.to_string()))?;
                Some(
                    String::from_utf8(bytes)
                        .map_err(|e| StoreError::DeserializationError(e.to_string()))?,
                )
            }
            None => None,
        };
        Ok(RevisionRecord {
            id: self.id,
            document_id: self.document_id,
            created_at: self.created_at,
            patch_from_previous: self.patch.map(PatchBlob::from_bytes),
            content,
            length: self.length as usize,
            editor_id: self.editor_id,
        })
    }

    fn encode(&self) -> Result<Vec<u8>, StoreError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| StoreError::SerializationError(e.to_string()))
    }

    fn decode(bytes: &[u8]) -> Result<Self, StoreError> {
        let (stored, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| StoreError::DeserializationError(e.to_string()))?;
        Ok(stored)
    }
}

/// RocksDB-backed revision store.
pub struct RevisionDb {
    /// RocksDB instance (single-threaded mode; callers serialize per document)
    db: DBWithThreadMode<SingleThreaded>,
    config: StoreConfig,
}

impl RevisionDb {
    /// Open the store at the configured path, creating it if missing.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);
        db_opts.set_keep_log_file_num(5);
        db_opts.increase_parallelism(num_cpus());

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name, &config)))
            .collect();

        let db = DBWithThreadMode::<SingleThreaded>::open_cf_descriptors(
            &db_opts,
            &config.path,
            cf_descriptors,
        )?;

        log::info!("Opened revision store at {}", config.path.display());
        Ok(Self { db, config })
    }

    /// Build column-family-specific options.
    fn cf_options(name: &str, config: &StoreConfig) -> Options {
        let mut opts = Options::default();

        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(config.bloom_filter_bits as f64, false);
        block_opts.set_block_size(16 * 1024); // 16KB blocks
        opts.set_block_based_table_factory(&block_opts);
        opts.set_write_buffer_size(config.write_buffer_size);

        match name {
            CF_REVISIONS => {
                // Payloads are already LZ4 framed
                opts.set_compression_type(DBCompressionType::None);
                opts.set_max_write_buffer_number(4);
                opts.set_prefix_extractor(rocksdb::SliceTransform::create_fixed_prefix(16));
            }
            CF_REVISION_INDEX => {
                // Small values, point lookups only
                opts.set_compression_type(DBCompressionType::Lz4);
                opts.set_max_write_buffer_number(2);
                opts.optimize_for_point_lookup(config.block_cache_size as u64);
            }
            _ => {}
        }

        opts
    }

    /// Ids of all documents that have at least one revision.
    pub fn list_documents(&self) -> Result<Vec<DocumentId>, StoreError> {
        let cf = self.cf(CF_REVISIONS)?;
        let mut doc_ids: Vec<DocumentId> = Vec::new();

        for item in self
            .db
            .iterator_cf_opt(&cf, Self::total_order(), IteratorMode::Start)
        {
            let (key, _) = item?;
            if key.len() != RECORD_KEY_LEN {
                continue;
            }
            let id = Self::key_document(&key)?;
            if doc_ids.last() != Some(&id) {
                doc_ids.push(id);
            }
        }

        Ok(doc_ids)
    }

    /// Force a flush of memtables to disk.
    pub fn sync(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    /// Get the database path.
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    // ─── Helpers ──────────────────────────────────────────────────────

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::DatabaseError(format!("Column family '{name}' not found")))
    }

    /// Read options for scans that may cross document prefixes.
    fn total_order() -> ReadOptions {
        let mut read_opts = ReadOptions::default();
        read_opts.set_total_order_seek(true);
        read_opts
    }

    fn write_options(&self) -> WriteOptions {
        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.config.sync_writes);
        write_opts
    }

    /// Build a record key: document_id (16 bytes) + created_at (8 bytes big-endian).
    fn record_key(document_id: DocumentId, created_at: Timestamp) -> Vec<u8> {
        let mut key = Vec::with_capacity(RECORD_KEY_LEN);
        key.extend_from_slice(document_id.as_bytes());
        key.extend_from_slice(&created_at.to_be_bytes());
        key
    }

    fn key_document(key: &[u8]) -> Result<DocumentId, StoreError> {
        let bytes: [u8; 16] = key[..16]
            .try_into()
            .map_err(|_| StoreError::DeserializationError("Invalid UUID key".into()))?;
        Ok(Uuid::from_bytes(bytes))
    }

    /// Resolve a revision id to its `revisions` key.
    fn locate(&self, record_id: RevisionId) -> Result<Option<Vec<u8>>, StoreError> {
        let cf = self.cf(CF_REVISION_INDEX)?;
        Ok(self.db.get_cf(&cf, record_id.as_bytes())?)
    }

    /// Stage an insert into `batch` after checking for conflicts.
    fn stage_insert(
        &self,
        batch: &mut WriteBatch,
        record: &RevisionRecord,
    ) -> Result<(), StoreError> {
        let cf_records = self.cf(CF_REVISIONS)?;
        let cf_index = self.cf(CF_REVISION_INDEX)?;

        if self.locate(record.id)?.is_some() {
            return Err(StoreError::Conflict(format!("revision {} exists", record.id)));
        }
        let key = Self::record_key(record.document_id, record.created_at);
        if self.db.get_cf(&cf_records, &key)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "document {} already has a revision at {}",
                record.document_id, record.created_at
            )));
        }

        batch.put_cf(&cf_records, &key, StoredRevision::from_record(record).encode()?);
        batch.put_cf(&cf_index, record.id.as_bytes(), &key);
        Ok(())
    }

    /// Stage a content-clear of `record_id` into `batch`.
    fn stage_clear(&self, batch: &mut WriteBatch, record_id: RevisionId) -> Result<(), StoreError> {
        let cf_records = self.cf(CF_REVISIONS)?;
        let key = self
            .locate(record_id)?
            .ok_or(StoreError::NotFound(record_id))?;
        let bytes = self
            .db
            .get_cf(&cf_records, &key)?
            .ok_or(StoreError::NotFound(record_id))?;

        let mut stored = StoredRevision::decode(&bytes)?;
        stored.content = None;
        batch.put_cf(&cf_records, &key, stored.encode()?);
        Ok(())
    }
}

impl RevisionStore for RevisionDb {
    fn append(&self, record: RevisionRecord) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        self.stage_insert(&mut batch, &record)?;
        self.db.write_opt(batch, &self.write_options())?;
        Ok(())
    }

    fn list_by_document(&self, document_id: DocumentId) -> Result<Vec<RevisionRecord>, StoreError> {
        let cf = self.cf(CF_REVISIONS)?;
        let start_key = Self::record_key(document_id, 0);

        let mut records = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&start_key, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            // Stop once we've passed this document's key prefix
            if key.len() < RECORD_KEY_LEN || &key[..16] != document_id.as_bytes() {
                break;
            }
            records.push(StoredRevision::decode(&value)?.into_record()?);
        }

        records.reverse();
        Ok(records)
    }

    fn clear_content(&self, record_id: RevisionId) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        self.stage_clear(&mut batch, record_id)?;
        self.db.write_opt(batch, &self.write_options())?;
        Ok(())
    }

    fn delete_many(&self, record_ids: &[RevisionId]) -> Result<usize, StoreError> {
        let cf_records = self.cf(CF_REVISIONS)?;
        let cf_index = self.cf(CF_REVISION_INDEX)?;

        let mut batch = WriteBatch::default();
        let mut count = 0usize;
        for id in record_ids {
            if let Some(key) = self.locate(*id)? {
                batch.delete_cf(&cf_records, &key);
                batch.delete_cf(&cf_index, id.as_bytes());
                count += 1;
            }
        }

        if count > 0 {
            self.db.write_opt(batch, &self.write_options())?;
        }
        Ok(count)
    }

    fn head(&self, document_id: DocumentId) -> Result<Option<RevisionRecord>, StoreError> {
        let cf = self.cf(CF_REVISIONS)?;
        let end_key = Self::record_key(document_id, Timestamp::MAX);

        let mut iter = self.db.iterator_cf_opt(
            &cf,
            Self::total_order(),
            IteratorMode::From(&end_key, Direction::Reverse),
        );
        match iter.next() {
            Some(item) => {
                let (key, value) = item?;
                if key.len() < RECORD_KEY_LEN || &key[..16] != document_id.as_bytes() {
                    return Ok(None);
                }
                Ok(Some(StoredRevision::decode(&value)?.into_record()?))
            }
            None => Ok(None),
        }
    }

    fn replace_head(
        &self,
        demote: Option<RevisionId>,
        record: RevisionRecord,
    ) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        if let Some(id) = demote {
            self.stage_clear(&mut batch, id)?;
        }
        self.stage_insert(&mut batch, &record)?;
        // Demotion and new head land together or not at all
        self.db.write_opt(batch, &self.write_options())?;
        Ok(())
    }
}

/// Get number of CPU cores for RocksDB parallelism.
fn num_cpus() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}
