//! Index store
//!
//! # Architecture
//!
//! ```text
//! IndexEntry batch → WriteHandle.apply() → IndexWriter → commit → segments
//!                                                          ↓
//!                                    ReadHandle (last committed snapshot)
//! ```
//!
//! At most one live `WriteHandle` exists at any instant: the handle owns the
//! tantivy `IndexWriter`, and tantivy's writer lock file enforces exclusion
//! both in-process and across processes. Readers never block writers and only
//! observe the index state as of the last successful commit.

use std::path::{Path, PathBuf};

use tantivy::collector::TopDocs;
use tantivy::directory::INDEX_WRITER_LOCK;
use tantivy::query::QueryParser;
use tantivy::schema::Value;
use tantivy::{
    Directory, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, TantivyError, Term,
};
use tracing::{debug, warn};

use crate::entry::{DocumentFields, FieldValue, IndexEntry};
use crate::error::{IndexStoreError, LockError, Result};
use crate::schema::{FieldKind, SchemaFields};

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Durable (or in-memory, for tests) inverted-index storage.
pub struct IndexStore {
    index: Index,
    fields: SchemaFields,
    path: Option<PathBuf>,
    created: bool,
}

impl IndexStore {
    /// Open (or create) an on-disk store at `path`.
    ///
    /// An existing index whose files cannot be read, or whose stored schema
    /// does not match this build, is a fatal `Corrupted` condition surfaced
    /// to the operator; there is no automatic repair.
    pub fn open_in_dir(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;

        let (index, created) = if path.join("meta.json").exists() {
            let index = Index::open_in_dir(path).map_err(|e| IndexStoreError::Corrupted {
                path: path.to_path_buf(),
                detail: e.to_string(),
            })?;
            (index, false)
        } else {
            let index = Index::create_in_dir(path, crate::schema::build_schema())?;
            (index, true)
        };

        let fields = SchemaFields::for_schema(index.schema()).map_err(|detail| {
            IndexStoreError::Corrupted {
                path: path.to_path_buf(),
                detail,
            }
        })?;

        debug!(
            "opened index store at {} (created={})",
            path.display(),
            created
        );

        Ok(Self {
            index,
            fields,
            path: Some(path.to_path_buf()),
            created,
        })
    }

    /// Create a volatile in-memory store. Used by tests; the writer lock is
    /// still enforced (in memory) so locking behavior matches the on-disk
    /// store.
    pub fn open_in_ram() -> Self {
        let index = Index::create_in_ram(crate::schema::build_schema());
        let fields = SchemaFields::for_schema(index.schema()).expect("built-in schema");
        Self {
            index,
            fields,
            path: None,
            created: true,
        }
    }

    /// Attempt to acquire the exclusive write lock without blocking.
    ///
    /// Fails with `LockError::Held` when another writer (this process or
    /// another) holds the lock. Blocking acquisition with bounded backoff is
    /// the caller's concern (see the engine's `LockCoordinator`).
    pub fn try_writer(&self) -> Result<WriteHandle> {
        let writer: IndexWriter = match self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES) {
            Ok(writer) => writer,
            Err(TantivyError::LockFailure(_, _)) => return Err(LockError::Held.into()),
            Err(e) => return Err(e.into()),
        };

        Ok(WriteHandle {
            writer: Some(writer),
            fields: self.fields.clone(),
            pending: 0,
        })
    }

    /// Open a read handle over the last committed state. Always succeeds
    /// while the store is healthy, including concurrently with a writer.
    pub fn open_reader(&self) -> Result<ReadHandle> {
        let reader = self
            .index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(ReadHandle {
            index: self.index.clone(),
            reader,
            fields: self.fields.clone(),
        })
    }

    /// Non-blocking probe of the writer lock, for diagnostics and tests
    /// only. The probe works by momentarily acquiring and releasing the
    /// lock, so a `try_writer` racing it can transiently observe
    /// `LockError::Held`; callers on the write path retry through the
    /// coordinator instead of consulting this.
    pub fn is_locked(&self) -> bool {
        match self.index.directory().acquire_lock(&INDEX_WRITER_LOCK) {
            Ok(guard) => {
                drop(guard);
                false
            }
            Err(_) => true,
        }
    }

    /// True when this store was freshly created rather than opened from
    /// existing index files.
    pub fn was_created(&self) -> bool {
        self.created
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn schema_fields(&self) -> &SchemaFields {
        &self.fields
    }
}

/// Exclusive write session over the store.
///
/// Changes become visible only after `commit()`. Dropping the handle without
/// committing discards every applied operation and releases the lock.
pub struct WriteHandle {
    writer: Option<IndexWriter>,
    fields: SchemaFields,
    pending: usize,
}

impl std::fmt::Debug for WriteHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteHandle")
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}

impl WriteHandle {
    /// Apply a batch of entries to the in-progress session.
    ///
    /// Upserts use replace-by-id semantics (delete any existing document
    /// with the same id, then add); deletes are idempotent no-ops when the
    /// id is absent.
    pub fn apply(&mut self, entries: &[IndexEntry]) -> Result<()> {
        let writer = self.writer.as_mut().expect("write handle already committed");

        for entry in entries {
            let id_term = Term::from_field_text(self.fields.doc_id, entry.doc_id());
            match entry {
                IndexEntry::Upsert { doc_id, fields } => {
                    writer.delete_term(id_term);
                    let doc = build_document(&self.fields, doc_id, fields);
                    writer.add_document(doc)?;
                }
                IndexEntry::Delete { .. } => {
                    writer.delete_term(id_term);
                }
            }
            self.pending += 1;
        }

        Ok(())
    }

    /// Remove every document from the store. Used exclusively by the
    /// rebuild clear phase; takes effect at the next `commit()`.
    pub fn clear_all(&mut self) -> Result<()> {
        let writer = self.writer.as_mut().expect("write handle already committed");
        writer.delete_all_documents()?;
        self.pending += 1;
        Ok(())
    }

    /// Flush and make all applied changes atomically visible to new read
    /// handles, then release the write lock.
    pub fn commit(mut self) -> Result<()> {
        let mut writer = self.writer.take().expect("write handle already committed");
        writer.commit()?;
        debug!("committed {} index operations", self.pending);
        Ok(())
    }

    /// Number of operations applied to this session so far.
    pub fn pending_ops(&self) -> usize {
        self.pending
    }
}

impl Drop for WriteHandle {
    fn drop(&mut self) {
        // Rollback-on-drop: dropping the tantivy writer discards uncommitted
        // operations and releases the lock file.
        if let Some(writer) = self.writer.take() {
            if self.pending > 0 {
                warn!(
                    "write handle dropped with {} uncommitted operations; changes discarded",
                    self.pending
                );
            }
            drop(writer);
        }
    }
}

fn build_document(
    fields: &SchemaFields,
    doc_id: &str,
    doc_fields: &DocumentFields,
) -> TantivyDocument {
    let mut doc = TantivyDocument::new();
    doc.add_text(fields.doc_id, doc_id);

    for (name, value) in doc_fields {
        let Some((field, kind)) = fields.writable_field(name) else {
            warn!("skipping unknown index field '{}' on document {}", name, doc_id);
            continue;
        };

        match (kind, value) {
            (FieldKind::Text | FieldKind::Keyword, FieldValue::Text(v) | FieldValue::Keyword(v)) => {
                doc.add_text(field, v);
            }
            (FieldKind::Date, FieldValue::Date(v)) => {
                doc.add_date(field, tantivy::DateTime::from_timestamp_micros(v.timestamp_micros()));
            }
            _ => {
                warn!(
                    "skipping field '{}' on document {}: value kind does not match schema",
                    name, doc_id
                );
            }
        }
    }

    doc.add_date(
        fields.indexed_at,
        tantivy::DateTime::from_timestamp_micros(chrono::Utc::now().timestamp_micros()),
    );

    doc
}

/// A search result hit.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub title: String,
    pub score: f64,
}

/// Read handle reflecting the last committed state of the store.
pub struct ReadHandle {
    index: Index,
    reader: IndexReader,
    fields: SchemaFields,
}

impl ReadHandle {
    /// BM25 search over title and content.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.reader.reload()?;
        let searcher = self.reader.searcher();

        let parser = QueryParser::for_index(&self.index, self.fields.default_search_fields());
        let parsed = parser
            .parse_query(query)
            .map_err(|e| IndexStoreError::Query {
                query: query.to_string(),
                detail: e.to_string(),
            })?;

        let top_docs = searcher.search(&parsed, &TopDocs::with_limit(limit.max(1)))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, doc_address) in top_docs {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let doc_id = doc
                .get_first(self.fields.doc_id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let title = doc
                .get_first(self.fields.title)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            hits.push(SearchHit {
                doc_id,
                title,
                score: f64::from(score),
            });
        }

        Ok(hits)
    }

    /// Number of committed documents.
    pub fn doc_count(&self) -> Result<u64> {
        self.reader.reload()?;
        Ok(self.reader.searcher().num_docs())
    }
}
