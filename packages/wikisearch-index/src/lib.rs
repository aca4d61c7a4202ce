/*
 * Wikisearch Index - durable inverted-index storage
 *
 * Tantivy-backed storage layer for the wikisearch engine:
 * - Wiki page schema (doc_id keyed, replace-by-id upserts)
 * - Exclusive write handles guarded by the index writer lock file
 * - Snapshot readers that always observe the last committed state
 */

pub mod entry;
pub mod error;
pub mod schema;
pub mod store;

pub use entry::{DocumentFields, FieldValue, IndexEntry};
pub use error::{IndexStoreError, LockError, Result};
pub use schema::{build_schema, FieldKind, SchemaFields};
pub use store::{IndexStore, ReadHandle, SearchHit, WriteHandle};
