/*
 * Wikisearch Engine - incremental index maintenance
 *
 * Keeps a tantivy-backed wiki search index continuously synchronized with
 * document changes:
 * - Bounded update queue decoupling producers from index commits
 * - Single updater worker thread batching entries into atomic commits
 * - Full rebuild sessions that clear and repopulate through the same queue
 * - Write-lock coordination with bounded exponential backoff
 */

pub mod config;
pub mod engine;
pub mod error;
pub mod lock;
pub mod queue;
pub mod rebuild;
pub mod updater;

pub use config::EngineConfig;
pub use engine::IndexEngine;
pub use error::{EngineError, EnumerationError, QueueError, RebuildError, Result};
pub use lock::{LockCoordinator, RetryPolicy};
pub use queue::UpdateQueue;
pub use rebuild::{DocumentEnumerator, IndexRebuilder, RebuildHandle, RebuildProgress};
pub use updater::{IndexUpdater, UpdaterHandle, WorkerState};

// Re-exported storage types so hosts depend on one crate.
pub use wikisearch_index::{
    DocumentFields, FieldValue, IndexEntry, IndexStore, LockError, ReadHandle, SearchHit,
};
