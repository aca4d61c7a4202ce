use thiserror::Error;

use wikisearch_index::{IndexStoreError, LockError};

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("Store error: {0}")]
    Store(#[from] IndexStoreError),

    #[error("Rebuild error: {0}")]
    Rebuild(#[from] RebuildError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures of the bounded update queue.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("the update queue is closed")]
    Closed,
}

/// Failures of a rebuild request. Both are returned synchronously from
/// `start_rebuild`; once a `RebuildHandle` exists the session only ever
/// finishes or is cancelled.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildError {
    #[error("a rebuild session is already in progress")]
    AlreadyRunning,

    #[error("could not acquire the write lock for the clear phase: {0}")]
    LockTimeout(LockError),
}

/// Per-document enumeration failure. These are logged and skipped by the
/// rebuild loop; they never abort the session.
#[derive(Error, Debug, Clone)]
#[error("failed to enumerate document {doc_id}: {detail}")]
pub struct EnumerationError {
    pub doc_id: String,
    pub detail: String,
}
