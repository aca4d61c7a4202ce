use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexStoreError>;

#[derive(Error, Debug)]
pub enum IndexStoreError {
    #[error("Index error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Index at {path} is corrupted or unreadable: {detail}")]
    Corrupted { path: PathBuf, detail: String },

    #[error("Invalid query \"{query}\": {detail}")]
    Query { query: String, detail: String },

    #[error("Lock error: {0}")]
    Lock(#[from] LockError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Write-lock acquisition failures.
///
/// `Held` is the non-blocking outcome and is retried by the caller;
/// `Timeout` means bounded retries were exhausted and is surfaced to the
/// operator, never silently swallowed.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    #[error("the index write lock is held by another writer")]
    Held,

    #[error("gave up acquiring the index write lock after {attempts} attempts ({waited_ms} ms)")]
    Timeout { attempts: u32, waited_ms: u64 },
}
