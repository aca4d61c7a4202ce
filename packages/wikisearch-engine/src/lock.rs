//! Write-lock coordination
//!
//! The store's `try_writer` is non-blocking; this module adds the blocking
//! flavor used by the updater and the rebuild clear phase: retry with
//! exponential backoff up to a bounded number of attempts, then surface
//! `LockError::Timeout` to the caller. A lock that never frees (e.g. a stale
//! lock file left by a crashed process) is reported, never broken.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use wikisearch_index::{IndexStore, IndexStoreError, LockError, WriteHandle};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Upper bound on a single backoff step.
const MAX_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (0-based): base doubled
    /// per attempt, capped at `MAX_BACKOFF`.
    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl From<&EngineConfig> for RetryPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.lock_retry_max_attempts,
            backoff_base: config.lock_retry_backoff_base,
        }
    }
}

pub struct LockCoordinator {
    store: Arc<IndexStore>,
    policy: RetryPolicy,
}

impl LockCoordinator {
    pub fn new(store: Arc<IndexStore>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Acquire the exclusive write lock, retrying while it is held elsewhere.
    ///
    /// Non-lock store failures are returned on the first occurrence; only
    /// `LockError::Held` is retried.
    pub fn acquire(&self) -> Result<WriteHandle> {
        let mut waited_ms: u64 = 0;

        for attempt in 0..self.policy.max_attempts {
            match self.store.try_writer() {
                Ok(handle) => {
                    if attempt > 0 {
                        debug!(
                            "acquired index write lock after {} attempts ({} ms waited)",
                            attempt + 1,
                            waited_ms
                        );
                    }
                    return Ok(handle);
                }
                Err(IndexStoreError::Lock(LockError::Held)) => {
                    if attempt + 1 == self.policy.max_attempts {
                        break;
                    }
                    let backoff = self.policy.backoff_for_attempt(attempt);
                    debug!(
                        "index write lock held; retrying in {} ms (attempt {}/{})",
                        backoff.as_millis(),
                        attempt + 1,
                        self.policy.max_attempts
                    );
                    thread::sleep(backoff);
                    waited_ms += backoff.as_millis() as u64;
                }
                Err(e) => return Err(EngineError::Store(e)),
            }
        }

        Err(EngineError::Lock(LockError::Timeout {
            attempts: self.policy.max_attempts,
            waited_ms,
        }))
    }

    pub fn is_locked(&self) -> bool {
        self.store.is_locked()
    }
}
