//! Engine configuration
//!
//! Plain struct with defaults suitable for an interactive wiki: batches stay
//! small enough that index staleness is bounded by `batch_max_wait`, and the
//! bounded queue applies backpressure to producers instead of growing without
//! limit during bulk operations.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum entries applied per commit.
    pub batch_max_items: usize,

    /// Maximum time a batch stays open once its first entry has arrived.
    /// Also bounds how long the worker blocks waiting for work.
    pub batch_max_wait: Duration,

    /// Queue capacity; `enqueue` blocks when the queue is full.
    pub queue_capacity: usize,

    /// Write-lock retries before `LockError::Timeout` is surfaced.
    pub lock_retry_max_attempts: u32,

    /// First retry delay; doubles per attempt, capped.
    pub lock_retry_backoff_base: Duration,

    /// Pause before the worker retries a cycle that failed (retained batch
    /// after a lock timeout, or a store error while opening the writer).
    pub idle_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_max_items: 1000,
            batch_max_wait: Duration::from_millis(500),
            queue_capacity: 2000,
            lock_retry_max_attempts: 8,
            lock_retry_backoff_base: Duration::from_millis(50),
            idle_poll_interval: Duration::from_millis(250),
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.batch_max_items == 0 {
            return Err(EngineError::Config(
                "batch_max_items must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(EngineError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.lock_retry_max_attempts == 0 {
            return Err(EngineError::Config(
                "lock_retry_max_attempts must be at least 1".to_string(),
            ));
        }
        if self.batch_max_wait.is_zero() {
            return Err(EngineError::Config(
                "batch_max_wait must be non-zero".to_string(),
            ));
        }
        if self.idle_poll_interval.is_zero() {
            return Err(EngineError::Config(
                "idle_poll_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
