//! Index updater worker
//!
//! # State machine
//!
//! ```text
//! Draining ──batch──▶ LockWait ──▶ Committing ──▶ Draining
//!    │                   │
//!    │ empty poll        │ lock timeout: retain batch, retry
//!    ▼                   ▼
//! Idle (poll again)   LockWait
//! or Stopped once the
//! queue is closed and
//! drained
//! ```
//!
//! `Draining` covers the dequeue wait itself, so a worker observed mid-poll
//! reports `Draining`; `Idle` marks a poll that timed out empty.
//!
//! Exactly one worker thread runs for the lifetime of the engine. A batch
//! that cannot be committed because the write lock timed out is retained and
//! retried, never dropped; shutdown drains and commits everything still
//! queued before the worker reaches `Stopped`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use wikisearch_index::{IndexEntry, IndexStore, LockError};

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::lock::{LockCoordinator, RetryPolicy};
use crate::queue::UpdateQueue;

/// Observable worker state, published after each transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    Idle,
    Draining,
    LockWait,
    Committing,
    Stopped,
}

impl WorkerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Draining => "draining",
            WorkerState::LockWait => "lock_wait",
            WorkerState::Committing => "committing",
            WorkerState::Stopped => "stopped",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "idle" => Ok(WorkerState::Idle),
            "draining" => Ok(WorkerState::Draining),
            "lock_wait" => Ok(WorkerState::LockWait),
            "committing" => Ok(WorkerState::Committing),
            "stopped" => Ok(WorkerState::Stopped),
            _ => Err(EngineError::Config(format!("Invalid worker state: {}", s))),
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Draining,
            2 => WorkerState::LockWait,
            3 => WorkerState::Committing,
            _ => WorkerState::Stopped,
        }
    }
}

impl std::fmt::Display for WorkerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

pub struct IndexUpdater;

impl IndexUpdater {
    /// Start the worker thread. It runs until the queue is closed and fully
    /// drained.
    pub fn spawn(
        store: Arc<IndexStore>,
        queue: Arc<UpdateQueue>,
        config: &EngineConfig,
    ) -> UpdaterHandle {
        let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
        let coordinator = LockCoordinator::new(store, RetryPolicy::from(config));

        let worker = Worker {
            queue: queue.clone(),
            coordinator,
            state: state.clone(),
            config: config.clone(),
        };
        let thread = thread::spawn(move || worker.run());

        UpdaterHandle {
            queue,
            state,
            thread: Some(thread),
        }
    }
}

/// Control handle for the running worker.
pub struct UpdaterHandle {
    queue: Arc<UpdateQueue>,
    state: Arc<AtomicU8>,
    thread: Option<JoinHandle<()>>,
}

impl UpdaterHandle {
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Close the queue. The worker drains and commits everything still
    /// queued, then stops. Idempotent.
    pub fn request_stop(&self) {
        self.queue.close();
    }

    /// Block until the worker has reached `Stopped`.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("index updater thread panicked");
            }
        }
    }
}

struct Worker {
    queue: Arc<UpdateQueue>,
    coordinator: LockCoordinator,
    state: Arc<AtomicU8>,
    config: EngineConfig,
}

impl Worker {
    fn publish(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::SeqCst);
    }

    fn run(&self) {
        info!("index updater started");
        let mut retained: Vec<IndexEntry> = Vec::new();

        loop {
            let batch = if retained.is_empty() {
                self.publish(WorkerState::Draining);
                let batch = self
                    .queue
                    .dequeue_batch(self.config.batch_max_items, self.config.batch_max_wait);
                if batch.is_empty() {
                    if self.queue.is_closed() {
                        break;
                    }
                    self.publish(WorkerState::Idle);
                    continue;
                }
                batch
            } else {
                std::mem::take(&mut retained)
            };

            self.publish(WorkerState::LockWait);
            let mut handle = match self.coordinator.acquire() {
                Ok(handle) => handle,
                Err(EngineError::Lock(err @ LockError::Timeout { .. })) => {
                    warn!(
                        "write lock not acquired ({}); retaining batch of {} entries",
                        err,
                        batch.len()
                    );
                    retained = batch;
                    thread::sleep(self.config.idle_poll_interval);
                    continue;
                }
                Err(e) => {
                    error!(
                        "failed to open index writer: {}; retaining batch of {} entries",
                        e,
                        batch.len()
                    );
                    retained = batch;
                    thread::sleep(self.config.idle_poll_interval);
                    continue;
                }
            };

            if let Err(e) = handle.apply(&batch) {
                error!(
                    "failed to apply batch of {} entries: {}; batch dropped",
                    batch.len(),
                    e
                );
                drop(handle);
                continue;
            }

            self.publish(WorkerState::Committing);
            match handle.commit() {
                Ok(()) => debug!("committed batch of {} entries", batch.len()),
                Err(e) => error!(
                    "commit failed for batch of {} entries: {}; changes discarded",
                    batch.len(),
                    e
                ),
            }
        }

        self.publish(WorkerState::Stopped);
        info!("index updater stopped");
    }
}
