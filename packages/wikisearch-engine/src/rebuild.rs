//! Full index rebuild
//!
//! A rebuild runs in two phases:
//!
//! 1. Clear: acquire the write lock directly, `clear_all()`, commit, release.
//!    The commit is atomic, so readers switch from the old index to an empty
//!    one and never observe a half-cleared state. A lock timeout here aborts
//!    the whole rebuild with the prior committed state intact.
//! 2. Enumerate: stream every document from the supplied enumerator and
//!    enqueue an upsert through the ordinary update queue. Writer exclusivity
//!    during repopulation is enforced by the same store lock as incremental
//!    updates, not by rebuild-specific coordination.
//!
//! At most one session runs at a time. "Done" means fully enumerated and
//! enqueued; commit of the final batch is observed by watching the queue
//! drain (or by shutting the engine down).

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use wikisearch_index::{DocumentFields, IndexEntry, IndexStore};

use crate::error::{EngineError, EnumerationError, RebuildError, Result};
use crate::lock::{LockCoordinator, RetryPolicy};
use crate::queue::UpdateQueue;

/// Lazy, restartable source of every document that belongs in the index.
/// Supplied by the host (the wiki's document repository).
pub trait DocumentEnumerator: Send + 'static {
    fn enumerate(
        &self,
    ) -> Box<
        dyn Iterator<Item = std::result::Result<(String, DocumentFields), EnumerationError>>
            + Send
            + '_,
    >;
}

pub struct IndexRebuilder {
    queue: Arc<UpdateQueue>,
    coordinator: LockCoordinator,
    in_progress: Arc<AtomicBool>,
}

impl IndexRebuilder {
    pub fn new(store: Arc<IndexStore>, queue: Arc<UpdateQueue>, policy: RetryPolicy) -> Self {
        Self {
            queue,
            coordinator: LockCoordinator::new(store, policy),
            in_progress: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Start a rebuild session. The clear phase runs synchronously, so a
    /// returned handle means the index is already empty and repopulation is
    /// underway on a background thread.
    pub fn start(&self, enumerator: Box<dyn DocumentEnumerator>) -> Result<RebuildHandle> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RebuildError::AlreadyRunning.into());
        }

        if let Err(e) = self.clear_phase() {
            self.in_progress.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let shared = Arc::new(RebuildShared {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            scheduled: AtomicU64::new(0),
            done: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
        });

        info!("rebuild session {} started", shared.session_id);

        let thread = {
            let shared = shared.clone();
            let queue = self.queue.clone();
            let in_progress = self.in_progress.clone();
            thread::spawn(move || {
                enumerate_into_queue(&*enumerator, &queue, &shared);
                shared.done.store(true, Ordering::SeqCst);
                in_progress.store(false, Ordering::SeqCst);
                info!(
                    "rebuild session {} enumerated {} documents",
                    shared.session_id,
                    shared.scheduled.load(Ordering::SeqCst)
                );
            })
        };

        Ok(RebuildHandle {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    fn clear_phase(&self) -> Result<()> {
        let mut handle = match self.coordinator.acquire() {
            Ok(handle) => handle,
            Err(EngineError::Lock(err)) => {
                warn!("rebuild aborted: {}", err);
                return Err(RebuildError::LockTimeout(err).into());
            }
            Err(e) => return Err(e),
        };

        handle.clear_all()?;
        handle.commit()?;
        info!("index cleared for rebuild");
        Ok(())
    }
}

fn enumerate_into_queue(
    enumerator: &dyn DocumentEnumerator,
    queue: &UpdateQueue,
    shared: &RebuildShared,
) {
    for item in enumerator.enumerate() {
        if shared.cancelled.load(Ordering::SeqCst) {
            info!(
                "rebuild session {} cancelled after {} documents",
                shared.session_id,
                shared.scheduled.load(Ordering::SeqCst)
            );
            return;
        }

        match item {
            Ok((doc_id, fields)) => {
                if queue.enqueue(IndexEntry::upsert(doc_id, fields)).is_err() {
                    warn!(
                        "update queue closed; rebuild session {} stopping early",
                        shared.session_id
                    );
                    return;
                }
                shared.scheduled.fetch_add(1, Ordering::SeqCst);
            }
            // Partial rebuild proceeds; the broken document is skipped.
            Err(e) => warn!("skipping document during rebuild: {}", e),
        }
    }
}

#[derive(Debug)]
struct RebuildShared {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    scheduled: AtomicU64,
    done: AtomicBool,
    cancelled: AtomicBool,
}

/// Progress snapshot of a rebuild session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebuildProgress {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub documents_scheduled: u64,
    pub done: bool,
    pub cancelled: bool,
}

/// Handle to a running (or finished) rebuild session.
#[derive(Debug)]
pub struct RebuildHandle {
    shared: Arc<RebuildShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl RebuildHandle {
    pub fn session_id(&self) -> Uuid {
        self.shared.session_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.shared.started_at
    }

    /// Documents enumerated and enqueued so far.
    pub fn documents_scheduled(&self) -> u64 {
        self.shared.scheduled.load(Ordering::SeqCst)
    }

    /// True once every document has been enumerated and enqueued. Does not
    /// imply the updater has committed them.
    pub fn is_done(&self) -> bool {
        self.shared.done.load(Ordering::SeqCst)
    }

    /// Stop further enumeration. Already-enqueued upserts are not retracted.
    pub fn cancel(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn progress(&self) -> RebuildProgress {
        RebuildProgress {
            session_id: self.shared.session_id,
            started_at: self.shared.started_at,
            documents_scheduled: self.documents_scheduled(),
            done: self.is_done(),
            cancelled: self.shared.cancelled.load(Ordering::SeqCst),
        }
    }

    /// Wait for the enumeration thread to finish.
    pub fn join(&self) {
        if let Some(thread) = self.thread.lock().unwrap().take() {
            if thread.join().is_err() {
                error!("rebuild enumeration thread panicked");
            }
        }
    }
}
