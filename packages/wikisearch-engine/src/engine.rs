//! Engine facade
//!
//! `IndexEngine` wires the store, the bounded queue, the updater worker and
//! the rebuilder together. It is constructed and owned explicitly by the
//! host; there is no process-global instance. Dropping the engine (or calling
//! `shutdown`) closes the queue and waits for the worker to drain and commit
//! everything still queued.

use std::sync::Arc;

use tracing::info;

use wikisearch_index::{IndexEntry, IndexStore, ReadHandle};

use crate::config::EngineConfig;
use crate::error::Result;
use crate::lock::RetryPolicy;
use crate::queue::UpdateQueue;
use crate::rebuild::{DocumentEnumerator, IndexRebuilder, RebuildHandle};
use crate::updater::{IndexUpdater, UpdaterHandle, WorkerState};

pub struct IndexEngine {
    store: Arc<IndexStore>,
    queue: Arc<UpdateQueue>,
    updater: Option<UpdaterHandle>,
    rebuilder: IndexRebuilder,
}

impl IndexEngine {
    /// Validate the configuration and start the updater worker.
    pub fn start(store: Arc<IndexStore>, config: EngineConfig) -> Result<Self> {
        config.validate()?;

        let queue = Arc::new(UpdateQueue::new(config.queue_capacity));
        let updater = IndexUpdater::spawn(store.clone(), queue.clone(), &config);
        let rebuilder =
            IndexRebuilder::new(store.clone(), queue.clone(), RetryPolicy::from(&config));

        info!(
            "index engine started (queue capacity {}, batch size {})",
            config.queue_capacity, config.batch_max_items
        );

        Ok(Self {
            store,
            queue,
            updater: Some(updater),
            rebuilder,
        })
    }

    /// Producer side of the update queue, for callers that enqueue from
    /// their own threads.
    pub fn queue(&self) -> Arc<UpdateQueue> {
        self.queue.clone()
    }

    /// Enqueue one entry, blocking while the queue is full.
    pub fn enqueue(&self, entry: IndexEntry) -> Result<()> {
        self.queue.enqueue(entry)?;
        Ok(())
    }

    pub fn store(&self) -> Arc<IndexStore> {
        self.store.clone()
    }

    pub fn open_reader(&self) -> Result<ReadHandle> {
        Ok(self.store.open_reader()?)
    }

    /// Clear the index and repopulate it from `enumerator`. The clear phase
    /// completes before this returns; repopulation streams through the
    /// ordinary update queue.
    pub fn start_rebuild(&self, enumerator: Box<dyn DocumentEnumerator>) -> Result<RebuildHandle> {
        self.rebuilder.start(enumerator)
    }

    pub fn rebuild_in_progress(&self) -> bool {
        self.rebuilder.in_progress()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.updater
            .as_ref()
            .map(UpdaterHandle::state)
            .unwrap_or(WorkerState::Stopped)
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// True while the index holds no committed documents, e.g. on the very
    /// first start of a wiki. Hosts use this to trigger an initial rebuild.
    pub fn needs_initial_build(&self) -> Result<bool> {
        let reader = self.store.open_reader()?;
        Ok(reader.doc_count()? == 0)
    }

    pub fn is_locked(&self) -> bool {
        self.store.is_locked()
    }

    /// Close the queue, then wait for the worker to drain, commit and stop.
    /// Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        if let Some(updater) = self.updater.take() {
            info!("index engine shutting down");
            updater.request_stop();
            updater.join();
            info!("index engine stopped");
        }
    }
}

impl Drop for IndexEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
