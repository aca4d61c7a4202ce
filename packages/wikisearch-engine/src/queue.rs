//! Bounded update queue
//!
//! # Contract
//!
//! 1. `enqueue` blocks while the queue is full (backpressure) and fails with
//!    `QueueError::Closed` once the queue has been shut down
//! 2. `dequeue_batch` is called by the single updater thread; it waits up to
//!    `max_wait` for a first entry, then keeps the batch open until either
//!    `max_items` entries have accumulated or `max_wait` has elapsed since
//!    the first entry arrived
//! 3. `close` wakes every blocked producer and the consumer
//!
//! Entries enqueued by one producer thread are dequeued in that thread's
//! enqueue order. No ordering is guaranteed across producers.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use wikisearch_index::IndexEntry;

use crate::error::QueueError;

pub struct UpdateQueue {
    inner: Mutex<Inner>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

struct Inner {
    entries: VecDeque<IndexEntry>,
    closed: bool,
}

impl UpdateQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::with_capacity(capacity.min(1024)),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Add one entry, blocking while the queue is at capacity. Safe to call
    /// from any number of producer threads.
    pub fn enqueue(&self, entry: IndexEntry) -> std::result::Result<(), QueueError> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        loop {
            if inner.closed {
                return Err(QueueError::Closed);
            }
            if inner.entries.len() < self.capacity {
                break;
            }
            inner = self.not_full.wait(inner).expect("queue mutex poisoned");
        }
        inner.entries.push_back(entry);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove up to `max_items` entries. Returns an empty vector only when
    /// `max_wait` expired with nothing available, or when the queue is closed
    /// and drained.
    pub fn dequeue_batch(&self, max_items: usize, max_wait: Duration) -> Vec<IndexEntry> {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");

        // Wait for the first entry.
        let idle_deadline = Instant::now() + max_wait;
        while inner.entries.is_empty() && !inner.closed {
            let remaining = idle_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Vec::new();
            }
            let (guard, _) = self
                .not_empty
                .wait_timeout(inner, remaining)
                .expect("queue mutex poisoned");
            inner = guard;
        }

        // Keep the batch open until it is full or max_wait has elapsed since
        // the first entry. A closed queue is drained without further waiting.
        let mut batch = Vec::new();
        let batch_deadline = Instant::now() + max_wait;
        loop {
            while batch.len() < max_items {
                match inner.entries.pop_front() {
                    Some(entry) => batch.push(entry),
                    None => break,
                }
            }
            self.not_full.notify_all();

            if batch.len() >= max_items || inner.closed {
                return batch;
            }
            let remaining = batch_deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return batch;
            }
            let (guard, _) = self
                .not_empty
                .wait_timeout(inner, remaining)
                .expect("queue mutex poisoned");
            inner = guard;
        }
    }

    /// Close the queue. Blocked producers fail with `Closed`; the consumer
    /// drains whatever is left and then receives empty batches.
    pub fn close(&self) {
        let mut inner = self.inner.lock().expect("queue mutex poisoned");
        inner.closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue mutex poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().expect("queue mutex poisoned").closed
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
