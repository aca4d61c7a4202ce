//! End-to-end engine tests: producers, worker, rebuild and shutdown working
//! against a real (in-memory or temp-dir) tantivy index.

use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use wikisearch_engine::{
    DocumentEnumerator, DocumentFields, EngineConfig, EngineError, EnumerationError, FieldValue,
    IndexEngine, IndexEntry, IndexStore, RebuildError, WorkerState,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn fast_config() -> EngineConfig {
    EngineConfig {
        batch_max_items: 16,
        batch_max_wait: Duration::from_millis(20),
        queue_capacity: 64,
        lock_retry_max_attempts: 8,
        lock_retry_backoff_base: Duration::from_millis(1),
        idle_poll_interval: Duration::from_millis(5),
    }
}

fn page(title: &str, content: &str) -> DocumentFields {
    vec![
        ("title".to_string(), FieldValue::Text(title.to_string())),
        ("content".to_string(), FieldValue::Text(content.to_string())),
        ("wiki".to_string(), FieldValue::Keyword("mainwiki".to_string())),
    ]
}

/// Enumerator whose first document is released only after a channel signal,
/// letting tests observe the index state between the clear phase and
/// repopulation without timing assumptions.
struct GatedEnumerator {
    docs: Vec<(String, DocumentFields)>,
    gate: Mutex<Option<mpsc::Receiver<()>>>,
}

impl DocumentEnumerator for GatedEnumerator {
    fn enumerate(
        &self,
    ) -> Box<dyn Iterator<Item = Result<(String, DocumentFields), EnumerationError>> + Send + '_>
    {
        let gate = self.gate.lock().unwrap().take();
        let docs = self.docs.clone();
        Box::new(docs.into_iter().enumerate().map(move |(i, doc)| {
            if i == 0 {
                if let Some(gate) = &gate {
                    let _ = gate.recv();
                }
            }
            Ok(doc)
        }))
    }
}

/// Yields documents fed through a channel, blocking between sends, so tests
/// can interleave rebuild repopulation with concurrent producers.
struct ChannelEnumerator {
    rx: Mutex<Option<mpsc::Receiver<(String, DocumentFields)>>>,
}

impl DocumentEnumerator for ChannelEnumerator {
    fn enumerate(
        &self,
    ) -> Box<dyn Iterator<Item = Result<(String, DocumentFields), EnumerationError>> + Send + '_>
    {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("enumerate called twice");
        Box::new(rx.into_iter().map(Ok))
    }
}

#[test]
fn test_duplicate_upsert_yields_single_hit() {
    init_tracing();
    let store = Arc::new(IndexStore::open_in_ram());
    let mut engine = IndexEngine::start(store.clone(), fast_config()).unwrap();

    engine
        .enqueue(IndexEntry::upsert(
            "wiki:Lorem.Ipsum",
            page("Lorem Ipsum", "dolor sit amet"),
        ))
        .unwrap();
    engine
        .enqueue(IndexEntry::upsert(
            "wiki:Lorem.Ipsum",
            page("Lorem Ipsum", "dolor sit amet, edited"),
        ))
        .unwrap();

    engine.shutdown();

    let reader = store.open_reader().unwrap();
    let hits = reader.search("Ipsum", 10).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, "wiki:Lorem.Ipsum");
    assert_eq!(reader.doc_count().unwrap(), 1);
}

#[test]
fn test_concurrent_producers_lose_no_updates() {
    init_tracing();
    let store = Arc::new(IndexStore::open_in_ram());
    let mut engine = IndexEngine::start(
        store.clone(),
        EngineConfig {
            // a small queue so producers hit backpressure
            queue_capacity: 8,
            ..fast_config()
        },
    )
    .unwrap();

    let mut producers = Vec::new();
    for p in 0..4 {
        let queue = engine.queue();
        producers.push(thread::spawn(move || {
            for i in 0..25 {
                queue
                    .enqueue(IndexEntry::upsert(
                        format!("wiki:Space{p}.Page{i}"),
                        page(&format!("Page {p}-{i}"), "generated content"),
                    ))
                    .unwrap();
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    engine.shutdown();

    let reader = store.open_reader().unwrap();
    assert_eq!(reader.doc_count().unwrap(), 100);
}

#[test]
fn test_graceful_shutdown_commits_everything_queued() {
    init_tracing();
    let store = Arc::new(IndexStore::open_in_ram());
    let mut engine = IndexEngine::start(
        store.clone(),
        EngineConfig {
            // force several commits
            batch_max_items: 7,
            ..fast_config()
        },
    )
    .unwrap();

    for i in 0..50 {
        engine
            .enqueue(IndexEntry::upsert(
                format!("wiki:Bulk.Page{i}"),
                page(&format!("Bulk {i}"), "bulk import"),
            ))
            .unwrap();
    }

    engine.shutdown();
    assert_eq!(engine.worker_state(), WorkerState::Stopped);
    assert_eq!(engine.queue_len(), 0);

    let reader = store.open_reader().unwrap();
    assert_eq!(reader.doc_count().unwrap(), 50);
}

#[test]
fn test_rebuild_clears_before_repopulating() {
    init_tracing();
    let store = Arc::new(IndexStore::open_in_ram());

    // Pre-existing content from before the rebuild.
    let mut writer = store.try_writer().unwrap();
    writer
        .apply(&[
            IndexEntry::upsert("wiki:Old.One", page("Stale One", "obsolete")),
            IndexEntry::upsert("wiki:Old.Two", page("Stale Two", "obsolete")),
        ])
        .unwrap();
    writer.commit().unwrap();

    let mut engine = IndexEngine::start(store.clone(), fast_config()).unwrap();
    assert!(!engine.needs_initial_build().unwrap());

    let (gate_tx, gate_rx) = mpsc::channel();
    let handle = engine
        .start_rebuild(Box::new(GatedEnumerator {
            docs: vec![
                ("wiki:New.One".to_string(), page("Fresh One", "current")),
                ("wiki:New.Two".to_string(), page("Fresh Two", "current")),
                ("wiki:New.Three".to_string(), page("Fresh Three", "current")),
            ],
            gate: Mutex::new(Some(gate_rx)),
        }))
        .unwrap();

    // The clear phase committed before start_rebuild returned; the gate is
    // still shut, so nothing has been re-enqueued yet.
    let reader = store.open_reader().unwrap();
    assert_eq!(reader.doc_count().unwrap(), 0);
    assert!(engine.rebuild_in_progress());

    gate_tx.send(()).unwrap();
    handle.join();
    assert!(handle.is_done());
    assert_eq!(handle.documents_scheduled(), 3);

    engine.shutdown();

    assert_eq!(reader.doc_count().unwrap(), 3);
    assert!(reader.search("obsolete", 10).unwrap().is_empty());
    assert_eq!(reader.search("current", 10).unwrap().len(), 3);
}

#[test]
fn test_no_updates_lost_when_producers_race_a_rebuild() {
    init_tracing();
    let store = Arc::new(IndexStore::open_in_ram());

    // Stale content the rebuild must wipe.
    let mut writer = store.try_writer().unwrap();
    writer
        .apply(&[
            IndexEntry::upsert("wiki:Old.One", page("Stale One", "stale")),
            IndexEntry::upsert("wiki:Old.Two", page("Stale Two", "stale")),
        ])
        .unwrap();
    writer.commit().unwrap();

    // An externally held write handle keeps the clear phase waiting while
    // producers pile entries into the queue.
    let holder = store.try_writer().unwrap();

    // Batch larger than everything this test enqueues, so the worker stays
    // inside its dequeue wait and every entry commits after the clear.
    let engine = Arc::new(
        IndexEngine::start(
            store.clone(),
            EngineConfig {
                batch_max_items: 300,
                batch_max_wait: Duration::from_secs(30),
                queue_capacity: 512,
                lock_retry_max_attempts: 50,
                lock_retry_backoff_base: Duration::from_millis(2),
                idle_poll_interval: Duration::from_millis(5),
            },
        )
        .unwrap(),
    );

    let (doc_tx, doc_rx) = mpsc::channel();
    let (started_tx, started_rx) = mpsc::channel();
    let rebuild_thread = {
        let engine = engine.clone();
        thread::spawn(move || {
            started_tx.send(()).unwrap();
            let handle = engine
                .start_rebuild(Box::new(ChannelEnumerator {
                    rx: Mutex::new(Some(doc_rx)),
                }))
                .unwrap();
            handle.join();
            handle.documents_scheduled()
        })
    };
    started_rx.recv().unwrap();

    // Each producer writes every page twice while the clear is still blocked;
    // per-producer order must make the second version win.
    let mut producers = Vec::new();
    for p in 0..4 {
        let queue = engine.queue();
        producers.push(thread::spawn(move || {
            for i in 0..25 {
                let id = format!("wiki:Space{p}.Page{i}");
                queue
                    .enqueue(IndexEntry::upsert(id.clone(), page("Racing Page", "draft copy")))
                    .unwrap();
                queue
                    .enqueue(IndexEntry::upsert(id, page("Racing Page", "final copy")))
                    .unwrap();
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    // Nothing can have committed while the external writer is held.
    let reader = store.open_reader().unwrap();
    assert_eq!(reader.doc_count().unwrap(), 2);

    drop(holder);

    for i in 0..10 {
        doc_tx
            .send((
                format!("wiki:Rebuilt.Page{i}"),
                page("Rebuilt Page", "repopulated"),
            ))
            .unwrap();
    }
    drop(doc_tx);
    assert_eq!(rebuild_thread.join().unwrap(), 10);

    // Dropping the last engine handle drains the queue and stops the worker.
    drop(engine);

    // 100 producer pages plus 10 rebuilt pages, each id exactly once, with
    // the last-written version of every racing page.
    assert_eq!(reader.doc_count().unwrap(), 110);
    assert_eq!(reader.search("final", 200).unwrap().len(), 100);
    assert!(reader.search("draft", 200).unwrap().is_empty());
    assert!(reader.search("stale", 200).unwrap().is_empty());
    assert_eq!(reader.search("repopulated", 200).unwrap().len(), 10);
}

#[test]
fn test_second_rebuild_rejected_while_one_runs() {
    init_tracing();
    let store = Arc::new(IndexStore::open_in_ram());
    let mut engine = IndexEngine::start(store, fast_config()).unwrap();

    let (gate_tx, gate_rx) = mpsc::channel();
    let first = engine
        .start_rebuild(Box::new(GatedEnumerator {
            docs: vec![("wiki:A.One".to_string(), page("One", "alpha"))],
            gate: Mutex::new(Some(gate_rx)),
        }))
        .unwrap();

    let second = engine.start_rebuild(Box::new(GatedEnumerator {
        docs: vec![],
        gate: Mutex::new(None),
    }));
    assert!(matches!(
        second,
        Err(EngineError::Rebuild(RebuildError::AlreadyRunning))
    ));

    gate_tx.send(()).unwrap();
    first.join();
    assert!(!engine.rebuild_in_progress());

    // A new session is accepted once the previous one finished.
    let third = engine
        .start_rebuild(Box::new(GatedEnumerator {
            docs: vec![("wiki:A.Two".to_string(), page("Two", "beta"))],
            gate: Mutex::new(None),
        }))
        .unwrap();
    third.join();

    engine.shutdown();
}

#[test]
fn test_on_disk_index_survives_engine_restart() {
    init_tracing();
    let tmp = tempfile::TempDir::new().unwrap();
    let dir = tmp.path().join("index");

    {
        let store = Arc::new(IndexStore::open_in_dir(&dir).unwrap());
        let mut engine = IndexEngine::start(store, fast_config()).unwrap();
        assert!(engine.needs_initial_build().unwrap());
        engine
            .enqueue(IndexEntry::upsert(
                "wiki:Main.Durable",
                page("Durable", "survives restarts"),
            ))
            .unwrap();
        engine.shutdown();
    }

    let store = Arc::new(IndexStore::open_in_dir(&dir).unwrap());
    let mut engine = IndexEngine::start(store.clone(), fast_config()).unwrap();
    assert!(!engine.needs_initial_build().unwrap());

    let reader = store.open_reader().unwrap();
    assert_eq!(reader.search("survives", 10).unwrap().len(), 1);
    engine.shutdown();
}
