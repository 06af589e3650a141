use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use livedoc::{AdapterError, Document, FileAdapter, StoreError, Storage, StorageConfig};
use serde_json::json;

use crate::support::{doc, eventually, init_tracing, RecordingAdapter};

const WINDOW: Duration = Duration::from_millis(100);

fn debounced(name: &str, adapter: &RecordingAdapter) -> Storage {
    Storage::builder(name)
        .adapter(adapter.clone())
        .config(StorageConfig::new().debounce(WINDOW))
        .build()
}

#[test]
fn burst_of_mutations_collapses_into_one_write() {
    init_tracing();
    let adapter = RecordingAdapter::new();
    let storage = debounced("notes", &adapter);

    for n in 0..5 {
        let _ = storage.insert(Document::with_id(n.to_string()));
    }
    storage
        .update(doc(json!({"id": "4", "last": true})))
        .wait()
        .unwrap();

    assert!(adapter.writes().is_empty());
    assert!(eventually(WINDOW * 10, || adapter.writes().len() == 1));
    thread::sleep(WINDOW * 3);

    let writes = adapter.writes();
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].len(), 5);
    assert_eq!(writes[0][4], doc(json!({"id": "4", "last": true})));
}

#[test]
fn separate_bursts_write_separately() {
    let adapter = RecordingAdapter::new();
    let storage = debounced("notes", &adapter);

    storage.insert(Document::with_id("a")).wait().unwrap();
    assert!(eventually(WINDOW * 10, || adapter.writes().len() == 1));

    storage.insert(Document::with_id("b")).wait().unwrap();
    assert!(eventually(WINDOW * 10, || adapter.writes().len() == 2));
    assert_eq!(adapter.persisted("notes").len(), 2);
}

#[test]
fn flush_writes_now_and_cancels_pending_write() {
    let adapter = RecordingAdapter::new();
    let storage = debounced("notes", &adapter);

    storage.insert(Document::with_id("a")).wait().unwrap();
    storage.flush().unwrap();
    assert_eq!(adapter.writes().len(), 1);

    thread::sleep(WINDOW * 3);
    assert_eq!(adapter.writes().len(), 1);
}

#[test]
fn flush_before_load_writes_nothing() {
    let adapter = RecordingAdapter::seeded("notes", vec![Document::with_id("kept")]);
    let storage = debounced("notes", &adapter);

    storage.flush().unwrap();
    assert!(adapter.writes().is_empty());
    assert_eq!(adapter.persisted("notes"), vec![Document::with_id("kept")]);
}

#[test]
fn purge_deletes_backend_data_and_cancels_pending_write() {
    let adapter = RecordingAdapter::seeded("notes", vec![Document::with_id("old")]);
    let storage = debounced("notes", &adapter);

    storage.insert(Document::with_id("new")).wait().unwrap();
    storage.purge().unwrap();
    thread::sleep(WINDOW * 3);

    assert_eq!(adapter.dels(), 1);
    assert!(adapter.writes().is_empty());
    assert!(adapter.persisted("notes").is_empty());
    assert_eq!(storage.len(), 2);
}

#[test]
fn write_failures_reach_the_error_channel() {
    let adapter = RecordingAdapter::new();
    adapter.fail_writes(true);
    let storage = debounced("notes", &adapter);

    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&errors);
    let _sub = storage.on_persist_error(move |err| sink.lock().unwrap().push(err.clone()));

    // the mutation itself still succeeds
    storage.insert(Document::with_id("a")).wait().unwrap();
    assert!(eventually(WINDOW * 10, || errors.lock().unwrap().len() == 1));
    assert_eq!(
        errors.lock().unwrap()[0],
        StoreError::Adapter(AdapterError::Backend("disk full".into()))
    );

    let flushed = storage.flush().unwrap_err();
    assert!(matches!(flushed, StoreError::Adapter(_)));
    assert_eq!(errors.lock().unwrap().len(), 2);
}

#[test]
fn dropping_storage_releases_pending_write() {
    let adapter = RecordingAdapter::new();
    {
        let storage = debounced("notes", &adapter);
        storage.insert(Document::with_id("a")).wait().unwrap();
    }
    thread::sleep(WINDOW * 3);
    assert!(adapter.writes().is_empty());
}

#[test]
fn ephemeral_storage_never_touches_a_backend() {
    let storage = Storage::ephemeral();
    storage.insert(Document::with_id("a")).wait().unwrap();
    assert!(storage.flush().is_ok());
    assert!(storage.purge().is_ok());
    assert!(storage.has("a"));
}

#[test]
fn file_backend_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    {
        let storage = Storage::new("journal", FileAdapter::open(dir.path()).unwrap());
        storage
            .insert(doc(json!({"id": "e1", "text": "hello"})))
            .wait()
            .unwrap();
        storage.insert(Document::with_id("e2")).wait().unwrap();
        storage.flush().unwrap();
    }

    let reopened = Storage::new("journal", FileAdapter::open(dir.path()).unwrap());
    reopened.load().unwrap();
    assert_eq!(reopened.len(), 2);
    assert_eq!(
        reopened.get("e1"),
        Some(doc(json!({"id": "e1", "text": "hello"})))
    );
}
