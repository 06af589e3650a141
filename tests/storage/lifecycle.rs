use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use livedoc::{Document, Status, Storage};

use crate::support::{doc, RecordingAdapter};
use serde_json::json;

#[test]
fn load_reads_backend_once() {
    let adapter = RecordingAdapter::seeded("people", vec![Document::with_id("p1")]);
    let storage = Storage::new("people", adapter.clone());

    assert_eq!(storage.status(), Status::Loading);
    assert_eq!(storage.load().unwrap(), Status::Ready);
    assert_eq!(storage.load().unwrap(), Status::Ready);
    storage.insert(Document::with_id("p2")).wait().unwrap();

    assert_eq!(adapter.gets(), 1);
    assert_eq!(storage.len(), 2);
}

#[test]
fn concurrent_loads_share_one_backend_read() {
    let adapter = RecordingAdapter::seeded("people", vec![Document::with_id("p1")])
        .with_read_delay(Duration::from_millis(50));
    let storage = Storage::new("people", adapter.clone());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let storage = storage.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                storage.load().unwrap()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), Status::Ready);
    }
    assert_eq!(adapter.gets(), 1);
    assert!(storage.has("p1"));
}

#[test]
fn mutation_triggers_load() {
    let adapter = RecordingAdapter::seeded("people", vec![doc(json!({"id": "p1", "n": 1}))]);
    let storage = Storage::new("people", adapter.clone());

    let updated = storage
        .update(doc(json!({"id": "p1", "n": 2})))
        .wait()
        .unwrap();

    assert_eq!(updated, doc(json!({"id": "p1", "n": 2})));
    assert_eq!(adapter.gets(), 1);
    assert!(storage.is(Status::Ready));
}

#[test]
fn persisted_documents_without_id_are_skipped() {
    let adapter = RecordingAdapter::seeded(
        "people",
        vec![doc(json!({"name": "anonymous"})), Document::with_id("p1")],
    );
    let storage = Storage::new("people", adapter);
    storage.load().unwrap();

    assert_eq!(storage.len(), 1);
    assert!(storage.has("p1"));
}

#[test]
fn reads_see_insertion_order() {
    let storage = Storage::ephemeral();
    for id in ["c", "a", "b"] {
        storage.insert(Document::with_id(id)).wait().unwrap();
    }
    storage
        .update(doc(json!({"id": "c", "touched": true})))
        .wait()
        .unwrap();

    let order: Vec<_> = storage
        .data()
        .iter()
        .map(|d| d.id().unwrap().to_string())
        .collect();
    assert_eq!(order, vec!["c", "a", "b"]);
}
