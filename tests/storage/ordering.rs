use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

use livedoc::{Change, ChangeKind, Document, StoreError, Storage};
use proptest::prelude::*;
use serde_json::json;

use crate::support::doc;

#[test]
fn operations_commit_in_submission_order() {
    let storage = Storage::ephemeral();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let _sub = storage.on_change(move |change| {
        sink.lock()
            .unwrap()
            .push((change.kind(), change.id().to_string()));
    });

    let first = storage.insert(Document::with_id("1"));
    let dup = storage.insert(Document::with_id("1"));
    let update = storage.update(doc(json!({"id": "1", "v": 2})));
    let missing = storage.update(doc(json!({"id": "nope"})));
    let delete = storage.delete("1");

    assert!(first.wait().is_ok());
    assert_eq!(
        dup.wait().unwrap_err(),
        StoreError::DuplicateDocument { id: "1".into() }
    );
    assert_eq!(update.wait().unwrap().get("v"), Some(&json!(2)));
    assert_eq!(
        missing.wait().unwrap_err(),
        StoreError::DocumentNotFound { id: "nope".into() }
    );
    assert!(delete.wait().is_ok());

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            (ChangeKind::Insert, "1".to_string()),
            (ChangeKind::Update, "1".to_string()),
            (ChangeKind::Delete, "1".to_string()),
        ]
    );
}

#[test]
fn change_is_emitted_before_handle_resolves() {
    let storage = Storage::ephemeral();
    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let _sub = storage.on_change(move |change| {
        *sink.lock().unwrap() = change.document().cloned();
    });

    let mut pending = storage.insert(Document::with_id("x"));
    let stored = pending.try_result().unwrap().unwrap();
    assert_eq!(seen.lock().unwrap().as_ref(), Some(&stored));
}

#[test]
fn submissions_from_many_threads_all_commit() {
    let storage = Storage::ephemeral();
    let commits = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&commits);
    let _sub = storage.on_change(move |change: &Change| {
        sink.lock().unwrap().push(change.id().to_string());
    });

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let storage = storage.clone();
            thread::spawn(move || {
                (0..25)
                    .map(|n| storage.insert(Document::with_id(format!("{}-{}", t, n))))
                    .collect::<Vec<_>>()
                    .into_iter()
                    .map(|pending| pending.wait().unwrap())
                    .count()
            })
        })
        .collect();

    let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 100);
    assert_eq!(storage.len(), 100);

    let commits = commits.lock().unwrap();
    assert_eq!(commits.len(), 100);
    // per-thread submission order survives interleaving
    for t in 0..4 {
        let prefix = format!("{}-", t);
        let own: Vec<usize> = commits
            .iter()
            .filter_map(|id| id.strip_prefix(&prefix))
            .map(|n| n.parse().unwrap())
            .collect();
        assert_eq!(own, (0..25).collect::<Vec<_>>());
    }
}

#[derive(Debug, Clone)]
enum Op {
    Insert(Option<u8>),
    Upsert(u8),
    Delete(u8),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        proptest::option::of(0u8..8).prop_map(Op::Insert),
        (0u8..8).prop_map(Op::Upsert),
        (0u8..8).prop_map(Op::Delete),
    ]
}

proptest! {
    #[test]
    fn ids_stay_unique(ops in proptest::collection::vec(op(), 1..40)) {
        let storage = Storage::ephemeral();
        for op in ops {
            let _ = match op {
                Op::Insert(Some(n)) => storage.insert(Document::with_id(n.to_string())).wait().map(|_| ()),
                Op::Insert(None) => storage.insert(Document::new()).wait().map(|_| ()),
                Op::Upsert(n) => storage.upsert(Document::with_id(n.to_string())).wait().map(|_| ()),
                Op::Delete(n) => storage.delete(n.to_string()).wait(),
            };
        }

        let data = storage.data();
        let unique: HashSet<_> = data.iter().filter_map(|d| d.id()).collect();
        prop_assert_eq!(unique.len(), data.len());
        prop_assert_eq!(data.len(), storage.len());
    }
}
