use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use livedoc::{Collection, Criteria, Document, QueryOptions, Settings, SortOrder};
use serde_json::json;

use crate::support::{doc, eventually, ids, RecordingAdapter};

type Emissions = Arc<Mutex<Vec<Vec<String>>>>;

fn recorder() -> (Emissions, impl Fn(&[Document]) + Send + Sync + 'static) {
    let emissions: Emissions = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&emissions);
    (emissions, move |documents: &[Document]| {
        sink.lock().unwrap().push(ids(documents))
    })
}

fn last(emissions: &Emissions) -> Vec<String> {
    emissions.lock().unwrap().last().cloned().unwrap_or_default()
}

#[test]
fn four_transitions_of_a_live_query() {
    let tickets = Collection::new("tickets", Settings::new().index("status"));
    tickets
        .insert(doc(json!({"id": "b", "status": "closed"})))
        .wait()
        .unwrap();

    let (emissions, callback) = recorder();
    let observer = tickets.observe(Criteria::eq("status", "open"), QueryOptions::default());
    let _sub = observer.subscribe(callback).unwrap();
    assert_eq!(last(&emissions), Vec::<String>::new());

    // (a) insert a matching document
    tickets
        .insert(doc(json!({"id": "a", "status": "open"})))
        .wait()
        .unwrap();
    assert_eq!(last(&emissions), vec!["a"]);

    // (b) update it out of the result set
    tickets
        .update(doc(json!({"id": "a", "status": "closed"})))
        .wait()
        .unwrap();
    assert_eq!(last(&emissions), Vec::<String>::new());

    // (c) update an outside document into the result set
    tickets
        .update(doc(json!({"id": "b", "status": "open"})))
        .wait()
        .unwrap();
    assert_eq!(last(&emissions), vec!["b"]);

    // (d) delete an in-set document
    tickets.delete("b").wait().unwrap();
    assert_eq!(last(&emissions), Vec::<String>::new());

    assert_eq!(emissions.lock().unwrap().len(), 5);
}

#[test]
fn irrelevant_changes_do_not_emit() {
    let tickets = Collection::new("tickets", Settings::new());
    let (emissions, callback) = recorder();
    let _sub = tickets
        .observe(Criteria::eq("status", "open"), QueryOptions::default())
        .subscribe(callback)
        .unwrap();

    tickets
        .insert(doc(json!({"id": "x", "status": "closed"})))
        .wait()
        .unwrap();
    tickets
        .update(doc(json!({"id": "x", "note": "still closed"})))
        .wait()
        .unwrap();
    tickets.delete("x").wait().unwrap();
    tickets.delete("never-existed").wait().unwrap();

    assert_eq!(emissions.lock().unwrap().len(), 1);
}

#[test]
fn in_place_updates_reach_subscriber() {
    let tickets = Collection::new("tickets", Settings::new());
    tickets
        .insert(doc(json!({"id": "a", "status": "open", "n": 1})))
        .wait()
        .unwrap();

    let latest = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&latest);
    let _sub = tickets
        .observe(Criteria::eq("status", "open"), QueryOptions::default())
        .subscribe(move |documents| *sink.lock().unwrap() = documents.to_vec())
        .unwrap();

    tickets
        .update(doc(json!({"id": "a", "n": 2})))
        .wait()
        .unwrap();
    assert_eq!(
        *latest.lock().unwrap(),
        vec![doc(json!({"id": "a", "status": "open", "n": 2}))]
    );
}

#[test]
fn filter_swaps_criteria_and_keeps_callback() {
    let tickets = Collection::new("tickets", Settings::new());
    for (id, status, rank) in [("a", "open", 2), ("b", "closed", 1), ("c", "open", 1)] {
        tickets
            .insert(doc(json!({"id": id, "status": status, "rank": rank})))
            .wait()
            .unwrap();
    }

    let (emissions, callback) = recorder();
    let observer = tickets.observe(Criteria::eq("status", "open"), QueryOptions::default());
    let sub = observer.subscribe(callback).unwrap();
    assert_eq!(last(&emissions), vec!["a", "c"]);

    observer
        .filter(
            Criteria::eq("status", "closed"),
            QueryOptions::new().sort_by("rank", SortOrder::Ascending),
        )
        .unwrap();
    assert_eq!(last(&emissions), vec!["b"]);

    // the old criteria no longer drives emissions
    let before = emissions.lock().unwrap().len();
    tickets
        .insert(doc(json!({"id": "d", "status": "open", "rank": 0})))
        .wait()
        .unwrap();
    assert_eq!(emissions.lock().unwrap().len(), before);

    tickets
        .insert(doc(json!({"id": "e", "status": "closed", "rank": 0})))
        .wait()
        .unwrap();
    assert_eq!(last(&emissions), vec!["e", "b"]);

    sub.unsubscribe();
    let before = emissions.lock().unwrap().len();
    tickets
        .insert(doc(json!({"id": "f", "status": "closed"})))
        .wait()
        .unwrap();
    assert_eq!(emissions.lock().unwrap().len(), before);
    assert_eq!(tickets.storage().listener_count(), 0);
}

#[test]
fn unsubscribe_removes_the_source_listener() {
    let tickets = Collection::new("tickets", Settings::new());
    let (_emissions, callback) = recorder();
    let sub = tickets
        .observe(Criteria::all(), QueryOptions::default())
        .subscribe(callback)
        .unwrap();

    assert_eq!(tickets.storage().listener_count(), 1);
    sub.unsubscribe();
    assert_eq!(tickets.storage().listener_count(), 0);
}

#[test]
fn changes_committed_during_initial_load_are_not_lost() {
    let adapter = RecordingAdapter::seeded("tickets", vec![Document::with_id("seed")])
        .with_read_delay(Duration::from_millis(100));
    let tickets = Collection::new("tickets", Settings::new().adapter(adapter));

    let writer = {
        let tickets = tickets.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            // queued behind the load, commits once it completes
            tickets.insert(Document::with_id("late")).wait().unwrap();
        })
    };

    let (emissions, callback) = recorder();
    let _sub = tickets
        .observe(Criteria::all(), QueryOptions::default())
        .subscribe(callback)
        .unwrap();
    writer.join().unwrap();

    assert!(eventually(Duration::from_secs(1), || {
        let mut current = last(&emissions);
        current.sort();
        current == vec!["late".to_string(), "seed".to_string()]
    }));
}
