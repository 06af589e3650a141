//! Secondary equality index.
//!
//! Maps each registered field name to a reverse mapping from field value to
//! the set of document ids currently holding that value. The index never
//! subscribes to storage changes on its own: the storage that owns it calls
//! [`Index::add`], [`Index::update`] and [`Index::remove`] inside the same
//! commit step that mutates its document map.
//!
//! Keys may be dotted paths (`"owner.name"`). An array value is posted under
//! the whole array and under each of its elements, so an equality lookup
//! answers "array contains" the same way criteria do.

use std::collections::{BTreeSet, HashMap};

use serde_json::Value;

use crate::Document;

/// Value bucket -> ids for one indexed field.
///
/// Buckets are keyed by the canonical JSON text of the value, so `"1"` and
/// `1` land in different buckets while `10` and `10.0` share one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Postings {
    by_value: HashMap<String, BTreeSet<String>>,
}

impl Postings {
    /// Ids holding `value`, if any.
    pub fn ids(&self, value: &Value) -> Option<&BTreeSet<String>> {
        self.by_value.get(&value_key(value))
    }

    /// Number of distinct values with at least one id.
    pub fn len(&self) -> usize {
        self.by_value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_value.is_empty()
    }

    /// Iterate `(canonical value text, ids)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.by_value.iter().map(|(value, ids)| (value.as_str(), ids))
    }

    fn insert(&mut self, value: &Value, id: &str) {
        for key in bucket_keys(value) {
            self.by_value.entry(key).or_default().insert(id.to_string());
        }
    }

    fn remove(&mut self, value: &Value, id: &str) {
        for key in bucket_keys(value) {
            if let Some(ids) = self.by_value.get_mut(&key) {
                ids.remove(id);
                if ids.is_empty() {
                    self.by_value.remove(&key);
                }
            }
        }
    }
}

fn bucket_keys(value: &Value) -> BTreeSet<String> {
    let mut keys = BTreeSet::new();
    keys.insert(value_key(value));
    if let Value::Array(items) = value {
        keys.extend(items.iter().map(value_key));
    }
    keys
}

fn value_key(value: &Value) -> String {
    canonical(value).to_string()
}

// Integral floats collapse onto integers, matching numeric equality in criteria.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Number(n) if n.is_f64() => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => Value::from(f as i64),
            _ => value.clone(),
        },
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        _ => value.clone(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct Index {
    keys: HashMap<String, Postings>,
    loaded: bool,
}

impl Index {
    pub fn new<I, K>(keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            keys: keys
                .into_iter()
                .map(|key| (key.into(), Postings::default()))
                .collect(),
            loaded: false,
        }
    }

    pub fn is_indexed(&self, key: &str) -> bool {
        self.keys.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Postings> {
        self.keys.get(key)
    }

    /// Registered field names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.keys().map(String::as_str)
    }

    /// One-time bulk population. Later calls are no-ops so that an initial
    /// load and a replay of the same documents are never counted twice.
    pub fn load<'a, I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = &'a Document>,
    {
        if self.loaded {
            return;
        }
        self.loaded = true;
        for document in documents {
            self.add(document);
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    /// Post the document's id under its current value for every registered
    /// key path. Documents without an id, and paths the document lacks, are
    /// not indexed.
    pub fn add(&mut self, document: &Document) {
        let Some(id) = document.id() else {
            return;
        };
        for (key, postings) in self.keys.iter_mut() {
            if let Some(value) = document.get_path(key) {
                postings.insert(value, id);
            }
        }
    }

    /// Drop the document's id from every value bucket it was posted under.
    /// Emptied buckets are deleted.
    pub fn remove(&mut self, document: &Document) {
        let Some(id) = document.id() else {
            return;
        };
        for (key, postings) in self.keys.iter_mut() {
            if let Some(value) = document.get_path(key) {
                postings.remove(value, id);
            }
        }
    }

    /// Move the id between buckets for every key whose value changed.
    pub fn update(&mut self, prev: &Document, next: &Document) {
        let Some(id) = next.id() else {
            return;
        };
        for (key, postings) in self.keys.iter_mut() {
            let prev_value = prev.get_path(key);
            let next_value = next.get_path(key);
            if prev_value == next_value {
                continue;
            }
            if let Some(value) = prev_value {
                postings.remove(value, id);
            }
            if let Some(value) = next_value {
                postings.insert(value, id);
            }
        }
    }

    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&str, &Postings),
    {
        for (key, postings) in &self.keys {
            f(key, postings);
        }
    }
}
