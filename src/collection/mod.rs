//! Collections - the read/write facade over a [`Storage`].
//!
//! Mutations go straight to the storage queue. Reads wait for the initial
//! load, narrow the candidate set through the equality index when the
//! criteria allows it, and always run the full criteria over the candidates.
//!
//! ## Example
//!
//! ```
//! use livedoc::{Collection, Criteria, Document, Settings};
//! use serde_json::json;
//!
//! let tasks = Collection::new("tasks", Settings::new().index("status"));
//! let doc = Document::from_value(json!({"id": "1", "status": "open"})).unwrap();
//! tasks.insert(doc).wait().unwrap();
//!
//! let open = tasks.find_by("status", "open").unwrap();
//! assert_eq!(open.len(), 1);
//! assert_eq!(tasks.count(&Criteria::eq("status", "open")).unwrap(), 1);
//! ```

mod model;
mod registry;
mod settings;

use std::collections::BTreeSet;

use serde_json::Value;
use tracing::trace;

use crate::observe::{Observer, ObserverOne};
use crate::query::{Criteria, Cursor, QueryOptions};
use crate::storage::{Change, Pending, Status, Storage, Subscription};
use crate::{Document, Index, StoreError};

pub use model::{Model, ModelCollection};
pub use registry::Collections;
pub use settings::Settings;

/// Handle to a named collection. Clones share the same storage.
#[derive(Clone, Debug)]
pub struct Collection {
    name: String,
    storage: Storage,
}

impl Collection {
    pub fn new(name: impl Into<String>, settings: Settings) -> Self {
        let name = name.into();
        let mut builder = Storage::builder(name.clone()).config(settings.storage);
        if let Some(adapter) = settings.adapter {
            builder = builder.shared_adapter(adapter);
        }
        if !settings.indexes.is_empty() {
            builder = builder.index(Index::new(settings.indexes));
        }
        Self {
            name,
            storage: builder.build(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn load(&self) -> Result<Status, StoreError> {
        self.storage.load()
    }

    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        self.storage.on_change(callback)
    }

    /// Typed access through a [`Model`].
    pub fn models<M: Model>(&self) -> ModelCollection<'_, M> {
        ModelCollection::new(self)
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    pub fn insert(&self, document: Document) -> Pending<Document> {
        self.storage.insert(document)
    }

    pub fn update(&self, document: Document) -> Pending<Document> {
        self.storage.update(document)
    }

    pub fn upsert(&self, document: Document) -> Pending<Document> {
        self.storage.upsert(document)
    }

    pub fn delete(&self, id: impl Into<String>) -> Pending<()> {
        self.storage.delete(id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Direct lookup by id, without running any criteria.
    pub fn find_by_id(&self, id: &str) -> Result<Option<Document>, StoreError> {
        self.storage.load()?;
        Ok(self.storage.get(id))
    }

    /// Every live document whose indexed `key` equals `value` (or, for an
    /// array field, contains it), in id order.
    pub fn find_by(&self, key: &str, value: impl Into<Value>) -> Result<Vec<Document>, StoreError> {
        self.storage.load()?;
        let value = value.into();
        self.storage.read(|state| {
            let postings = state
                .index
                .as_ref()
                .and_then(|index| index.get(key))
                .ok_or_else(|| StoreError::NonIndexedKey {
                    key: key.to_string(),
                })?;

            Ok(postings
                .ids(&value)
                .into_iter()
                .flatten()
                .filter_map(|id| state.documents.get(id).cloned())
                .collect())
        })
    }

    /// Candidate documents for `criteria`: the union of the postings of
    /// every indexed key the criteria tests with a string literal, or the
    /// whole set when no such key exists. Candidates keep insertion order
    /// either way.
    fn candidates(&self, criteria: &Criteria) -> Vec<Document> {
        self.storage.read(|state| {
            let mut ids: Option<BTreeSet<&str>> = None;
            if let Some(index) = state.index.as_ref() {
                for (field, value) in criteria.string_terms() {
                    let Some(postings) = index.get(field) else {
                        continue;
                    };
                    let matched = ids.get_or_insert_with(BTreeSet::new);
                    if let Some(found) = postings.ids(value) {
                        matched.extend(found.iter().map(String::as_str));
                    }
                }
            }

            match ids {
                Some(ids) => {
                    trace!(
                        target: "livedoc::collection",
                        collection = %self.name,
                        candidates = ids.len(),
                        "narrowed by index"
                    );
                    state
                        .documents
                        .iter()
                        .filter(|(id, _)| ids.contains(id.as_str()))
                        .map(|(_, document)| document.clone())
                        .collect()
                }
                None => state.documents.values().cloned().collect(),
            }
        })
    }

    /// Run `criteria` over the collection and shape the result with
    /// `options` (sort, then skip, then limit).
    pub fn query(&self, criteria: &Criteria, options: &QueryOptions) -> Result<Cursor, StoreError> {
        self.storage.load()?;
        Ok(criteria
            .find(self.candidates(criteria))
            .with_options(options))
    }

    pub fn find(&self, criteria: &Criteria) -> Result<Vec<Document>, StoreError> {
        self.find_with(criteria, &QueryOptions::default())
    }

    pub fn find_with(&self, criteria: &Criteria, options: &QueryOptions) -> Result<Vec<Document>, StoreError> {
        Ok(self.query(criteria, options)?.all())
    }

    pub fn find_one(&self, criteria: &Criteria) -> Result<Option<Document>, StoreError> {
        self.find_one_with(criteria, &QueryOptions::default())
    }

    pub fn find_one_with(&self, criteria: &Criteria, options: &QueryOptions) -> Result<Option<Document>, StoreError> {
        Ok(self.query(criteria, options)?.first())
    }

    pub fn count(&self, criteria: &Criteria) -> Result<usize, StoreError> {
        self.count_with(criteria, &QueryOptions::default())
    }

    pub fn count_with(&self, criteria: &Criteria, options: &QueryOptions) -> Result<usize, StoreError> {
        Ok(self.query(criteria, options)?.count())
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Live result set for `criteria`, reshaped by `options` on every emission.
    pub fn observe(&self, criteria: Criteria, options: QueryOptions) -> Observer {
        Observer::new(self.clone(), criteria, options)
    }

    /// Live view of the first document matching `criteria`.
    pub fn observe_one(&self, criteria: Criteria) -> ObserverOne {
        ObserverOne::new(self.clone(), criteria)
    }
}
