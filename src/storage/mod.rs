//! Storage - the single authority over one collection's document set.
//!
//! Every mutation is queued and committed strictly in submission order by a
//! drain loop; at most one operation commits at a time. A commit mutates the
//! document map (and the attached [`Index`], if any) under one lock, then
//! emits exactly one [`Change`] to the registered listeners before the
//! operation's [`Pending`] handle resolves.
//!
//! ## Lifecycle
//!
//! `Loading` -> `Ready` <-> `Working`. The first mutation (or an explicit
//! [`Storage::load`]) reads the persisted set from the backend once and
//! leaves `Loading` for good.
//!
//! ## Example
//!
//! ```
//! use livedoc::{Document, InstanceAdapter, Storage};
//! use serde_json::json;
//!
//! let storage = Storage::new("tasks", InstanceAdapter::new());
//! let doc = Document::from_value(json!({"id": "1", "title": "write docs"})).unwrap();
//! storage.insert(doc).wait().unwrap();
//! assert!(storage.has("1"));
//! ```

mod change;
mod config;
mod operation;
mod persist;

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use tracing::{debug, trace, warn};

use crate::adapter::StorageAdapter;
use crate::document::ID_FIELD;
use crate::{Document, Index, StoreError};

pub(crate) use change::Listeners;
pub use change::{Change, ChangeKind, Subscription};
pub use config::{random_id, IdGenerator, StorageConfig, DEFAULT_DEBOUNCE, DEFAULT_MAX_ID_RETRIES};
pub use operation::Pending;

use operation::{completion, Operation, Reply};
use persist::PersistWorker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Loading,
    Ready,
    Working,
}

pub(crate) struct State {
    status: Status,
    /// Id -> document, iterated in insertion order.
    pub(crate) documents: IndexMap<String, Document>,
    pub(crate) index: Option<Index>,
    queue: VecDeque<Operation>,
}

impl State {
    fn store(&mut self, id: &str, document: Document) {
        match self.documents.get(id) {
            Some(prev) => {
                if let Some(index) = self.index.as_mut() {
                    index.update(prev, &document);
                }
            }
            None => {
                if let Some(index) = self.index.as_mut() {
                    index.add(&document);
                }
            }
        }
        self.documents.insert(id.to_string(), document);
    }

    fn insert(&mut self, mut document: Document, config: &StorageConfig) -> Result<Change, StoreError> {
        let id = match document.get(ID_FIELD) {
            Some(_) => {
                let id = document.require_id()?.to_string();
                if self.documents.contains_key(&id) {
                    return Err(StoreError::DuplicateDocument { id });
                }
                id
            }
            None => self.generate_id(config)?,
        };

        document.set_id(&id);
        self.store(&id, document.clone());
        Ok(Change::Insert(document))
    }

    fn generate_id(&self, config: &StorageConfig) -> Result<String, StoreError> {
        let mut attempts = 0;
        loop {
            let candidate = config.generate_id();
            if !self.documents.contains_key(&candidate) {
                return Ok(candidate);
            }
            if attempts >= config.max_id_retries {
                return Err(StoreError::DuplicateDocument { id: candidate });
            }
            attempts += 1;
        }
    }

    fn update(&mut self, patch: Document) -> Result<Change, StoreError> {
        let id = patch.require_id()?.to_string();
        let next = match self.documents.get(&id) {
            Some(current) => current.merged(&patch),
            None => return Err(StoreError::DocumentNotFound { id }),
        };
        self.store(&id, next.clone());
        Ok(Change::Update(next))
    }

    fn upsert(&mut self, document: Document) -> Result<Change, StoreError> {
        let id = document.require_id()?.to_string();
        if self.documents.contains_key(&id) {
            return self.update(document);
        }
        self.store(&id, document.clone());
        Ok(Change::Insert(document))
    }

    fn delete(&mut self, id: String) -> Change {
        if let Some(prev) = self.documents.shift_remove(&id) {
            if let Some(index) = self.index.as_mut() {
                index.remove(&prev);
            }
        }
        Change::Delete { id }
    }
}

pub(crate) struct Inner {
    name: Option<String>,
    adapter: Option<Arc<dyn StorageAdapter>>,
    config: StorageConfig,
    state: Mutex<State>,
    load_gate: Mutex<()>,
    changes: Listeners<Change>,
    persist_errors: Listeners<StoreError>,
    worker: Mutex<Option<PersistWorker>>,
}

/// Builder for a [`Storage`].
pub struct StorageBuilder {
    name: Option<String>,
    adapter: Option<Arc<dyn StorageAdapter>>,
    config: StorageConfig,
    index: Option<Index>,
}

impl StorageBuilder {
    pub fn adapter<A: StorageAdapter + 'static>(mut self, adapter: A) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    pub fn shared_adapter(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn config(mut self, config: StorageConfig) -> Self {
        self.config = config;
        self
    }

    /// Maintain `index` inside every commit.
    pub fn index(mut self, index: Index) -> Self {
        self.index = Some(index);
        self
    }

    pub fn build(self) -> Storage {
        Storage {
            inner: Arc::new(Inner {
                name: self.name,
                adapter: self.adapter,
                config: self.config,
                state: Mutex::new(State {
                    status: Status::Loading,
                    documents: IndexMap::new(),
                    index: self.index,
                    queue: VecDeque::new(),
                }),
                load_gate: Mutex::new(()),
                changes: Listeners::default(),
                persist_errors: Listeners::default(),
                worker: Mutex::new(None),
            }),
        }
    }
}

/// Handle to a document set. Clones share the same storage.
#[derive(Clone)]
pub struct Storage {
    inner: Arc<Inner>,
}

impl Storage {
    pub fn builder(name: impl Into<String>) -> StorageBuilder {
        StorageBuilder {
            name: Some(name.into()),
            adapter: None,
            config: StorageConfig::default(),
            index: None,
        }
    }

    /// Named storage persisted through `adapter` with default settings.
    pub fn new<A: StorageAdapter + 'static>(name: impl Into<String>, adapter: A) -> Self {
        Self::builder(name).adapter(adapter).build()
    }

    /// Unnamed storage without a backend. It never persists.
    pub fn ephemeral() -> Self {
        StorageBuilder {
            name: None,
            adapter: None,
            config: StorageConfig::default(),
            index: None,
        }
        .build()
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    pub fn config(&self) -> &StorageConfig {
        &self.inner.config
    }

    // Nothing user-supplied runs while the state lock is held except the id
    // generator, so a poisoned map is still consistent.
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the committed state.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&State) -> R) -> R {
        f(&self.lock_state())
    }

    pub fn status(&self) -> Status {
        self.lock_state().status
    }

    pub fn is(&self, status: Status) -> bool {
        self.status() == status
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    pub fn has(&self, id: &str) -> bool {
        self.lock_state().documents.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<Document> {
        self.lock_state().documents.get(id).cloned()
    }

    /// Snapshot of every document in insertion order.
    pub fn data(&self) -> Vec<Document> {
        self.lock_state().documents.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock_state().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_state().documents.is_empty()
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Called once per committed mutation, in commit order.
    pub fn on_change<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Change) + Send + Sync + 'static,
    {
        let id = self.inner.changes.add(callback);
        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.changes.remove(id);
            }
        })
    }

    /// Called when a debounced write-back fails. The failure is not tied to
    /// any particular mutation.
    pub fn on_persist_error<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&StoreError) + Send + Sync + 'static,
    {
        let id = self.inner.persist_errors.add(callback);
        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.persist_errors.remove(id);
            }
        })
    }

    pub fn listener_count(&self) -> usize {
        self.inner.changes.len()
    }

    // ------------------------------------------------------------------
    // Persistors
    // ------------------------------------------------------------------

    /// Read the persisted set and leave `Loading`. Idempotent: only the
    /// first call reads the backend, concurrent callers wait for it.
    pub fn load(&self) -> Result<Status, StoreError> {
        {
            let state = self.lock_state();
            if state.status != Status::Loading {
                return Ok(state.status);
            }
        }

        {
            let _gate = self
                .inner
                .load_gate
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            if !self.is(Status::Loading) {
                return Ok(self.status());
            }

            let documents = match (self.inner.name.as_deref(), self.inner.adapter.as_ref()) {
                (Some(name), Some(adapter)) => adapter.get(name)?,
                _ => Vec::new(),
            };

            let mut state = self.lock_state();
            let mut skipped = 0usize;
            for document in documents {
                match document.id().map(str::to_string) {
                    Some(id) => {
                        state.documents.insert(id, document);
                    }
                    None => skipped += 1,
                }
            }
            if skipped > 0 {
                warn!(
                    target: "livedoc::storage",
                    name = ?self.name(),
                    skipped,
                    "persisted documents without an id were ignored"
                );
            }

            let State {
                documents, index, ..
            } = &mut *state;
            if let Some(index) = index.as_mut() {
                index.load(documents.values());
            }
            state.status = Status::Ready;
            debug!(
                target: "livedoc::storage",
                name = ?self.name(),
                documents = state.documents.len(),
                "storage ready"
            );
        }

        self.process();
        Ok(self.status())
    }

    /// Restart the debounce window for a write-back of the current state.
    fn save(&self) {
        let (Some(name), Some(_)) = (self.inner.name.as_deref(), self.inner.adapter.as_ref())
        else {
            return;
        };

        let mut worker = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if worker.is_none() {
            *worker = PersistWorker::spawn(Arc::downgrade(&self.inner), name, self.inner.config.debounce);
        }
        let debounced = match worker.as_ref() {
            Some(worker) => {
                worker.touch();
                true
            }
            None => false,
        };
        drop(worker);

        if !debounced {
            let _ = self.write_back();
        }
    }

    fn cancel_pending(&self) {
        if let Some(worker) = self
            .inner
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            worker.cancel();
        }
    }

    /// Hand a snapshot of the full set to the backend.
    pub(crate) fn write_back(&self) -> Result<(), StoreError> {
        let (Some(name), Some(adapter)) = (self.inner.name.as_deref(), self.inner.adapter.as_ref())
        else {
            return Ok(());
        };

        let snapshot = self.data();
        let count = snapshot.len();
        match adapter.set(name, snapshot) {
            Ok(()) => {
                debug!(target: "livedoc::storage", name, documents = count, "persisted");
                Ok(())
            }
            Err(err) => {
                let err = StoreError::from(err);
                warn!(target: "livedoc::storage", name, error = %err, "persist failed");
                self.inner.persist_errors.emit(&err);
                Err(err)
            }
        }
    }

    /// Write the current state now and cancel the pending debounced write.
    /// A storage that has not loaded yet has nothing to write.
    pub fn flush(&self) -> Result<(), StoreError> {
        if self.is(Status::Loading) {
            return Ok(());
        }
        self.cancel_pending();
        self.write_back()
    }

    /// Remove the persisted set from the backend and cancel any pending
    /// write. The in-memory documents are left untouched.
    pub fn purge(&self) -> Result<(), StoreError> {
        self.cancel_pending();
        if let (Some(name), Some(adapter)) = (self.inner.name.as_deref(), self.inner.adapter.as_ref()) {
            adapter.del(name)?;
            debug!(target: "livedoc::storage", name, "purged");
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------

    /// Queue an insert. A document without an `id` gets a generated one.
    pub fn insert(&self, document: Document) -> Pending<Document> {
        self.submit(|reply| Operation::Insert { document, reply })
    }

    /// Queue a shallow merge onto the stored document with the same id.
    pub fn update(&self, document: Document) -> Pending<Document> {
        self.submit(|reply| Operation::Update { document, reply })
    }

    /// Queue an update if the id exists, otherwise an insert under that id.
    pub fn upsert(&self, document: Document) -> Pending<Document> {
        self.submit(|reply| Operation::Upsert { document, reply })
    }

    /// Queue a delete. Deleting an absent id still succeeds and still emits.
    pub fn delete(&self, id: impl Into<String>) -> Pending<()> {
        let id = id.into();
        self.submit(|reply| Operation::Delete { id, reply })
    }

    fn submit<T, F>(&self, make: F) -> Pending<T>
    where
        F: FnOnce(Reply<T>) -> Operation,
    {
        let (reply, pending) = completion();
        let operation = make(reply);
        if let Err(err) = self.load() {
            operation.reject(err);
            return pending;
        }

        self.lock_state().queue.push_back(operation);
        self.process();
        pending
    }

    // ------------------------------------------------------------------
    // Processor
    // ------------------------------------------------------------------

    /// Drain the queue unless it is loading or another caller is already
    /// draining; that caller will pick up whatever was queued meanwhile.
    fn process(&self) {
        {
            let mut state = self.lock_state();
            if state.status != Status::Ready || state.queue.is_empty() {
                return;
            }
            state.status = Status::Working;
        }

        loop {
            let operation = {
                let mut state = self.lock_state();
                match state.queue.pop_front() {
                    Some(operation) => operation,
                    None => {
                        state.status = Status::Ready;
                        return;
                    }
                }
            };
            self.commit(operation);
        }
    }

    fn commit(&self, operation: Operation) {
        let kind = operation.kind();
        match operation {
            Operation::Insert { document, reply } => {
                let result = self.apply(kind, |state, config| state.insert(document, config));
                respond(reply, result.map(committed_document));
            }
            Operation::Update { document, reply } => {
                let result = self.apply(kind, |state, _| state.update(document));
                respond(reply, result.map(committed_document));
            }
            Operation::Upsert { document, reply } => {
                let result = self.apply(kind, |state, _| state.upsert(document));
                respond(reply, result.map(committed_document));
            }
            Operation::Delete { id, reply } => {
                let result = self.apply(kind, |state, _| Ok(state.delete(id)));
                respond(reply, result.map(|_| ()));
            }
        }
    }

    fn apply<F>(&self, kind: &'static str, mutate: F) -> Result<Change, StoreError>
    where
        F: FnOnce(&mut State, &StorageConfig) -> Result<Change, StoreError>,
    {
        let committed = {
            let mut state = self.lock_state();
            mutate(&mut state, &self.inner.config)
        };

        match committed {
            Ok(change) => {
                trace!(target: "livedoc::storage", name = ?self.name(), kind, id = change.id(), "committed");
                self.inner.changes.emit(&change);
                self.save();
                Ok(change)
            }
            Err(err) => {
                debug!(target: "livedoc::storage", name = ?self.name(), kind, error = %err, "rejected");
                Err(err)
            }
        }
    }
}

fn committed_document(change: Change) -> Document {
    match change {
        Change::Insert(document) | Change::Update(document) => document,
        Change::Delete { id } => Document::with_id(id),
    }
}

fn respond<T>(reply: Reply<T>, result: Result<T, StoreError>) {
    // The caller may have dropped its handle; the commit stands regardless.
    let _ = reply.send(result);
}

impl fmt::Debug for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Storage")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .field("documents", &self.len())
            .finish()
    }
}
