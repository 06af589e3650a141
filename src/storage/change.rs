//! Typed change channel.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One committed mutation.
///
/// Insert and update carry the resulting document; delete carries only the
/// id, whether or not a document was present.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Insert(Document),
    Update(Document),
    Delete { id: String },
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::Insert(_) => ChangeKind::Insert,
            Change::Update(_) => ChangeKind::Update,
            Change::Delete { .. } => ChangeKind::Delete,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Change::Insert(document) | Change::Update(document) => {
                document.id().unwrap_or_default()
            }
            Change::Delete { id } => id,
        }
    }

    pub fn document(&self) -> Option<&Document> {
        match self {
            Change::Insert(document) | Change::Update(document) => Some(document),
            Change::Delete { .. } => None,
        }
    }
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Listener registry. Emission runs callbacks outside the registry lock, so
/// callbacks may register or remove listeners.
pub(crate) struct Listeners<E> {
    next_id: AtomicU64,
    entries: Mutex<Vec<(u64, Callback<E>)>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }
}

impl<E> Listeners<E> {
    pub(crate) fn add<F>(&self, callback: F) -> u64
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((id, Arc::new(callback)));
        }
        id
    }

    pub(crate) fn remove(&self, id: u64) -> bool {
        match self.entries.lock() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|(entry, _)| *entry != id);
                entries.len() != before
            }
            Err(_) => false,
        }
    }

    pub(crate) fn emit(&self, event: &E) {
        let snapshot: Vec<Callback<E>> = match self.entries.lock() {
            Ok(entries) => entries.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            Err(_) => return,
        };
        for callback in snapshot {
            callback(event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }
}

/// Handle returned by every `subscribe`/`on_*` call.
///
/// Dropping the handle keeps the listener registered; call
/// [`Subscription::unsubscribe`] to detach it.
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub(crate) fn new<F>(detach: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// Remove the listener. No callback fires after this returns, except one
    /// that is already running on another thread.
    pub fn unsubscribe(mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.detach.is_some())
            .finish()
    }
}
