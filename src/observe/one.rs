use std::sync::{Arc, Mutex, PoisonError};

use super::{Attachment, Feed};
use crate::collection::Collection;
use crate::query::Criteria;
use crate::storage::{Change, Subscription};
use crate::{Document, StoreError};

type DocumentCallback = Arc<dyn Fn(Option<&Document>) + Send + Sync>;

struct Shared {
    source: Collection,
    criteria: Mutex<Criteria>,
    callback: Mutex<Option<DocumentCallback>>,
    attachment: Mutex<Option<Attachment>>,
}

impl Shared {
    fn detach(&self) {
        let attachment = self
            .attachment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(attachment) = attachment {
            attachment.detach();
        }
    }
}

/// Live view of a single document matching a criteria.
///
/// The subscriber receives the current match, or `None` once the tracked
/// document is deleted or stops matching.
#[derive(Clone)]
pub struct ObserverOne {
    shared: Arc<Shared>,
}

impl ObserverOne {
    pub(crate) fn new(source: Collection, criteria: Criteria) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                criteria: Mutex::new(criteria),
                callback: Mutex::new(None),
                attachment: Mutex::new(None),
            }),
        }
    }

    pub fn criteria(&self) -> Criteria {
        self.shared
            .criteria
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription, StoreError>
    where
        F: Fn(Option<&Document>) + Send + Sync + 'static,
    {
        *self
            .shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
        self.attach()?;

        let shared = Arc::downgrade(&self.shared);
        Ok(Subscription::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.detach();
                *shared
                    .callback
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = None;
            }
        }))
    }

    pub fn filter(&self, criteria: Criteria) -> Result<(), StoreError> {
        *self
            .shared
            .criteria
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = criteria;
        self.attach()
    }

    fn attach(&self) -> Result<(), StoreError> {
        let attached = self.try_attach();
        if attached.is_err() {
            self.shared.detach();
        }
        attached
    }

    fn try_attach(&self) -> Result<(), StoreError> {
        let callback = self
            .shared
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(callback) = callback else {
            return Ok(());
        };

        let criteria = self.criteria();
        let current = Arc::new(Mutex::new(None::<String>));
        let feed = Arc::new(Feed::new());

        let listener = {
            let feed = Arc::clone(&feed);
            let current = Arc::clone(&current);
            let criteria = criteria.clone();
            let callback = Arc::clone(&callback);
            self.shared.source.on_change(move |change| {
                if !feed.admit(change) {
                    return;
                }
                if let Some(next) = track(&current, &criteria, change) {
                    if !feed.is_closed() {
                        callback(next);
                    }
                }
            })
        };

        let previous = self
            .shared
            .attachment
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Attachment {
                feed: Arc::clone(&feed),
                listener,
            });
        if let Some(previous) = previous {
            previous.detach();
        }

        let initial = self.shared.source.find_one(&criteria)?;
        *current.lock().unwrap_or_else(PoisonError::into_inner) =
            initial.as_ref().and_then(Document::id).map(str::to_string);
        if !feed.is_closed() {
            callback(initial.as_ref());
        }

        while let Some(buffered) = feed.drain() {
            for change in &buffered {
                if let Some(next) = track(&current, &criteria, change) {
                    if !feed.is_closed() {
                        callback(next);
                    }
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ObserverOne {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverOne")
            .field("collection", &self.shared.source.name())
            .field("criteria", &self.criteria())
            .finish()
    }
}

/// What to deliver for `change`, if anything. A matching document becomes
/// the tracked one; the tracked document leaving or disappearing yields
/// `Some(None)`.
fn track<'c>(
    current: &Mutex<Option<String>>,
    criteria: &Criteria,
    change: &'c Change,
) -> Option<Option<&'c Document>> {
    let mut current = current.lock().unwrap_or_else(PoisonError::into_inner);
    match change {
        Change::Insert(document) | Change::Update(document) => {
            let id = document.id()?;
            if criteria.test(document) {
                *current = Some(id.to_string());
                Some(Some(document))
            } else if current.as_deref() == Some(id) {
                *current = None;
                Some(None)
            } else {
                None
            }
        }
        Change::Delete { id } => {
            if current.as_deref() == Some(id.as_str()) {
                *current = None;
                Some(None)
            } else {
                None
            }
        }
    }
}
