use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use super::{Attachment, Feed};
use crate::collection::Collection;
use crate::query::{Criteria, Cursor, QueryOptions};
use crate::storage::{Change, Storage, Subscription};
use crate::{Document, StoreError};

type ResultCallback = Arc<dyn Fn(&[Document]) + Send + Sync>;

struct Query {
    criteria: Criteria,
    options: QueryOptions,
}

struct Shared {
    source: Collection,
    query: Mutex<Query>,
    callback: Mutex<Option<ResultCallback>>,
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

/// Live result set of a criteria + options pair over one collection.
///
/// The subscriber receives the full, reshaped result set after the initial
/// query and after every change that altered it.
#[derive(Clone)]
pub struct Observer {
    shared: Arc<Shared>,
}

impl Observer {
    pub(crate) fn new(source: Collection, criteria: Criteria, options: QueryOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                query: Mutex::new(Query { criteria, options }),
                callback: Mutex::new(None),
                attachment: Mutex::new(None),
            }),
        }
    }

    pub fn criteria(&self) -> Criteria {
        self.lock_query().criteria.clone()
    }

    pub fn options(&self) -> QueryOptions {
        self.lock_query().options.clone()
    }

    fn lock_query(&self) -> std::sync::MutexGuard<'_, Query> {
        self.shared
            .query
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Start delivering result sets to `callback`. The first delivery is
    /// the initial snapshot and happens before this returns.
    pub fn subscribe<F>(&self, callback: F) -> Result<Subscription, StoreError>
    where
        F: Fn(&[Document]) + Send + Sync + 'static,
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

    /// Swap the criteria and options. An active subscription is re-attached
    /// with the same callback and receives a fresh snapshot.
    pub fn filter(&self, criteria: Criteria, options: QueryOptions) -> Result<(), StoreError> {
        {
            let mut query = self.lock_query();
            query.criteria = criteria;
            query.options = options;
        }
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

        let (criteria, options) = {
            let query = self.lock_query();
            (query.criteria.clone(), query.options.clone())
        };
        let mirror = Storage::ephemeral();
        let feed = Arc::new(Feed::new());

        let listener = {
            let feed = Arc::clone(&feed);
            let mirror = mirror.clone();
            let criteria = criteria.clone();
            let options = options.clone();
            let callback = Arc::clone(&callback);
            self.shared.source.on_change(move |change| {
                if !feed.admit(change) {
                    return;
                }
                match apply(&mirror, &criteria, change) {
                    Ok(true) if !feed.is_closed() => callback(&shaped(&mirror, &options)),
                    Ok(_) => {}
                    Err(err) => warn!(
                        target: "livedoc::observe",
                        error = %err,
                        "live query could not apply change"
                    ),
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

        for document in self.shared.source.find(&criteria)? {
            mirror.upsert(document).wait()?;
        }
        if !feed.is_closed() {
            callback(&shaped(&mirror, &options));
        }

        while let Some(buffered) = feed.drain() {
            for change in &buffered {
                if apply(&mirror, &criteria, change)? && !feed.is_closed() {
                    callback(&shaped(&mirror, &options));
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Observer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let query = self.lock_query();
        f.debug_struct("Observer")
            .field("collection", &self.shared.source.name())
            .field("criteria", &query.criteria)
            .field("options", &query.options)
            .finish()
    }
}

/// Bring the mirror in line with one source change. Returns whether the
/// matching set changed.
fn apply(mirror: &Storage, criteria: &Criteria, change: &Change) -> Result<bool, StoreError> {
    match change {
        Change::Insert(document) => {
            if !criteria.test(document) {
                return Ok(false);
            }
            mirror.upsert(document.clone()).wait()?;
            Ok(true)
        }
        Change::Update(document) => {
            let id = document.require_id()?;
            match (mirror.has(id), criteria.test(document)) {
                // still matches, or newly matches
                (true, true) | (false, true) => {
                    mirror.upsert(document.clone()).wait()?;
                    Ok(true)
                }
                // left the result set
                (true, false) => {
                    mirror.delete(id).wait()?;
                    Ok(true)
                }
                (false, false) => Ok(false),
            }
        }
        Change::Delete { id } => {
            if !mirror.has(id) {
                return Ok(false);
            }
            mirror.delete(id.as_str()).wait()?;
            Ok(true)
        }
    }
}

fn shaped(mirror: &Storage, options: &QueryOptions) -> Vec<Document> {
    Cursor::new(mirror.data()).with_options(options).all()
}
