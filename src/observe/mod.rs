//! Live queries.
//!
//! An [`Observer`] keeps a private mirror storage holding exactly the
//! documents that currently match its criteria, and maintains it from the
//! source collection's change events instead of re-running the query. An
//! [`ObserverOne`] tracks a single matching document without a mirror.
//!
//! Events that arrive while the initial snapshot is being built are held
//! back and replayed in order once the snapshot has been delivered.

mod observer;
mod one;

use std::sync::{Mutex, PoisonError};

use crate::storage::{Change, Subscription};

pub use observer::Observer;
pub use one::ObserverOne;

enum Phase {
    Buffering(Vec<Change>),
    Live,
    Closed,
}

/// Gate between the source's change listener and the subscriber.
struct Feed {
    phase: Mutex<Phase>,
}

impl Feed {
    fn new() -> Self {
        Self {
            phase: Mutex::new(Phase::Buffering(Vec::new())),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if `change` should be applied now; otherwise it was buffered
    /// or the feed is closed.
    fn admit(&self, change: &Change) -> bool {
        match &mut *self.lock() {
            Phase::Buffering(pending) => {
                pending.push(change.clone());
                false
            }
            Phase::Live => true,
            Phase::Closed => false,
        }
    }

    /// Take the buffered events. Once nothing is left the feed goes live and
    /// `None` is returned.
    fn drain(&self) -> Option<Vec<Change>> {
        let mut phase = self.lock();
        match &mut *phase {
            Phase::Buffering(pending) if !pending.is_empty() => Some(std::mem::take(pending)),
            Phase::Buffering(_) => {
                *phase = Phase::Live;
                None
            }
            Phase::Live | Phase::Closed => None,
        }
    }

    fn close(&self) {
        *self.lock() = Phase::Closed;
    }

    fn is_closed(&self) -> bool {
        matches!(*self.lock(), Phase::Closed)
    }
}

/// One installed change listener and its feed.
struct Attachment {
    feed: std::sync::Arc<Feed>,
    listener: Subscription,
}

impl Attachment {
    fn detach(self) {
        self.feed.close();
        self.listener.unsubscribe();
    }
}
