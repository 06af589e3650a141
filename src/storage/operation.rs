//! Queued mutations and their completion handles.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::{Document, StoreError};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

pub(crate) enum Operation {
    Insert {
        document: Document,
        reply: Reply<Document>,
    },
    Update {
        document: Document,
        reply: Reply<Document>,
    },
    Upsert {
        document: Document,
        reply: Reply<Document>,
    },
    Delete {
        id: String,
        reply: Reply<()>,
    },
}

impl Operation {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Operation::Insert { .. } => "insert",
            Operation::Update { .. } => "update",
            Operation::Upsert { .. } => "upsert",
            Operation::Delete { .. } => "delete",
        }
    }

    /// Resolve the completion handle with `err` without committing.
    pub(crate) fn reject(self, err: StoreError) {
        // A dropped receiver means the caller stopped caring.
        match self {
            Operation::Insert { reply, .. }
            | Operation::Update { reply, .. }
            | Operation::Upsert { reply, .. } => {
                let _ = reply.send(Err(err));
            }
            Operation::Delete { reply, .. } => {
                let _ = reply.send(Err(err));
            }
        }
    }
}

/// Completion handle for one queued operation.
///
/// Resolved exactly once, when the operation is committed or rejected. The
/// operation runs whether or not the handle is ever awaited.
///
/// `Pending` is a `Future`; synchronous callers can use [`Pending::wait`].
#[must_use = "the operation is queued either way; inspect the handle to see whether it failed"]
pub struct Pending<T> {
    rx: oneshot::Receiver<Result<T, StoreError>>,
}

pub(crate) fn completion<T>() -> (Reply<T>, Pending<T>) {
    let (tx, rx) = oneshot::channel();
    (tx, Pending { rx })
}

impl<T> Pending<T> {
    /// Block until the operation resolves. Operations submitted from the
    /// thread that drains the queue are already resolved when this is
    /// called; otherwise it must not run inside an async runtime.
    pub fn wait(mut self) -> Result<T, StoreError> {
        match self.rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Closed) => Err(StoreError::Abandoned),
            Err(oneshot::error::TryRecvError::Empty) => self
                .rx
                .blocking_recv()
                .unwrap_or(Err(StoreError::Abandoned)),
        }
    }

    /// The result if the operation has already resolved.
    pub fn try_result(&mut self) -> Option<Result<T, StoreError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(StoreError::Abandoned)),
        }
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, StoreError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        Pin::new(&mut this.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(StoreError::Abandoned)))
    }
}

impl<T> std::fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}
