//! Debounced write-back worker.
//!
//! One background thread per named storage, started on the first save. Each
//! `touch` restarts the quiet period; when it elapses without another touch
//! the worker snapshots the storage and hands the full set to the backend
//! once. The worker only holds a weak reference, so dropping the storage
//! disconnects the channel and releases any pending write.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::Weak;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::{Inner, Storage};

enum Signal {
    Dirty,
    Cancel,
}

pub(crate) struct PersistWorker {
    tx: Sender<Signal>,
}

impl PersistWorker {
    /// Spawn the worker thread. Returns `None` if the thread could not be
    /// started; the caller then writes synchronously.
    pub(crate) fn spawn(storage: Weak<Inner>, name: &str, window: Duration) -> Option<Self> {
        let (tx, rx) = channel::<Signal>();

        let spawned = thread::Builder::new()
            .name(format!("livedoc-persist-{}", name))
            .spawn(move || loop {
                // Idle until something is committed.
                match rx.recv() {
                    Ok(Signal::Dirty) => {}
                    Ok(Signal::Cancel) => continue,
                    Err(_) => return,
                }

                let fire = loop {
                    match rx.recv_timeout(window) {
                        Ok(Signal::Dirty) => continue,
                        Ok(Signal::Cancel) => break false,
                        Err(RecvTimeoutError::Timeout) => break true,
                        Err(RecvTimeoutError::Disconnected) => return,
                    }
                };

                if fire {
                    let Some(inner) = storage.upgrade() else {
                        return;
                    };
                    let _ = Storage::from_inner(inner).write_back();
                }
            });

        match spawned {
            Ok(_) => {
                debug!(target: "livedoc::storage", name, ?window, "persist worker started");
                Some(Self { tx })
            }
            Err(err) => {
                warn!(target: "livedoc::storage", name, error = %err, "could not start persist worker");
                None
            }
        }
    }

    /// Restart the quiet period.
    pub(crate) fn touch(&self) {
        let _ = self.tx.send(Signal::Dirty);
    }

    /// Drop the pending write, if any.
    pub(crate) fn cancel(&self) {
        let _ = self.tx.send(Signal::Cancel);
    }
}
