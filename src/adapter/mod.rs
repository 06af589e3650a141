//! Persistence backends.
//!
//! The storage layer treats a backend as an opaque blob store keyed by
//! collection name: `get` returns the whole persisted set, `set` replaces it,
//! `del` removes it. Absence of data is never an error.

mod file;
mod instance;

use std::fmt;
use std::sync::Arc;

use crate::Document;

pub use file::FileAdapter;
pub use instance::InstanceAdapter;

/// Error type for persistence backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// I/O failure while reading or writing.
    Io(String),
    /// Persisted data could not be encoded or decoded.
    Serde(String),
    LockPoisoned(&'static str),
    /// Backend-specific failure.
    Backend(String),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::Io(msg) => write!(f, "adapter i/o error: {}", msg),
            AdapterError::Serde(msg) => write!(f, "adapter serialization error: {}", msg),
            AdapterError::LockPoisoned(operation) => {
                write!(f, "adapter lock poisoned during {}", operation)
            }
            AdapterError::Backend(msg) => write!(f, "adapter backend error: {}", msg),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Durable store for named document sets.
pub trait StorageAdapter: Send + Sync {
    /// Full persisted set for `name`, empty if nothing was stored.
    fn get(&self, name: &str) -> Result<Vec<Document>, AdapterError>;

    /// Replace the persisted set for `name`.
    fn set(&self, name: &str, documents: Vec<Document>) -> Result<(), AdapterError>;

    /// Remove everything persisted for `name`.
    fn del(&self, name: &str) -> Result<(), AdapterError>;
}

impl<A: StorageAdapter + ?Sized> StorageAdapter for Arc<A> {
    fn get(&self, name: &str) -> Result<Vec<Document>, AdapterError> {
        (**self).get(name)
    }

    fn set(&self, name: &str, documents: Vec<Document>) -> Result<(), AdapterError> {
        (**self).set(name, documents)
    }

    fn del(&self, name: &str) -> Result<(), AdapterError> {
        (**self).del(name)
    }
}
