use std::fmt;

use crate::adapter::AdapterError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Insert targeted an id that is already present.
    DuplicateDocument { id: String },
    /// Update targeted an id that is not present.
    DocumentNotFound { id: String },
    /// `find_by` was called with a field that has no index.
    NonIndexedKey { key: String },
    /// Update or upsert without a string `id` field.
    MissingId,
    /// The value is not a JSON object.
    InvalidDocument(String),
    Adapter(AdapterError),
    Serde(String),
    LockPoisoned(&'static str),
    /// The completion handle was dropped before the operation resolved.
    Abandoned,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateDocument { id } => write!(
                f,
                "Collection Insert Violation: Document '{}' already exists",
                id
            ),
            StoreError::DocumentNotFound { id } => write!(
                f,
                "Collection Update Violation: Document '{}' does not exist",
                id
            ),
            StoreError::NonIndexedKey { key } => {
                write!(f, "cannot look up by non-indexed key '{}'", key)
            }
            StoreError::MissingId => write!(f, "document is missing a string 'id' field"),
            StoreError::InvalidDocument(message) => write!(f, "invalid document: {}", message),
            StoreError::Adapter(err) => write!(f, "persistence error: {}", err),
            StoreError::Serde(message) => write!(f, "serialization error: {}", message),
            StoreError::LockPoisoned(operation) => {
                write!(f, "storage lock poisoned during {}", operation)
            }
            StoreError::Abandoned => write!(f, "operation was abandoned before it resolved"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Adapter(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AdapterError> for StoreError {
    fn from(err: AdapterError) -> Self {
        StoreError::Adapter(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serde(err.to_string())
    }
}
