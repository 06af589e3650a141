//! livedoc - an embeddable in-memory document store.
//!
//! Documents are schema-free JSON objects with a string `id`. Each named
//! [`Collection`] is backed by a [`Storage`] that commits mutations one at a
//! time in submission order, keeps an optional equality [`Index`] in step
//! with every commit, writes the full set back to a [`StorageAdapter`] after
//! a quiet period, and publishes a typed [`Change`] for every commit. Live
//! queries ([`Observer`], [`ObserverOne`]) are maintained incrementally from
//! those changes.

extern crate self as livedoc;

mod adapter;
mod collection;
mod document;
mod error;
mod index;
mod observe;
mod query;
mod storage;

pub use adapter::{AdapterError, FileAdapter, InstanceAdapter, StorageAdapter};
pub use collection::{Collection, Collections, Model, ModelCollection, Settings};
pub use document::{Document, Fields, ID_FIELD};
pub use error::StoreError;
pub use index::{Index, Postings};
pub use observe::{Observer, ObserverOne};
pub use query::{compare, values_equal, Criteria, Cursor, QueryOptions, SortOrder};
pub use storage::{
    random_id, Change, ChangeKind, IdGenerator, Pending, Status, Storage, StorageBuilder,
    StorageConfig, Subscription, DEFAULT_DEBOUNCE, DEFAULT_MAX_ID_RETRIES,
};

// Derive macro shares the trait's name, like serde's Serialize.
#[cfg(feature = "derive")]
pub use livedoc_macros::Model;
