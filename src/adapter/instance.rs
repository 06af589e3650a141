//! InstanceAdapter - HashMap-backed backend for tests and single-process use.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::{AdapterError, StorageAdapter};
use crate::Document;

/// In-memory backend keyed by collection name.
///
/// Clone-friendly via Arc: clones share the same map, so a clone can be kept
/// to inspect what a storage persisted.
#[derive(Clone, Default)]
pub struct InstanceAdapter {
    cache: Arc<RwLock<HashMap<String, Vec<Document>>>>,
}

impl InstanceAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection, e.g. to simulate data from a previous session.
    pub fn with_documents(self, name: &str, documents: Vec<Document>) -> Self {
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(name.to_string(), documents);
        }
        self
    }

    /// Names that currently hold persisted data.
    pub fn names(&self) -> Vec<String> {
        self.cache
            .read()
            .map(|cache| cache.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl StorageAdapter for InstanceAdapter {
    fn get(&self, name: &str) -> Result<Vec<Document>, AdapterError> {
        let cache = self
            .cache
            .read()
            .map_err(|_| AdapterError::LockPoisoned("get"))?;
        Ok(cache.get(name).cloned().unwrap_or_default())
    }

    fn set(&self, name: &str, documents: Vec<Document>) -> Result<(), AdapterError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| AdapterError::LockPoisoned("set"))?;
        cache.insert(name.to_string(), documents);
        Ok(())
    }

    fn del(&self, name: &str) -> Result<(), AdapterError> {
        let mut cache = self
            .cache
            .write()
            .map_err(|_| AdapterError::LockPoisoned("del"))?;
        cache.remove(name);
        Ok(())
    }
}
