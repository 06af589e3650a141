//! Collections - an explicit registry of named collections, owned by the
//! application and passed to whoever needs it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use super::{Collection, Model, Settings};
use crate::StoreError;

/// Name-keyed collection registry. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct Collections {
    entries: Arc<RwLock<HashMap<String, Collection>>>,
}

impl Collections {
    pub fn new() -> Self {
        Self::default()
    }

    /// The registered collection for `name`, created from `settings` if
    /// there is none yet. `settings` is ignored for an existing collection.
    pub fn get_or_create(&self, name: &str, settings: Settings) -> Result<Collection, StoreError> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("collections get_or_create"))?;

        if let Some(existing) = entries.get(name) {
            return Ok(existing.clone());
        }

        let collection = Collection::new(name, settings);
        entries.insert(name.to_string(), collection.clone());
        debug!(target: "livedoc::collection", collection = name, "registered");
        Ok(collection)
    }

    /// Register a fresh collection under `name`, replacing any existing one.
    /// Existing handles to the replaced collection keep working on their own.
    pub fn set(&self, name: &str, settings: Settings) -> Result<Collection, StoreError> {
        let collection = Collection::new(name, settings);
        self.entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("collections set"))?
            .insert(name.to_string(), collection.clone());
        debug!(target: "livedoc::collection", collection = name, "registered (replace)");
        Ok(collection)
    }

    pub fn get(&self, name: &str) -> Result<Option<Collection>, StoreError> {
        Ok(self
            .entries
            .read()
            .map_err(|_| StoreError::LockPoisoned("collections get"))?
            .get(name)
            .cloned())
    }

    pub fn remove(&self, name: &str) -> Result<Option<Collection>, StoreError> {
        Ok(self
            .entries
            .write()
            .map_err(|_| StoreError::LockPoisoned("collections remove"))?
            .remove(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Result<Vec<String>, StoreError> {
        let mut names: Vec<String> = self
            .entries
            .read()
            .map_err(|_| StoreError::LockPoisoned("collections names"))?
            .keys()
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    /// The collection for `M`, keyed by `M::COLLECTION`.
    pub fn collection<M: Model>(&self, settings: Settings) -> Result<Collection, StoreError> {
        self.get_or_create(M::COLLECTION, settings)
    }
}

impl std::fmt::Debug for Collections {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collections")
            .field("names", &self.names().unwrap_or_default())
            .finish()
    }
}
