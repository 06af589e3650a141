use std::fmt;
use std::sync::Arc;

use crate::adapter::StorageAdapter;
use crate::StorageConfig;

/// Construction options for a [`Collection`](super::Collection).
#[derive(Clone, Default)]
pub struct Settings {
    /// Persistence backend. Without one the collection lives only in memory.
    pub adapter: Option<Arc<dyn StorageAdapter>>,
    /// Fields maintained in the equality index.
    pub indexes: Vec<String>,
    pub storage: StorageConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn adapter<A: StorageAdapter + 'static>(mut self, adapter: A) -> Self {
        self.adapter = Some(Arc::new(adapter));
        self
    }

    pub fn shared_adapter(mut self, adapter: Arc<dyn StorageAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }

    pub fn index(mut self, key: impl Into<String>) -> Self {
        self.indexes.push(key.into());
        self
    }

    pub fn storage(mut self, config: StorageConfig) -> Self {
        self.storage = config;
        self
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("adapter", &self.adapter.is_some())
            .field("indexes", &self.indexes)
            .field("storage", &self.storage)
            .finish()
    }
}
