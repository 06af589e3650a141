use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Produces ids for documents inserted without one.
pub type IdGenerator = Arc<dyn Fn() -> String + Send + Sync>;

/// Quiet period before pending writes are flushed as one backend call.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Extra generation attempts after a generated id collides.
pub const DEFAULT_MAX_ID_RETRIES: u32 = 3;

/// Random, collision-resistant id (UUID v4 without hyphens).
pub fn random_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Tuning for a [`Storage`](super::Storage).
#[derive(Clone)]
pub struct StorageConfig {
    pub debounce: Duration,
    pub max_id_retries: u32,
    pub id_generator: IdGenerator,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            max_id_retries: DEFAULT_MAX_ID_RETRIES,
            id_generator: Arc::new(random_id),
        }
    }
}

impl StorageConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debounce(mut self, window: Duration) -> Self {
        self.debounce = window;
        self
    }

    pub fn max_id_retries(mut self, retries: u32) -> Self {
        self.max_id_retries = retries;
        self
    }

    pub fn id_generator<F>(mut self, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.id_generator = Arc::new(generator);
        self
    }

    pub(crate) fn generate_id(&self) -> String {
        (self.id_generator)()
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageConfig")
            .field("debounce", &self.debounce)
            .field("max_id_retries", &self.max_id_retries)
            .finish_non_exhaustive()
    }
}
