//! Application state management

use std::sync::Arc;

use crate::config::Config;
use crate::repository::MemoryStore;

/// Application state shared across handlers
///
/// Cloning is cheap: the config sits behind an `Arc` and the store is a
/// handle onto shared collections.
#[derive(Debug, Clone)]
pub struct AppState {
    config: Arc<Config>,
    store: MemoryStore,
}

impl AppState {
    pub fn new(config: Config, store: MemoryStore) -> Self {
        Self {
            config: Arc::new(config),
            store,
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the document store
    pub fn store(&self) -> &MemoryStore {
        &self.store
    }
}

impl Default for AppState {
    /// Default config over empty resource collections
    fn default() -> Self {
        Self::new(Config::default(), crate::resources::store())
    }
}
