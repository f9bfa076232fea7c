//! Application state shared across handlers.

use std::sync::Arc;

use isklad_client::{FileTokenStore, IskladClient, SharedTokenStore};
use isklad_config::MiddlewareConfig;
use isklad_session::SessionStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Deployment configuration.
    pub config: Arc<MiddlewareConfig>,
    /// Upstream API client (token lifecycle included).
    pub client: IskladClient,
    /// In-memory browser session store.
    pub sessions: SessionStore,
}

impl AppState {
    /// Create state with the token cached in a file under the data dir.
    pub fn new(config: MiddlewareConfig) -> Self {
        let store: SharedTokenStore = Arc::new(FileTokenStore::new(&config.data_dir));
        Self::with_token_store(config, store)
    }

    /// Create state with a custom token store.
    pub fn with_token_store(config: MiddlewareConfig, store: SharedTokenStore) -> Self {
        let config = Arc::new(config);
        let client = IskladClient::new(Arc::clone(&config), store);
        Self {
            config,
            client,
            sessions: SessionStore::new(),
        }
    }
}
