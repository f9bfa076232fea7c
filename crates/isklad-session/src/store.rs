//! In-memory session store.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::session::Session;

/// Process-wide store of browser sessions, keyed by session id.
///
/// Sessions are independent across browsers; within one session, concurrent
/// tabs race and the last save wins.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a session by id, if it exists.
    pub async fn load(&self, id: &str) -> Option<Session> {
        let sessions = self.inner.read().await;
        sessions
            .get(id)
            .map(|values| Session::from_values(id, values.clone()))
    }

    /// Create a fresh session with a random id. Not persisted until saved.
    pub fn create(&self) -> Session {
        Session::new(Uuid::new_v4().to_string())
    }

    /// Load the session for a known id, or create a fresh one.
    pub async fn load_or_create(&self, id: Option<&str>) -> Session {
        if let Some(id) = id
            && let Some(session) = self.load(id).await
        {
            return session;
        }
        self.create()
    }

    /// Persist the session's slots.
    pub async fn save(&self, session: &Session) {
        let mut sessions = self.inner.write().await;
        sessions.insert(session.id().to_string(), session.values().clone());
    }

    /// Number of stored sessions.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
