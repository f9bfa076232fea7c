//! The per-browser session value.

use std::collections::HashMap;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;

/// One browser session: an explicit mapping from string slots to string
/// values, loaded at the request boundary and saved back afterwards.
///
/// The middleware core only ever touches named slots (device id, pending
/// request id, CSRF token); the slot names come from the deployment config.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    values: HashMap<String, String>,
    dirty: bool,
}

impl Session {
    /// Create an empty session with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: HashMap::new(),
            dirty: false,
        }
    }

    /// Create a session from previously stored values.
    pub fn from_values(id: impl Into<String>, values: HashMap<String, String>) -> Self {
        Self {
            id: id.into(),
            values,
            dirty: false,
        }
    }

    /// Session id (the cookie value).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Read a slot.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Write a slot.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
        self.dirty = true;
    }

    /// Clear a slot, returning the previous value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let previous = self.values.remove(key);
        if previous.is_some() {
            self.dirty = true;
        }
        previous
    }

    /// Whether any slot changed since the session was loaded.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// The CSRF token for this session, generated on first access.
    ///
    /// Generated exactly once; stable for the session's lifetime afterwards.
    pub fn csrf_token(&mut self, key: &str) -> String {
        if let Some(token) = self.values.get(key) {
            return token.clone();
        }
        let token = generate_token();
        self.set(key, token.clone());
        token
    }

    /// Snapshot of all slots, for persistence.
    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }
}

/// Generate a random URL-safe session token.
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
