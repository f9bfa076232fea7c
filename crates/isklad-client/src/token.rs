//! Access-token persistence and lifecycle.
//!
//! One bearer token per configured client, cached in a durable slot and
//! refreshed ahead of expiry so it never goes stale mid-flight on an
//! upstream call.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use isklad_config::MiddlewareConfig;

use crate::client::{DEFAULT_TIMEOUT, decode_response};
use crate::error::{Error, Result};

/// Token file name within the middleware data directory.
pub const TOKEN_FILE: &str = "client-token.json";

/// Tokens expiring within this margin are treated as stale and refreshed
/// pre-emptively.
const REFRESH_MARGIN_HOURS: i64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// StoredToken
// ─────────────────────────────────────────────────────────────────────────────

/// The cached access token, in the upstream wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    /// Opaque bearer string.
    pub access_token: String,
    /// Absolute expiry timestamp.
    pub expire_at: DateTime<Utc>,
}

impl Default for StoredToken {
    /// An empty token expiring at the epoch, so the first use always
    /// triggers a refresh.
    fn default() -> Self {
        Self {
            access_token: String::new(),
            expire_at: DateTime::UNIX_EPOCH,
        }
    }
}

impl StoredToken {
    /// Whether the token is still usable at `now`: its expiry must be
    /// strictly later than `now` plus the refresh margin.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.expire_at > now + Duration::hours(REFRESH_MARGIN_HOURS)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TokenStore
// ─────────────────────────────────────────────────────────────────────────────

/// Durable slot for the cached token. No business logic: load and save only.
#[async_trait]
pub trait TokenStore: Send + Sync + std::fmt::Debug {
    /// Read the last persisted token. A missing slot yields the default
    /// (already-expired) token, not an error.
    async fn load(&self) -> Result<StoredToken>;

    /// Persist a freshly fetched token, superseding the previous one.
    async fn save(&self, token: &StoredToken) -> Result<()>;
}

/// Shared token store handle.
pub type SharedTokenStore = Arc<dyn TokenStore>;

// ─────────────────────────────────────────────────────────────────────────────
// FileTokenStore
// ─────────────────────────────────────────────────────────────────────────────

/// JSON-file-backed token store for production use.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    /// Create a store writing to `client-token.json` under the data dir.
    pub fn new(data_dir: &Path) -> Self {
        Self {
            path: data_dir.join(TOKEN_FILE),
        }
    }

    /// The token file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<StoredToken> {
        if !self.path.exists() {
            return Ok(StoredToken::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .map_err(|e| Error::TokenStore(format!("failed to read token file: {}", e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::TokenStore(format!("failed to parse token file: {}", e)))
    }

    async fn save(&self, token: &StoredToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::TokenStore(format!("failed to create data dir: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(token)
            .map_err(|e| Error::TokenStore(format!("failed to serialize token: {}", e)))?;
        std::fs::write(&self.path, json)
            .map_err(|e| Error::TokenStore(format!("failed to write token file: {}", e)))?;
        tracing::debug!(path = %self.path.display(), "access token persisted");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryTokenStore
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory token store for tests.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: RwLock<StoredToken>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: StoredToken) -> Self {
        Self {
            token: RwLock::new(token),
        }
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<StoredToken> {
        Ok(self.token.read().await.clone())
    }

    async fn save(&self, token: &StoredToken) -> Result<()> {
        *self.token.write().await = token.clone();
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// TokenManager
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for the access-token endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
}

/// Decides whether the cached token is still usable and fetches a fresh one
/// when it is not.
///
/// Exclusively owns the token lifecycle; callers only ever see the current
/// valid bearer string.
#[derive(Debug)]
pub struct TokenManager {
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    store: SharedTokenStore,
    /// Serializes the check-refresh-persist sequence so concurrent callers
    /// share a single upstream fetch.
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    /// Create a manager for the configured client credentials.
    pub fn new(config: &MiddlewareConfig, store: SharedTokenStore, http: reqwest::Client) -> Self {
        Self {
            http,
            token_url: config.client_token_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            store,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Get a valid access token, refreshing it through the auth endpoint
    /// when the cached one is stale.
    ///
    /// A failed refresh propagates without touching the stored token, so the
    /// next call retries immediately. No retries happen here.
    pub async fn get_valid_token(&self) -> Result<String> {
        let stored = self.store.load().await?;
        if stored.is_usable(Utc::now()) {
            return Ok(stored.access_token);
        }

        let _guard = self.refresh_lock.lock().await;

        // Re-check: another caller may have refreshed while we waited.
        let stored = self.store.load().await?;
        if stored.is_usable(Utc::now()) {
            return Ok(stored.access_token);
        }

        tracing::info!("access token stale, refreshing");
        let fresh = self.fetch_access_token().await?;
        // Persist before serving: a crash here only costs a refetch on the
        // next boot, never a stale token.
        self.store.save(&fresh).await?;
        Ok(fresh.access_token)
    }

    /// Fetch a fresh token from the auth endpoint with client credentials.
    ///
    /// Issued bare: the token request itself cannot carry a bearer.
    async fn fetch_access_token(&self) -> Result<StoredToken> {
        let body = TokenRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
        };
        let response = self
            .http
            .post(&self.token_url)
            .json(&body)
            .timeout(DEFAULT_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        decode_response(response).await
    }
}
