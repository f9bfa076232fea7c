//! Middleware configuration and upstream URL builders.

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Wire constants
// ─────────────────────────────────────────────────────────────────────────────

/// Service identifier for the middleware's own sub-routes.
pub const SERVICE_MIDDLEWARE: &str = "middleware";
/// Service identifier for the egon backend.
pub const SERVICE_EGON: &str = "egon";
/// Service identifier for the myorder backend (also the fallback).
pub const SERVICE_MYORDER: &str = "myorder";

/// Sub-route that starts the visible device-identification handshake.
pub const URI_IDENTIFY_DEVICE: &str = "identify-device";
/// Sub-route the identity provider redirects back to.
pub const URI_RECEIVE_DEVICE_IDENTITY: &str = "receive-device-identity";
/// Sub-route that reports the session's current device id.
pub const URI_DEVICE_ID: &str = "device-id";

/// Placeholder the identity provider replaces with the issued device id.
pub const PLACEHOLDER_DEVICE_ID: &str = "{{ISKLAD_DEVICE_ID}}";
/// Placeholder the identity provider replaces with the request id.
pub const PLACEHOLDER_REQUEST_ID: &str = "{{ISKLAD_DEVICE_IDENTITY_REQUEST_ID}}";

const DEFAULT_MYORDER_DOMAIN: &str = "https://myorder.isklad.eu";
const DEFAULT_EGON_DOMAIN: &str = "https://api.isklad.eu";
const DEFAULT_AUTH_DOMAIN: &str = "https://auth.isklad.eu";
const DEFAULT_KEY_DEVICE_ID: &str = "_isklad_deviceId";
const DEFAULT_KEY_REQUEST_ID: &str = "_isklad_deviceIdentityRequestId";
const DEFAULT_KEY_CSRF_TOKEN: &str = "_isklad_csrf_token";
const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

// ─────────────────────────────────────────────────────────────────────────────
// MiddlewareConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Deployment settings for one widget installation.
///
/// One client credential pair per process. The session key names double as
/// the query-parameter names the identity provider substitutes into the
/// redirect-URL template, so changing them changes the wire contract.
#[derive(Debug, Clone)]
pub struct MiddlewareConfig {
    /// Client id issued by the isklad auth app.
    pub client_id: String,
    /// Client secret for the id above.
    pub client_secret: String,
    /// Id of the eshop this installation serves.
    pub eshop_id: i64,
    /// Public URL of the middleware endpoint (redirect target base).
    pub middleware_url: String,
    /// Writable directory for persisted state (cached access token, logs).
    pub data_dir: PathBuf,
    /// Myorder backend.
    pub myorder_domain: String,
    /// Egon backend.
    pub egon_domain: String,
    /// Auth backend.
    pub auth_domain: String,
    /// Session slot / query parameter name for the device id.
    pub key_device_id: String,
    /// Session slot / query parameter name for the pending request id.
    pub key_device_identity_request_id: String,
    /// Session slot name for the CSRF token.
    pub key_csrf_token: String,
    /// Local development only. Never disable CSRF verification in production.
    pub disable_csrf_verification: bool,
    /// Address the server binds to.
    pub bind_address: SocketAddr,
}

impl MiddlewareConfig {
    /// Create a config from the required fields, with defaults for the rest.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        eshop_id: i64,
        middleware_url: impl Into<String>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            eshop_id,
            middleware_url: middleware_url.into(),
            data_dir: data_dir.into(),
            myorder_domain: DEFAULT_MYORDER_DOMAIN.to_string(),
            egon_domain: DEFAULT_EGON_DOMAIN.to_string(),
            auth_domain: DEFAULT_AUTH_DOMAIN.to_string(),
            key_device_id: DEFAULT_KEY_DEVICE_ID.to_string(),
            key_device_identity_request_id: DEFAULT_KEY_REQUEST_ID.to_string(),
            key_csrf_token: DEFAULT_KEY_CSRF_TOKEN.to_string(),
            disable_csrf_verification: false,
            bind_address: DEFAULT_BIND_ADDRESS.parse().unwrap(),
        }
    }

    /// Load the configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse the configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        file.try_into()
    }

    /// Set the auth backend domain.
    pub fn with_auth_domain(mut self, domain: impl Into<String>) -> Self {
        self.auth_domain = domain.into();
        self
    }

    /// Set the myorder backend domain.
    pub fn with_myorder_domain(mut self, domain: impl Into<String>) -> Self {
        self.myorder_domain = domain.into();
        self
    }

    /// Set the egon backend domain.
    pub fn with_egon_domain(mut self, domain: impl Into<String>) -> Self {
        self.egon_domain = domain.into();
        self
    }

    /// Enable or disable CSRF verification (local development only).
    pub fn with_csrf_verification_disabled(mut self, disabled: bool) -> Self {
        self.disable_csrf_verification = disabled;
        self
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Upstream URL builders
    // ─────────────────────────────────────────────────────────────────────────

    /// URL from which to fetch the client access token.
    pub fn client_token_url(&self) -> String {
        format!("{}/auth/access-token", self.auth_domain)
    }

    /// URL where to request a device identification. Secured by client token.
    pub fn device_identity_request_url(&self) -> String {
        format!("{}/api/client/device-identity-request", self.auth_domain)
    }

    /// Identity-provider page that performs the visible identification step.
    pub fn device_identification_url(&self, request_id: &str) -> String {
        format!(
            "{}/web/device/device-identity-request/{}",
            self.auth_domain, request_id
        )
    }

    /// Redirect target the identity provider calls back with the issued
    /// device id and request id substituted for the placeholders.
    pub fn identity_redirect_url_template(&self) -> String {
        format!(
            "{}?service={}&uri={}&{}={}&{}={}",
            self.middleware_url,
            SERVICE_MIDDLEWARE,
            URI_RECEIVE_DEVICE_IDENTITY,
            self.key_device_id,
            PLACEHOLDER_DEVICE_ID,
            self.key_device_identity_request_id,
            PLACEHOLDER_REQUEST_ID,
        )
    }

    /// URL from which the host page fetches the widget script.
    pub fn widget_js_url(&self) -> String {
        format!("{}/widget/cart/shop/{}", self.myorder_domain, self.eshop_id)
    }

    /// Resolve the upstream base domain for a service identifier.
    ///
    /// Unrecognized identifiers fall back to the myorder backend.
    pub fn service_domain(&self, service: &str) -> &str {
        match service {
            SERVICE_EGON => &self.egon_domain,
            _ => &self.myorder_domain,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// On-disk schema
// ─────────────────────────────────────────────────────────────────────────────

/// Raw TOML schema. Required fields are options here so that missing ones
/// surface as `MissingField` instead of a parse error.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    client_id: Option<String>,
    client_secret: Option<String>,
    eshop_id: Option<i64>,
    middleware_url: Option<String>,
    data_dir: Option<PathBuf>,
    myorder_domain: Option<String>,
    egon_domain: Option<String>,
    auth_domain: Option<String>,
    key_device_id: Option<String>,
    key_device_identity_request_id: Option<String>,
    key_csrf_token: Option<String>,
    disable_csrf_verification: Option<bool>,
    bind_address: Option<SocketAddr>,
}

impl TryFrom<ConfigFile> for MiddlewareConfig {
    type Error = ConfigError;

    fn try_from(file: ConfigFile) -> Result<Self> {
        let mut config = MiddlewareConfig::new(
            file.client_id
                .ok_or(ConfigError::MissingField("client_id"))?,
            file.client_secret
                .ok_or(ConfigError::MissingField("client_secret"))?,
            file.eshop_id.ok_or(ConfigError::MissingField("eshop_id"))?,
            file.middleware_url
                .ok_or(ConfigError::MissingField("middleware_url"))?,
            file.data_dir.ok_or(ConfigError::MissingField("data_dir"))?,
        );

        if let Some(domain) = file.myorder_domain {
            config.myorder_domain = domain;
        }
        if let Some(domain) = file.egon_domain {
            config.egon_domain = domain;
        }
        if let Some(domain) = file.auth_domain {
            config.auth_domain = domain;
        }
        if let Some(key) = file.key_device_id {
            config.key_device_id = key;
        }
        if let Some(key) = file.key_device_identity_request_id {
            config.key_device_identity_request_id = key;
        }
        if let Some(key) = file.key_csrf_token {
            config.key_csrf_token = key;
        }
        if let Some(disabled) = file.disable_csrf_verification {
            config.disable_csrf_verification = disabled;
        }
        if let Some(addr) = file.bind_address {
            config.bind_address = addr;
        }

        Ok(config)
    }
}
