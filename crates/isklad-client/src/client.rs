//! Upstream API client.
//!
//! Thin transport wrapper: attaches the JSON content type and the current
//! bearer token to every outbound call and normalizes responses into either
//! parsed JSON or a typed error.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;
use serde_json::Value;

use isklad_config::MiddlewareConfig;

use crate::error::{Error, Result};
use crate::token::{SharedTokenStore, TokenManager};

/// Timeout applied to every upstream request.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Request body for the device-identity-request endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceIdentityRequestBody {
    redirect_url_template: String,
}

/// Client for the upstream Isklad APIs.
///
/// Cheap to clone; the underlying HTTP pool and token manager are shared.
#[derive(Debug, Clone)]
pub struct IskladClient {
    http: reqwest::Client,
    config: Arc<MiddlewareConfig>,
    tokens: Arc<TokenManager>,
}

impl IskladClient {
    /// Create a client for the configured upstreams, caching tokens in the
    /// given store.
    pub fn new(config: Arc<MiddlewareConfig>, store: SharedTokenStore) -> Self {
        let http = reqwest::Client::new();
        let tokens = Arc::new(TokenManager::new(&config, store, http.clone()));
        Self {
            http,
            config,
            tokens,
        }
    }

    /// The shared token manager.
    pub fn token_manager(&self) -> Arc<TokenManager> {
        Arc::clone(&self.tokens)
    }

    /// GET a JSON resource.
    pub async fn get(&self, url: &str) -> Result<Value> {
        self.request(Method::GET, url, None).await
    }

    /// POST a structured value, JSON-encoded.
    pub async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<Value> {
        let raw = serde_json::to_string(body).map_err(|e| Error::Decode(e.to_string()))?;
        self.request(Method::POST, url, Some(raw)).await
    }

    /// Send a request with an arbitrary method and an optional pre-encoded
    /// body.
    ///
    /// The body is forwarded unchanged, so proxied browser payloads are
    /// never double-encoded.
    pub async fn request(&self, method: Method, url: &str, body: Option<String>) -> Result<Value> {
        let token = self.tokens.get_valid_token().await?;

        let mut request = self
            .http
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(DEFAULT_TIMEOUT);
        if !token.is_empty() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;
        decode_response(response).await
    }

    /// Request a new device-identity handshake from the identity provider.
    ///
    /// Returns the request id that correlates the upcoming redirect/callback
    /// pair with this session.
    pub async fn request_device_identity(&self) -> Result<String> {
        let body = DeviceIdentityRequestBody {
            redirect_url_template: self.config.identity_redirect_url_template(),
        };
        let response = self
            .post(&self.config.device_identity_request_url(), &body)
            .await?;
        response
            .get("deviceIdentityRequest")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Decode("missing deviceIdentityRequest in response".to_string()))
    }
}

/// Normalize an upstream response.
///
/// Status >= 400 becomes `Error::Status` carrying the `error` field from the
/// body when present. A success status with a non-JSON body is a protocol
/// violation and fails with `Error::Decode` rather than an empty result.
pub(crate) async fn decode_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T> {
    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    if status.as_u16() >= 400 {
        let message = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|body| {
                body.get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_default();
        return Err(Error::Status {
            code: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&text).map_err(|e| Error::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::{MemoryTokenStore, StoredToken};
    use chrono::{Duration as ChronoDuration, Utc};
    use wiremock::matchers::{body_json, body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server_uri: &str) -> IskladClient {
        let config = Arc::new(
            MiddlewareConfig::new("client-1", "s3cret", 42, "https://shop.example/mw", "/tmp")
                .with_auth_domain(server_uri),
        );
        let store = Arc::new(MemoryTokenStore::with_token(StoredToken {
            access_token: "bearer-1".to_string(),
            expire_at: Utc::now() + ChronoDuration::hours(24),
        }));
        IskladClient::new(config, store)
    }

    #[tokio::test]
    async fn test_get_attaches_token_and_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(header("authorization", "Bearer bearer-1"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let body = client.get(&format!("{}/items", server.uri())).await.unwrap();
        assert_eq!(body, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_error_status_carries_upstream_error_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({"error": "not found"})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .get(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.http_code(), 404);
        assert_eq!(err.to_string(), "Request failed with status 404. not found");
    }

    #[tokio::test]
    async fn test_error_status_without_error_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/boom"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .get(&format!("{}/boom", server.uri()))
            .await
            .unwrap_err();
        assert_eq!(err.http_code(), 500);
        assert_eq!(err.to_string(), "Request failed with status 500. ");
    }

    #[tokio::test]
    async fn test_non_json_success_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>hello</html>"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client
            .get(&format!("{}/html", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
        assert_eq!(err.http_code(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_uses_zero_sentinel() {
        // Bind a port, then drop the listener so connections are refused.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let server = MockServer::start().await;
        let client = test_client(&server.uri());
        let err = client
            .get(&format!("http://127.0.0.1:{}/anything", port))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Transport(_)));
        assert_eq!(err.http_code(), 0);
    }

    #[tokio::test]
    async fn test_raw_body_passes_through_unchanged() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/cart"))
            .and(body_string("{\"qty\": 2}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"qty": 2})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let body = client
            .request(
                Method::PUT,
                &format!("{}/cart", server.uri()),
                Some("{\"qty\": 2}".to_string()),
            )
            .await
            .unwrap();
        assert_eq!(body, serde_json::json!({"qty": 2}));
    }

    #[tokio::test]
    async fn test_request_device_identity() {
        let server = MockServer::start().await;
        let client = test_client(&server.uri());
        Mock::given(method("POST"))
            .and(path("/api/client/device-identity-request"))
            .and(header("authorization", "Bearer bearer-1"))
            .and(body_json(serde_json::json!({
                "redirectUrlTemplate":
                    "https://shop.example/mw?service=middleware&uri=receive-device-identity\
                     &_isklad_deviceId={{ISKLAD_DEVICE_ID}}\
                     &_isklad_deviceIdentityRequestId={{ISKLAD_DEVICE_IDENTITY_REQUEST_ID}}",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "deviceIdentityRequest": "req-1",
            })))
            .expect(1)
            .mount(&server)
            .await;

        assert_eq!(client.request_device_identity().await.unwrap(), "req-1");
    }

    #[tokio::test]
    async fn test_request_device_identity_missing_field() {
        let server = MockServer::start().await;
        let client = test_client(&server.uri());
        Mock::given(method("POST"))
            .and(path("/api/client/device-identity-request"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let err = client.request_device_identity().await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }
}
