//! The widget controller: one endpoint, dispatched by query string.
//!
//! `?service=middleware&uri=...` selects the middleware's own sub-routes
//! (device-identity steps); any other service forwards the call to the
//! matching upstream backend behind the CSRF gate.

use std::collections::HashMap;

use axum::{
    Extension, Json,
    body::{Body, to_bytes},
    extract::{Query, Request, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
};

use isklad_config::{SERVICE_MIDDLEWARE, URI_DEVICE_ID, URI_IDENTIFY_DEVICE, URI_RECEIVE_DEVICE_IDENTITY};

use crate::csrf::{self, CSRF_HEADER};
use crate::identity;
use crate::session::SessionHandle;
use crate::state::AppState;

/// Maximum forwarded request body size (10 MB).
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Entry point for every widget call.
pub(crate) async fn widget_controller(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    Extension(session): Extension<SessionHandle>,
    request: Request<Body>,
) -> Response {
    let service = params.get("service").map(String::as_str).unwrap_or("");
    if service == SERVICE_MIDDLEWARE {
        let uri = params.get("uri").map(String::as_str).unwrap_or("");
        middleware_controller(&state, &session, uri, &params).await
    } else {
        proxy_request(&state, &session, service, &params, request).await
    }
}

/// Middleware sub-routes, selected by the inner `uri` value.
async fn middleware_controller(
    state: &AppState,
    handle: &SessionHandle,
    uri: &str,
    params: &HashMap<String, String>,
) -> Response {
    match uri {
        URI_IDENTIFY_DEVICE => {
            let session = handle.lock().await;
            identity::identify_device(&state.config, &session).into_response()
        }
        URI_RECEIVE_DEVICE_IDENTITY => {
            let mut session = handle.lock().await;
            identity::receive_device_identity(&state.config, &mut session, params).into_response()
        }
        URI_DEVICE_ID => {
            let session = handle.lock().await;
            let id = identity::device_id(&state.config, &session);
            Json(serde_json::json!({ "id": id })).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Forward a browser-originated call to the resolved upstream backend.
async fn proxy_request(
    state: &AppState,
    handle: &SessionHandle,
    service: &str,
    params: &HashMap<String, String>,
    request: Request<Body>,
) -> Response {
    if !state.config.disable_csrf_verification {
        let presented = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let expected = handle.lock().await.csrf_token(&state.config.key_csrf_token);
        if !csrf::verify(presented.as_deref(), &expected) {
            tracing::warn!(service, "CSRF verification failed");
            return StatusCode::FORBIDDEN.into_response();
        }
    }

    let uri = params.get("uri").map(String::as_str).unwrap_or("");
    let url = format!("{}{}", state.config.service_domain(service), uri);
    let method = request.method().clone();

    // Non-GET bodies pass through unparsed; re-encoding would double-encode
    // the widget's JSON.
    let body = if method == Method::GET {
        None
    } else {
        match to_bytes(request.into_body(), MAX_BODY_SIZE).await {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
            Err(_) => return StatusCode::BAD_REQUEST.into_response(),
        }
    };

    match state.client.request(method, &url, body).await {
        Ok(value) => Json(value).into_response(),
        Err(err) => ProxyError(err).into_response(),
    }
}

/// Upstream failure rendered as the widget-facing error envelope.
struct ProxyError(isklad_client::Error);

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let http_code = self.0.http_code();
        // 0 means no response was ever received; that is not a valid HTTP
        // status, so the outer response degrades to 502.
        let status = StatusCode::from_u16(http_code).unwrap_or(StatusCode::BAD_GATEWAY);
        let message = self.0.to_string();

        tracing::warn!(status = %status, error = %message, "upstream call failed");

        let body = serde_json::json!({
            "error": message,
            "httpCode": http_code,
        });
        (status, Json(body)).into_response()
    }
}
