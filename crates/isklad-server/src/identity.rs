//! Device-identity correlation flow.
//!
//! A session moves `Unidentified → Pending → Identified` across three steps:
//! initiate (ask the identity provider for a handshake, store the request
//! id), the redirect step (send the popup to the identification page), and
//! the callback step (bind the device id iff the callback echoes the pending
//! request id). The request id is a single-use correlation token: it is
//! issued server-side, never guessable by the browser script, and erased on
//! a successful bind, so a forged callback cannot plant a device id.

use std::collections::HashMap;

use axum::response::{Html, IntoResponse, Redirect, Response};

use isklad_client::IskladClient;
use isklad_config::MiddlewareConfig;
use isklad_session::Session;

/// Placeholder page for the popup window; the widget expects it to close
/// itself once the handshake (or a no-op callback) finishes.
const CLOSE_WINDOW_HTML: &str = "<!DOCTYPE html><html><body><script>window.close();</script></body></html>";

/// Terminal action of an identity step.
///
/// A redirect is final: the caller returns the response as-is and performs
/// no further processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityAction {
    /// Send the popup to the identity provider's identification page.
    Redirect(String),
    /// Render the self-closing placeholder.
    CloseWindow,
}

impl IntoResponse for IdentityAction {
    fn into_response(self) -> Response {
        match self {
            IdentityAction::Redirect(url) => Redirect::to(&url).into_response(),
            IdentityAction::CloseWindow => Html(CLOSE_WINDOW_HTML).into_response(),
        }
    }
}

/// Initiate a handshake for a session that has neither a device id nor a
/// pending request.
///
/// Runs once per inbound request, before the handlers; sessions that are
/// already `Pending` or `Identified` are left alone, which is what makes the
/// redirect step idempotent. Failure is non-fatal: the widget keeps working
/// unidentified and the next request retries.
pub async fn initiate(client: &IskladClient, config: &MiddlewareConfig, session: &mut Session) {
    let identified = session
        .get(&config.key_device_id)
        .is_some_and(|v| !v.is_empty());
    let pending = session
        .get(&config.key_device_identity_request_id)
        .is_some_and(|v| !v.is_empty());
    if identified || pending {
        return;
    }

    match client.request_device_identity().await {
        Ok(request_id) => {
            tracing::debug!(session_id = %session.id(), "device-identity handshake initiated");
            session.set(config.key_device_identity_request_id.clone(), request_id);
        }
        Err(err) => {
            tracing::warn!(error = %err, "device-identity request failed, continuing unidentified");
        }
    }
}

/// Redirect step: send a `Pending` session's popup to the identification
/// page; anything else just closes the window.
pub fn identify_device(config: &MiddlewareConfig, session: &Session) -> IdentityAction {
    match session.get(&config.key_device_identity_request_id) {
        Some(request_id) if !request_id.is_empty() => {
            IdentityAction::Redirect(config.device_identification_url(request_id))
        }
        _ => IdentityAction::CloseWindow,
    }
}

/// Callback step: bind the device id iff the query carries both parameters
/// and its request id equals the session's pending one.
///
/// On mismatch or missing parameters nothing is written. The placeholder is
/// rendered either way, so the redirecting party cannot observe whether the
/// bind happened.
pub fn receive_device_identity(
    config: &MiddlewareConfig,
    session: &mut Session,
    query: &HashMap<String, String>,
) -> IdentityAction {
    let device_id = query.get(&config.key_device_id);
    let callback_request_id = query.get(&config.key_device_identity_request_id);
    let pending = session
        .get(&config.key_device_identity_request_id)
        .map(str::to_string);

    if let (Some(device_id), Some(callback_request_id), Some(pending)) =
        (device_id, callback_request_id, pending)
        && *callback_request_id == pending
    {
        session.set(config.key_device_id.clone(), device_id.clone());
        session.remove(&config.key_device_identity_request_id);
        tracing::info!(session_id = %session.id(), "device identity bound");
    }

    IdentityAction::CloseWindow
}

/// The session's current device id, if bound.
pub fn device_id(config: &MiddlewareConfig, session: &Session) -> Option<String> {
    session.get(&config.key_device_id).map(str::to_string)
}
