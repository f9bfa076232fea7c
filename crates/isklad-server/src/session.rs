//! Session resolution at the request boundary.
//!
//! The session is loaded (or created) from the session cookie before any
//! handler runs, handed to handlers through request extensions, and saved
//! back once the response is built. Handlers never touch ambient state.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use tokio::sync::{Mutex, MutexGuard};

use isklad_session::Session;

use crate::identity;
use crate::state::AppState;

/// Name of the session-id cookie.
pub const SESSION_COOKIE: &str = "isklad_session";

/// Shared handle to the current request's session.
///
/// Cloned into request extensions; the middleware keeps a handle to save the
/// final state after the handler finishes.
#[derive(Debug, Clone)]
pub struct SessionHandle(Arc<Mutex<Session>>);

impl SessionHandle {
    fn new(session: Session) -> Self {
        Self(Arc::new(Mutex::new(session)))
    }

    /// Lock the session for reading or writing.
    pub async fn lock(&self) -> MutexGuard<'_, Session> {
        self.0.lock().await
    }

    async fn snapshot(&self) -> Session {
        self.0.lock().await.clone()
    }
}

/// Session middleware.
///
/// Also runs the device-identity initiate step, so a brand-new session asks
/// the identity provider for a handshake before the first handler executes.
pub async fn session_middleware(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let cookie_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());
    let mut session = state.sessions.load_or_create(cookie_id.as_deref()).await;

    identity::initiate(&state.client, &state.config, &mut session).await;

    let handle = SessionHandle::new(session);
    request.extensions_mut().insert(handle.clone());

    let response = next.run(request).await;

    let session = handle.snapshot().await;
    state.sessions.save(&session).await;

    let jar = jar.add(session_cookie(session.id()));
    (jar, response).into_response()
}

/// Build the session-id cookie.
fn session_cookie(id: &str) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}
