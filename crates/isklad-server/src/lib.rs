//! HTTP surface of the Isklad cart-widget middleware.
//!
//! One endpoint, dispatched by query string the way the widget calls it:
//!
//! - `?service=middleware&uri=identify-device` — send the popup into the
//!   device-identification handshake
//! - `?service=middleware&uri=receive-device-identity` — identity-provider
//!   callback that binds the device id to the session
//! - `?service=middleware&uri=device-id` — report the bound device id
//! - `?service={myorder|egon}&uri=<path>` — CSRF-checked proxy to the
//!   matching upstream backend
//!
//! # Example
//!
//! ```ignore
//! use isklad_config::MiddlewareConfig;
//! use isklad_server::{AppState, Server};
//!
//! let config = MiddlewareConfig::from_toml_file("isklad.toml")?;
//! let server = Server::new(AppState::new(config));
//! server.run().await?;
//! ```

pub mod csrf;
pub mod identity;
pub mod routes;
pub mod session;
pub mod state;

pub use csrf::CSRF_HEADER;
pub use identity::IdentityAction;
pub use session::{SESSION_COOKIE, SessionHandle};
pub use state::AppState;

use axum::{Router, middleware, routing::any};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// The middleware HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server over prepared application state.
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with the widget controller and session layer.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", any(routes::widget_controller))
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                session::session_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server on the configured bind address.
    pub async fn run(self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.state.config.bind_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, "starting isklad middleware server");
        axum::serve(listener, self.router()).await
    }
}
