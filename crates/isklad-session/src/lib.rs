//! Per-browser session state for the Isklad cart-widget middleware.
//!
//! A `Session` is an explicit value passed into every operation that needs
//! browser state; there is no ambient request-global access. The server
//! loads the session at the request boundary, hands it to the handlers, and
//! saves it back once the response is built.

pub mod session;
pub mod store;

pub use session::Session;
pub use store::SessionStore;
