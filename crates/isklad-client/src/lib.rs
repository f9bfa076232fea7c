//! Upstream HTTP client SDK for the Isklad APIs.
//!
//! # Components
//!
//! - [`token`] — cached access token: durable store, 10-hour refresh margin,
//!   single-flight refresh
//! - [`client`] — transport wrapper: bearer injection, JSON normalization,
//!   device-identity request
//! - [`error`] — the transport/status/decode/persistence taxonomy with the
//!   code-0 "never got a response" sentinel

pub mod client;
pub mod error;
pub mod token;

pub use client::IskladClient;
pub use error::{Error, Result};
pub use token::{
    FileTokenStore, MemoryTokenStore, SharedTokenStore, StoredToken, TokenManager, TokenStore,
};
