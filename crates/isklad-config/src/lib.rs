//! Configuration system for the Isklad cart-widget middleware.
//!
//! One `MiddlewareConfig` per process: client credentials, upstream domains,
//! session key names, and the writable data directory. Loaded from a TOML
//! file; every optional field has the production default baked in, so a
//! minimal deployment config is five lines.

pub mod config;
pub mod error;

pub use config::{
    MiddlewareConfig, PLACEHOLDER_DEVICE_ID, PLACEHOLDER_REQUEST_ID, SERVICE_EGON,
    SERVICE_MIDDLEWARE, SERVICE_MYORDER, URI_DEVICE_ID, URI_IDENTIFY_DEVICE,
    URI_RECEIVE_DEVICE_IDENTITY,
};
pub use error::{ConfigError, Result};
