//! Error types for upstream calls.

/// Result type alias for this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the upstream client.
///
/// `http_code` distinguishes "got an error response" (the real status) from
/// "never got a response" (the 0 sentinel). The display strings are part of
/// the widget-facing error envelope, so their wording is load-bearing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Network/TLS failure before any response arrived.
    #[error("Request error: {0}")]
    Transport(String),

    /// Upstream responded with status >= 400.
    #[error("Request failed with status {code}. {message}")]
    Status { code: u16, message: String },

    /// Upstream returned a success status with a body that is not JSON.
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// The cached-token slot could not be read or written.
    #[error("Token storage error: {0}")]
    TokenStore(String),
}

impl Error {
    /// The HTTP status carried by this error; 0 when no response was received.
    pub fn http_code(&self) -> u16 {
        match self {
            Error::Status { code, .. } => *code,
            _ => 0,
        }
    }
}
