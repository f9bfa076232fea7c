//! CSRF verification for proxied widget calls.
//!
//! The widget echoes the per-session token back in a request header; the
//! comparison is constant-time so the gate does not leak token prefixes.

use subtle::ConstantTimeEq;

/// Header the widget sends the session's CSRF token in.
pub const CSRF_HEADER: &str = "x-isklad-csrf-token";

/// Check a presented header value against the session token.
///
/// An absent header never verifies.
pub(crate) fn verify(presented: Option<&str>, expected: &str) -> bool {
    match presented {
        Some(presented) => constant_time_eq(presented, expected),
        None => false,
    }
}

/// Compare two strings in constant time.
///
/// When the lengths differ a dummy comparison keeps the timing consistent
/// before returning false.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() == b_bytes.len() {
        a_bytes.ct_eq(b_bytes).into()
    } else {
        let _ = a_bytes.ct_eq(a_bytes);
        false
    }
}
