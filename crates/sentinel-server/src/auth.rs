//! Bearer token authentication.

use subtle::ConstantTimeEq;

/// Constant-time comparison of the presented Authorization header value
/// against the configured token.
///
/// A missing header counts as the empty string, so it matches only when
/// the configured token is also empty. Length mismatches are rejected
/// without short-circuiting on content.
pub fn token_matches(provided: Option<&str>, expected: &str) -> bool {
    let provided = provided.unwrap_or("");
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// Generate the opaque bearer token handed to local clients at startup.
pub fn generate_token() -> String {
    format!(
        "{}{}",
        uuid::Uuid::new_v4().simple(),
        uuid::Uuid::new_v4().simple()
    )
}
