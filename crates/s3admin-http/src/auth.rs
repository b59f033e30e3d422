//! Shared-secret authentication.
//!
//! Every account-scoped request carries the configured secret in the
//! `X-Auth-Token` header. The comparison runs in constant time.

use subtle::ConstantTimeEq;
use tracing::{debug, warn};

/// Header carrying the shared secret.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// Authentication failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The request has no `X-Auth-Token` header.
    #[error("Missing X-Auth-Token header")]
    MissingToken,
    /// The header does not match the configured token.
    #[error("Invalid X-Auth-Token")]
    InvalidToken,
}

impl AuthError {
    /// Error tag written to the `Code` field.
    #[must_use]
    pub fn code(&self) -> &'static str {
        "Unauthorized"
    }
}

/// Check the request's token against `expected`.
pub fn verify_token(headers: &http::HeaderMap, expected: &str) -> Result<(), AuthError> {
    let Some(provided) = headers.get(AUTH_TOKEN_HEADER) else {
        warn!("request without auth token");
        return Err(AuthError::MissingToken);
    };

    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        debug!("auth token verified");
        Ok(())
    } else {
        warn!("auth token mismatch");
        Err(AuthError::InvalidToken)
    }
}
