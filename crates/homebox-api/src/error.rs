use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the `homebox-api` crate.
///
/// Covers every failure mode of the Homebox REST surface: credential
/// exchange, transport, HTTP status classes, and payload decoding.
/// `homebox-core` maps these into domain diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Credentials or token rejected. Permanent: retrying with the same
    /// input will not help, the caller must re-authenticate.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// Login or token refresh could not reach the server. Retryable.
    #[error("Authentication temporarily unavailable: {message}")]
    TransientAuth { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Remote service ──────────────────────────────────────────────
    /// HTTP 429. Carries the server's `Retry-After` hint.
    #[error("Rate limited -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// HTTP 5xx from the server.
    #[error("Server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    /// HTTP 404. Permanent for the requested resource.
    #[error("Not found: {resource}")]
    NotFound { resource: String },

    /// Any other non-success status.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the credential was rejected and only a fresh
    /// login can resolve it.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Authentication { .. })
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::TransientAuth { .. } | Self::RateLimited { .. } | Self::Server { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound { .. } => true,
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Server-provided delay before the next attempt, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs } => Some(Duration::from_secs(*retry_after_secs)),
            _ => None,
        }
    }

    /// HTTP status code carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Server { status, .. } | Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            Self::NotFound { .. } => Some(404),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_is_transient_with_hint() {
        let err = Error::RateLimited { retry_after_secs: 7 };
        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn auth_and_not_found_are_permanent() {
        let auth = Error::Authentication { message: "bad password".into() };
        assert!(auth.is_auth());
        assert!(!auth.is_transient());

        let missing = Error::NotFound { resource: "/api/v1/items/x".into() };
        assert!(missing.is_not_found());
        assert!(!missing.is_transient());
    }

    #[test]
    fn server_errors_retry_but_client_errors_do_not() {
        assert!(Error::Server { status: 503, message: String::new() }.is_transient());
        assert!(!Error::Api { status: 400, message: String::new() }.is_transient());
    }
}
