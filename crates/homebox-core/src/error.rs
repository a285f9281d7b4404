// ── Core error types ──
//
// Domain errors from homebox-core. Consumers never see HTTP status codes
// or JSON parse failures directly; the `From<homebox_api::Error>` impl
// folds transport-layer errors into the classes the coordinator acts on.
//
// `Clone` so one fetch result can be handed to every waiter it covers.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Credential errors ────────────────────────────────────────────
    /// Credentials rejected. Only a fresh login (or user action) helps.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Retryable errors ─────────────────────────────────────────────
    #[error("Homebox temporarily unavailable: {message}")]
    Transient { message: String },

    #[error("Rate limited by Homebox -- retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request to Homebox timed out: {message}")]
    Timeout { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Data integrity error: {message}")]
    DataIntegrity { message: String },

    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Coordinator has shut down")]
    ShutDown,

    #[error("Coordinator has not been started")]
    NotStarted,

    #[error("Coordinator is already running")]
    AlreadyStarted,

    #[error("No snapshot has been fetched yet")]
    NoSnapshot,

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Credential failure that needs re-authentication.
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Failure expected to clear on its own.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transient { .. } | Self::RateLimited { .. } | Self::Timeout { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<homebox_api::Error> for CoreError {
    fn from(err: homebox_api::Error) -> Self {
        match err {
            homebox_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            homebox_api::Error::TransientAuth { message } => CoreError::Transient { message },
            homebox_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout {
                        message: e.to_string(),
                    }
                } else if e.is_connect() || e.is_request() {
                    CoreError::Transient {
                        message: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            homebox_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            homebox_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS error: {msg}"),
            },
            homebox_api::Error::RateLimited { retry_after_secs } => {
                CoreError::RateLimited { retry_after_secs }
            }
            homebox_api::Error::Server { status, message } => CoreError::Transient {
                message: format!("HTTP {status}: {message}"),
            },
            homebox_api::Error::NotFound { resource } => CoreError::NotFound {
                entity_type: "Resource".into(),
                identifier: resource,
            },
            homebox_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            homebox_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
