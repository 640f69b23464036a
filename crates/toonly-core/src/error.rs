// ── Core error types ──
//
// Boundary categories for consumers of the thermostat handle. Callers see
// "unavailable", "needs reauthorization" or a generic failure carrying the
// upstream status; the raw transport error stays inside toonly-api.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device state ─────────────────────────────────────────────────
    /// The cloud service cannot reach the thermostat.
    #[error("Thermostat unavailable: {message}")]
    Unavailable { message: String },

    // ── Authorization ────────────────────────────────────────────────
    #[error("Reauthorization required: {message}")]
    NeedsReauthorization { message: String },

    // ── Local preconditions ──────────────────────────────────────────
    #[error("Missing required argument: {name}")]
    MissingArgument { name: &'static str },

    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    // ── Lifecycle ────────────────────────────────────────────────────
    #[error("Request aborted before dispatch")]
    Aborted,

    #[error("Thermostat handle destroyed")]
    Closed,

    // ── Upstream failures ────────────────────────────────────────────
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// HTTP status reported by the upstream service, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<toonly_api::Error> for CoreError {
    fn from(err: toonly_api::Error) -> Self {
        use toonly_api::Error as ApiError;

        if err.needs_reauthorization() {
            return CoreError::NeedsReauthorization {
                message: err.to_string(),
            };
        }

        match err {
            ApiError::MissingArgument { name } => CoreError::MissingArgument { name },
            ApiError::InvalidArgument { name, reason } => {
                CoreError::InvalidArgument { name, reason }
            }
            ApiError::MissingRefreshToken => CoreError::NeedsReauthorization {
                message: "no refresh token available".into(),
            },
            ApiError::Aborted => CoreError::Aborted,
            ApiError::Closed => CoreError::Closed,
            ApiError::DeviceUnreachable { message } => CoreError::Unavailable { message },
            ApiError::Api {
                status, message, ..
            } => CoreError::Api { status, message },
            ApiError::RateLimited => CoreError::Api {
                status: 429,
                message: "rate limited, queued requests were dropped".into(),
            },
            ApiError::Refresh(e) => match e.status {
                Some(status) => CoreError::Api {
                    status,
                    message: e.message,
                },
                None => CoreError::Connection { reason: e.message },
            },
            ApiError::Transport(ref e) => match e.status() {
                Some(status) => CoreError::Api {
                    status: status.as_u16(),
                    message: e.to_string(),
                },
                None => CoreError::Connection {
                    reason: e.to_string(),
                },
            },
            ApiError::Tls(reason) => CoreError::Connection {
                reason: format!("TLS error: {reason}"),
            },
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
