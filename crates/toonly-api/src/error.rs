use std::fmt;

use thiserror::Error;

/// Top-level error type for the `toonly-api` crate.
///
/// Covers every failure mode of the thermostat client: local precondition
/// failures, queue control, HTTP status failures, token endpoint failures
/// and transport errors. `toonly-core` maps these into user-facing categories.
#[derive(Debug, Error)]
pub enum Error {
    // ── Local preconditions ─────────────────────────────────────────
    /// A required argument was absent or empty. Never retried.
    #[error("Missing required argument: {name}")]
    MissingArgument { name: &'static str },

    /// An argument was present but unusable (e.g. a non-finite temperature).
    #[error("Invalid argument {name}: {reason}")]
    InvalidArgument { name: &'static str, reason: String },

    /// A refresh was requested but no refresh token is held.
    #[error("No refresh token available -- authorization required")]
    MissingRefreshToken,

    // ── Request queue ───────────────────────────────────────────────
    /// The request was dropped from the queue before it was dispatched.
    #[error("Request aborted before dispatch")]
    Aborted,

    /// The client was destroyed; no further requests are accepted.
    #[error("Client closed")]
    Closed,

    // ── Upstream API ────────────────────────────────────────────────
    /// Non-success HTTP status from the thermostat API.
    #[error("API error (HTTP {status}): {message}")]
    Api {
        status: u16,
        message: String,
        body: String,
    },

    /// HTTP 500 carrying the "communication error" signature: the
    /// thermostat itself cannot be reached by the cloud service.
    #[error("Thermostat unreachable: {message}")]
    DeviceUnreachable { message: String },

    /// HTTP 429 from the thermostat API.
    #[error("Rate limited by the thermostat API")]
    RateLimited,

    // ── Token endpoint ──────────────────────────────────────────────
    /// The token endpoint rejected a code exchange or refresh.
    #[error(transparent)]
    Refresh(#[from] RefreshError),

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS configuration or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

/// Failure of a token endpoint call.
///
/// Cloneable so a single refresh outcome can be handed to every caller
/// that joined the in-flight attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshError {
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "Token request failed (HTTP {status}): {}", self.message),
            None => write!(f, "Token request failed: {}", self.message),
        }
    }
}

impl std::error::Error for RefreshError {}

impl RefreshError {
    /// `true` when the token endpoint refused the grant itself, meaning
    /// the user has to go through authorization again.
    pub fn is_rejected_grant(&self) -> bool {
        matches!(self.status, Some(400 | 401 | 403))
    }
}

impl Error {
    /// HTTP status attached to this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::DeviceUnreachable { .. } => Some(500),
            Self::RateLimited => Some(429),
            Self::Refresh(e) => e.status,
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns `true` if the thermostat is offline from the cloud's point of view.
    pub fn is_device_unreachable(&self) -> bool {
        matches!(self, Self::DeviceUnreachable { .. })
    }

    /// Returns `true` if only a fresh authorization can resolve this error.
    pub fn needs_reauthorization(&self) -> bool {
        match self {
            Self::MissingRefreshToken => true,
            Self::Api { status: 401, .. } => true,
            Self::Refresh(e) => e.is_rejected_grant(),
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::RateLimited | Self::Aborted | Self::DeviceUnreachable { .. } => true,
            _ => false,
        }
    }
}
