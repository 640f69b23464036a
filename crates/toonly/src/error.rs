//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use toonly_config::ConfigError;
use toonly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const UNAVAILABLE: i32 = 4;
    pub const RATE_LIMITED: i32 = 5;
    pub const CONFIG: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Thermostat ───────────────────────────────────────────────────
    #[error("Thermostat unavailable: {message}")]
    #[diagnostic(
        code(toonly::unavailable),
        help(
            "The cloud service cannot reach your thermostat.\n\
             Check that the display is powered and online, then retry."
        )
    )]
    Unavailable { message: String },

    #[error("No agreement selected")]
    #[diagnostic(
        code(toonly::no_agreement),
        help(
            "List your thermostats with: toonly agreements\n\
             Then pass --agreement <ID> or set TOONLY_AGREEMENT_ID."
        )
    )]
    NoAgreement,

    // ── Authorization ────────────────────────────────────────────────
    #[error("Authorization required: {message}")]
    #[diagnostic(
        code(toonly::reauthorize),
        help(
            "Run: toonly authorize-url\n\
             Open the URL, approve access, then run: toonly authorize <CODE>"
        )
    )]
    NeedsReauthorization { message: String },

    #[error("No access token configured")]
    #[diagnostic(
        code(toonly::no_credentials),
        help(
            "Set TOONLY_ACCESS_TOKEN and TOONLY_REFRESH_TOKEN, or pass --access-token.\n\
             To obtain tokens run: toonly authorize-url"
        )
    )]
    NoCredentials,

    // ── Request outcome ──────────────────────────────────────────────
    #[error("Rate limited by the thermostat API")]
    #[diagnostic(
        code(toonly::rate_limited),
        help("Wait a moment before retrying; queued requests were dropped.")
    )]
    RateLimited,

    #[error("Request aborted before it was sent")]
    #[diagnostic(code(toonly::aborted))]
    Aborted,

    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(toonly::api_error))]
    ApiError { status: u16, message: String },

    #[error("Connection failed: {reason}")]
    #[diagnostic(
        code(toonly::connection_failed),
        help("Check your network connection and the configured api_url.")
    )]
    ConnectionFailed { reason: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(toonly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(toonly::config),
        help("Inspect the effective settings with: toonly config show")
    )]
    Config(#[from] ConfigError),

    // ── Internal / IO ────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(toonly::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(toonly::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unavailable { .. } => exit_code::UNAVAILABLE,
            Self::NeedsReauthorization { .. } | Self::NoCredentials => exit_code::AUTH,
            Self::RateLimited | Self::Aborted => exit_code::RATE_LIMITED,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Validation { .. } | Self::NoAgreement => exit_code::USAGE,
            Self::Config(_) => exit_code::CONFIG,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unavailable { message } => CliError::Unavailable { message },
            CoreError::NeedsReauthorization { message } => {
                CliError::NeedsReauthorization { message }
            }
            CoreError::MissingArgument { name } => CliError::Validation {
                field: name.into(),
                reason: "a value is required".into(),
            },
            CoreError::InvalidArgument { name, reason } => CliError::Validation {
                field: name.into(),
                reason,
            },
            CoreError::Aborted => CliError::Aborted,
            CoreError::Api { status: 429, .. } => CliError::RateLimited,
            CoreError::Api { status, message } => CliError::ApiError { status, message },
            CoreError::Connection { reason } => CliError::ConnectionFailed { reason },
            CoreError::Config { message } => CliError::Validation {
                field: "configuration".into(),
                reason: message,
            },
            CoreError::Closed => CliError::Internal("thermostat handle already closed".into()),
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}
