// Failure classification
//
// Turns raw HTTP failures into typed errors and maps each error onto the
// recovery action the client is allowed to take. The actions themselves
// (refresh, abort, re-bind) run in `client.rs`, which owns the collaborators.

use reqwest::StatusCode;
use serde::Deserialize;

use crate::error::Error;

/// Marker the upstream service uses when it cannot reach the thermostat.
const COMMUNICATION_ERROR_TYPE: &str = "communicationerror";
const COMMUNICATION_ERROR_TEXT: &str = "communication error";

/// Error body shape returned by the thermostat API.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl ErrorBody {
    fn is_communication_error(&self) -> bool {
        let tag_matches = |v: &Option<String>| {
            v.as_deref()
                .is_some_and(|s| s.to_ascii_lowercase().replace(['_', ' '], "") == COMMUNICATION_ERROR_TYPE)
        };
        let text_matches = |v: &Option<String>| {
            v.as_deref()
                .is_some_and(|s| s.to_ascii_lowercase().contains(COMMUNICATION_ERROR_TEXT))
        };
        tag_matches(&self.kind)
            || tag_matches(&self.error_code)
            || text_matches(&self.description)
            || text_matches(&self.message)
            || text_matches(&self.reason)
    }

    fn summary(self) -> Option<String> {
        self.description.or(self.message).or(self.reason)
    }
}

/// Build the typed error for a non-success response.
pub fn error_from_response(status: StatusCode, body: String) -> Error {
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_default();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Error::RateLimited;
    }

    if status == StatusCode::INTERNAL_SERVER_ERROR && parsed.is_communication_error() {
        return Error::DeviceUnreachable {
            message: parsed
                .summary()
                .unwrap_or_else(|| "communication error".into()),
        };
    }

    let message = parsed.summary().unwrap_or_else(|| {
        if body.trim().is_empty() {
            status.to_string()
        } else {
            body.clone()
        }
    });

    Error::Api {
        status: status.as_u16(),
        message,
        body,
    }
}

/// What kind of failure a call ended with, from the recovery point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// 401: the access token was rejected; refresh and resubmit once.
    Unauthorized,
    /// 429: shed queued load and fail fast.
    RateLimited,
    /// 500 with the communication-error signature: the thermostat is offline.
    DeviceUnreachable,
    /// Any other 500: the agreement binding was lost; re-bind and resubmit once.
    SessionLost,
    /// Everything else propagates unchanged.
    Terminal,
}

impl FailureClass {
    pub fn of(error: &Error) -> Self {
        match error {
            Error::Api { status: 401, .. } => Self::Unauthorized,
            Error::RateLimited => Self::RateLimited,
            Error::DeviceUnreachable { .. } => Self::DeviceUnreachable,
            Error::Api { status: 500, .. } => Self::SessionLost,
            _ => Self::Terminal,
        }
    }

    /// Whether this class can be cured by a corrective action plus resubmission.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Unauthorized | Self::SessionLost)
    }
}
