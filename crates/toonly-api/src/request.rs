// Request descriptors
//
// One `ApiRequest` is built per logical operation and never mutated after
// that. The retry guard lives outside the descriptor as an `Attempt` value
// that the recovery loop passes along explicitly.

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;

/// Immutable description of a single thermostat API call.
///
/// The `Authorization` header is not stored here: it is rendered from the
/// token manager's current credentials every time the request is
/// dispatched, so a resubmission after a refresh always carries the new
/// access token.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Value>,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            method,
            path: path.into(),
            headers,
            body,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path, Some(body))
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::PUT, path, Some(body))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the API base URL (e.g. `"temperature/states"`).
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }
}

/// Which submission of a request is being made.
///
/// `Attempt::FIRST` may be recovered once; every later attempt is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Attempt(u8);

impl Attempt {
    /// The original submission.
    pub const FIRST: Self = Self(0);

    const MAX_RETRIES: u8 = 1;

    /// Whether a failure on this attempt may still be recovered and resubmitted.
    pub fn can_retry(self) -> bool {
        self.0 < Self::MAX_RETRIES
    }

    /// The attempt that follows this one.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Zero-based attempt number, for logging.
    pub fn number(self) -> u8 {
        self.0
    }
}
