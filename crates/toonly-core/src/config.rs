// ── Runtime thermostat configuration ──
//
// Describes how to reach the cloud service and which thermostat to drive.
// Carries credential data but never touches disk: toonly-config (or any
// other caller) builds a `ThermostatConfig` and hands it in.

use std::time::Duration;

use toonly_api::{Credentials, DEFAULT_CONCURRENCY, OAuthConfig, TlsMode};
use url::Url;

/// Default status poll interval in seconds.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for a single thermostat handle.
#[derive(Debug, Clone)]
pub struct ThermostatConfig {
    /// API base URL, e.g. `https://api.toon.eu/toon/v3/`.
    pub api_url: Url,
    /// OAuth2 client registration and endpoints.
    pub oauth: OAuthConfig,
    /// Token pair restored by the caller. `None` until a code is exchanged.
    pub credentials: Option<Credentials>,
    /// Agreement to bind when the handle starts.
    pub agreement_id: Option<String>,
    /// Status poll interval in seconds. 0 = no background polling.
    pub poll_interval_secs: u64,
    /// TLS verification strategy.
    pub tls: TlsMode,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum number of API calls in flight.
    pub concurrency: usize,
}

impl ThermostatConfig {
    /// A configuration with default tuning for the given endpoints.
    pub fn new(api_url: Url, oauth: OAuthConfig) -> Self {
        Self {
            api_url,
            oauth,
            credentials: None,
            agreement_id: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            tls: TlsMode::default(),
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_agreement(mut self, agreement_id: impl Into<String>) -> Self {
        self.agreement_id = Some(agreement_id.into());
        self
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }
}
