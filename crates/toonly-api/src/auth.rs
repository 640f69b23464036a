// OAuth2 token lifecycle
//
// The token manager is the only owner of the access/refresh token pair.
// Request construction reads the current access token; only a successful
// code exchange or refresh replaces the pair. Concurrent refresh calls are
// collapsed into one shared in-flight future.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, RefreshError};

/// Access/refresh token pair.
///
/// Secrets are redacted from `Debug` output.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub access_token: SecretString,
    pub refresh_token: Option<SecretString>,
    /// Expiry reported by the token endpoint, when known.
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// Credentials restored by the caller (e.g. from its own storage).
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: SecretString::from(access_token.into()),
            refresh_token: refresh_token.map(SecretString::from),
            expires_at: None,
        }
    }

    /// Returns `true` if the token endpoint's expiry has passed.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| at <= Utc::now())
    }
}

/// OAuth2 client registration and endpoints.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub authorize_url: Url,
    pub token_url: Url,
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: String,
}

impl OAuthConfig {
    /// Build the URL the user visits to grant access.
    ///
    /// The service redirects back to `redirect_uri` with a `code` query
    /// parameter, which is then passed to [`TokenManager::exchange_code`].
    pub fn authorization_url(&self, state: Option<&str>) -> Url {
        let mut url = self.authorize_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("response_type", "code")
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.redirect_uri);
            if let Some(state) = state {
                query.append_pair("state", state);
            }
        }
        url
    }
}

// ── Token endpoint wire shapes ───────────────────────────────────────

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

#[derive(Deserialize)]
struct TokenErrorResponse {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    fault: Option<Fault>,
}

#[derive(Deserialize)]
struct Fault {
    #[serde(default)]
    faultstring: Option<String>,
}

// ── Manager ──────────────────────────────────────────────────────────

type RefreshFlight = Shared<BoxFuture<'static, Result<Credentials, RefreshError>>>;

/// Owner of the current credentials and coordinator of token refreshes.
///
/// Cheaply cloneable; clones share the same state. Every successful
/// exchange or refresh is published on the watch channel returned by
/// [`subscribe`](Self::subscribe), so the caller can persist the new pair.
#[derive(Clone)]
pub struct TokenManager {
    http: reqwest::Client,
    oauth: Arc<OAuthConfig>,
    credentials: Arc<watch::Sender<Option<Credentials>>>,
    in_flight: Arc<Mutex<Option<RefreshFlight>>>,
}

impl TokenManager {
    pub fn new(http: reqwest::Client, oauth: OAuthConfig, credentials: Option<Credentials>) -> Self {
        let (tx, _rx) = watch::channel(credentials);
        Self {
            http,
            oauth: Arc::new(oauth),
            credentials: Arc::new(tx),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    pub fn oauth(&self) -> &OAuthConfig {
        &self.oauth
    }

    /// Snapshot of the current credentials.
    pub fn current(&self) -> Option<Credentials> {
        self.credentials.borrow().clone()
    }

    /// The current access token, if any credentials are held.
    pub fn access_token(&self) -> Option<SecretString> {
        self.credentials
            .borrow()
            .as_ref()
            .map(|c| c.access_token.clone())
    }

    /// Observe credential replacements ("tokens refreshed" notifications).
    pub fn subscribe(&self) -> watch::Receiver<Option<Credentials>> {
        self.credentials.subscribe()
    }

    /// Replace the credentials with a pair restored by the caller.
    pub fn restore(&self, credentials: Credentials) {
        self.credentials.send_replace(Some(credentials));
        debug!("credentials restored");
    }

    /// Exchange an authorization code for a new token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<Credentials, Error> {
        if code.trim().is_empty() {
            return Err(Error::MissingArgument { name: "code" });
        }

        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.oauth.redirect_uri.as_str()),
            ("client_id", self.oauth.client_id.as_str()),
            ("client_secret", self.oauth.client_secret.expose_secret()),
        ];
        let credentials = request_tokens(&self.http, &self.oauth.token_url, &form, None).await?;

        self.credentials.send_replace(Some(credentials.clone()));
        info!("authorization code exchanged for tokens");
        Ok(credentials)
    }

    /// Refresh the token pair.
    ///
    /// Without a refresh token this fails locally with
    /// [`Error::MissingRefreshToken`]. If a refresh is already running the
    /// call joins it: one network request, one outcome for every caller.
    pub async fn refresh(&self) -> Result<Credentials, Error> {
        let flight = self.join_or_start()?;
        flight.await.map_err(Error::from)
    }

    /// Returns `true` while a refresh request is outstanding.
    pub fn is_refreshing(&self) -> bool {
        lock(&self.in_flight).is_some()
    }

    fn join_or_start(&self) -> Result<RefreshFlight, Error> {
        let mut slot = lock(&self.in_flight);

        if let Some(flight) = slot.as_ref() {
            debug!("joining in-flight token refresh");
            return Ok(flight.clone());
        }

        let refresh_token = self
            .credentials
            .borrow()
            .as_ref()
            .and_then(|c| c.refresh_token.clone())
            .ok_or(Error::MissingRefreshToken)?;

        let http = self.http.clone();
        let oauth = Arc::clone(&self.oauth);
        let store = Arc::clone(&self.credentials);
        let in_flight = Arc::clone(&self.in_flight);

        let flight = async move {
            let outcome = refresh_grant(&http, &oauth, &refresh_token).await;
            match &outcome {
                Ok(credentials) => {
                    store.send_replace(Some(credentials.clone()));
                    info!("access token refreshed");
                }
                Err(e) => warn!(error = %e, "token refresh failed"),
            }
            // Only one flight exists at a time, so the slot still holds this one.
            *lock(&in_flight) = None;
            outcome
        }
        .boxed()
        .shared();

        *slot = Some(flight.clone());
        debug!("starting token refresh");
        Ok(flight)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn refresh_grant(
    http: &reqwest::Client,
    oauth: &OAuthConfig,
    refresh_token: &SecretString,
) -> Result<Credentials, RefreshError> {
    let form = [
        ("grant_type", "refresh_token"),
        ("refresh_token", refresh_token.expose_secret()),
        ("client_id", oauth.client_id.as_str()),
        ("client_secret", oauth.client_secret.expose_secret()),
    ];
    request_tokens(http, &oauth.token_url, &form, Some(refresh_token)).await
}

/// POST a form to the token endpoint and parse the resulting pair.
///
/// When the response omits a refresh token, `previous_refresh` is kept.
async fn request_tokens(
    http: &reqwest::Client,
    token_url: &Url,
    form: &[(&str, &str)],
    previous_refresh: Option<&SecretString>,
) -> Result<Credentials, RefreshError> {
    debug!("POST {token_url}");

    let resp = http
        .post(token_url.clone())
        .form(form)
        .send()
        .await
        .map_err(|e| RefreshError {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        })?;

    let status = resp.status();
    let body = resp.text().await.map_err(|e| RefreshError {
        status: Some(status.as_u16()),
        message: e.to_string(),
    })?;

    if !status.is_success() {
        return Err(RefreshError {
            status: Some(status.as_u16()),
            message: token_error_message(&body).unwrap_or_else(|| status.to_string()),
        });
    }

    let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| RefreshError {
        status: Some(status.as_u16()),
        message: format!("invalid token response: {e}"),
    })?;

    let expires_at = parsed
        .expires_in
        .and_then(TimeDelta::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl));

    Ok(Credentials {
        access_token: SecretString::from(parsed.access_token),
        refresh_token: parsed
            .refresh_token
            .map(SecretString::from)
            .or_else(|| previous_refresh.cloned()),
        expires_at,
    })
}

fn token_error_message(body: &str) -> Option<String> {
    let parsed: TokenErrorResponse = serde_json::from_str(body).ok()?;
    parsed
        .error_description
        .or(parsed.error)
        .or_else(|| parsed.fault.and_then(|f| f.faultstring))
}
