// Thermostat API HTTP client
//
// Wraps `reqwest::Client` with bearer authorization, the request queue and
// the recovery policy. Endpoint methods live in `thermostat.rs` as inherent
// methods so this module stays focused on transport mechanics.

use reqwest::header::{AUTHORIZATION, HeaderValue};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::auth::{Credentials, OAuthConfig, TokenManager};
use crate::error::Error;
use crate::queue::RequestQueue;
use crate::recovery::{FailureClass, error_from_response};
use crate::request::{ApiRequest, Attempt};
use crate::session::SessionBinding;
use crate::transport::TransportConfig;

/// What the recovery step decided for a failed attempt.
enum Recovery {
    /// Corrective action succeeded; submit the same request again.
    Resubmit,
    /// Give up and hand this error to the caller.
    Fail(Error),
}

/// Async client for the thermostat cloud API.
///
/// Every call goes through one instance-scoped [`RequestQueue`], so calls
/// against the same client never overlap beyond the configured bound and
/// complete in submission order. Failed calls are classified and, for
/// expired tokens or a lost agreement binding, recovered and resubmitted
/// at most once.
pub struct ToonClient {
    http: reqwest::Client,
    base_url: Url,
    tokens: TokenManager,
    queue: RequestQueue,
    session: SessionBinding,
}

impl ToonClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client from a transport config.
    ///
    /// `concurrency` bounds the number of API calls in flight (minimum 1).
    pub fn new(
        base_url: &str,
        oauth: OAuthConfig,
        credentials: Option<Credentials>,
        transport: &TransportConfig,
        concurrency: usize,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::from_reqwest(base_url, http, oauth, credentials, concurrency)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn from_reqwest(
        base_url: &str,
        http: reqwest::Client,
        oauth: OAuthConfig,
        credentials: Option<Credentials>,
        concurrency: usize,
    ) -> Result<Self, Error> {
        let base_url = Self::normalize_base_url(base_url)?;
        let tokens = TokenManager::new(http.clone(), oauth, credentials);
        Ok(Self {
            http,
            base_url,
            tokens,
            queue: RequestQueue::new(concurrency),
            session: SessionBinding::default(),
        })
    }

    /// Ensure the base URL ends with `/` so relative joins append to it.
    fn normalize_base_url(raw: &str) -> Result<Url, Error> {
        let mut url = Url::parse(raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// The agreement id remembered from the last successful bind.
    pub fn agreement_id(&self) -> Option<String> {
        self.session.current()
    }

    pub(crate) fn session(&self) -> &SessionBinding {
        &self.session
    }

    /// Abort queued requests and refuse new ones.
    pub fn close(&self) {
        self.queue.close();
    }

    // ── Dispatch with recovery ───────────────────────────────────────

    /// Submit a request through the queue, recovering once where allowed.
    ///
    /// The queue slot is held across recovery and resubmission, so a
    /// recovered call still completes before anything queued after it.
    /// Returns the parsed JSON body (`Value::Null` for empty bodies).
    pub async fn send(&self, request: &ApiRequest) -> Result<Value, Error> {
        self.queue
            .run(async {
                let mut attempt = Attempt::FIRST;
                loop {
                    let error = match self.attempt(request, attempt).await {
                        Ok(value) => return Ok(value),
                        Err(e) => e,
                    };
                    match self.recover(error, attempt).await {
                        Recovery::Resubmit => attempt = attempt.next(),
                        Recovery::Fail(e) => return Err(e),
                    }
                }
            })
            .await
    }

    /// Decide on, and carry out, the corrective action for a failed attempt.
    ///
    /// Runs inside the caller's queue slot; it must not enqueue.
    async fn recover(&self, error: Error, attempt: Attempt) -> Recovery {
        let class = FailureClass::of(&error);

        if class.is_retryable() && !attempt.can_retry() {
            debug!(?class, attempt = attempt.number(), "retry already consumed");
            return Recovery::Fail(error);
        }

        match class {
            FailureClass::Unauthorized => {
                info!("access token rejected, refreshing");
                match self.tokens.refresh().await {
                    Ok(_) => Recovery::Resubmit,
                    Err(refresh_error) => Recovery::Fail(refresh_error),
                }
            }
            FailureClass::SessionLost => {
                let Some(agreement_id) = self.session.current() else {
                    debug!("server error without a remembered agreement");
                    return Recovery::Fail(error);
                };
                info!(agreement_id, "re-binding agreement after server error");
                match self.rebind(&agreement_id).await {
                    Ok(()) => Recovery::Resubmit,
                    Err(bind_error) => {
                        warn!(error = %bind_error, "re-bind failed");
                        Recovery::Fail(error)
                    }
                }
            }
            // The queue was already drained in `attempt`.
            FailureClass::RateLimited
            | FailureClass::DeviceUnreachable
            | FailureClass::Terminal => Recovery::Fail(error),
        }
    }

    /// Bind the remembered agreement with a single, unrecovered attempt.
    async fn rebind(&self, agreement_id: &str) -> Result<(), Error> {
        let request = Self::bind_request(agreement_id);
        self.attempt(&request, Attempt::FIRST.next()).await?;
        self.session.remember(agreement_id);
        Ok(())
    }

    /// Run one HTTP attempt inside an already held slot.
    ///
    /// A 429 drains the queue before the slot is released, so no waiting
    /// request is dispatched in between.
    async fn attempt(&self, request: &ApiRequest, attempt: Attempt) -> Result<Value, Error> {
        let result = self.execute(request, attempt).await;
        if matches!(result, Err(Error::RateLimited)) {
            let aborted = self.queue.abort_all();
            warn!(aborted, "rate limited, dropped queued requests");
        }
        result
    }

    /// Perform the HTTP exchange for one attempt.
    async fn execute(&self, request: &ApiRequest, attempt: Attempt) -> Result<Value, Error> {
        let url = self.base_url.join(request.path())?;
        debug!(attempt = attempt.number(), "{} {url}", request.method());

        let token = self
            .tokens
            .access_token()
            .ok_or(Error::MissingArgument { name: "access_token" })?;
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
            .map_err(|e| Error::InvalidArgument {
                name: "access_token",
                reason: e.to_string(),
            })?;
        bearer.set_sensitive(true);

        let mut headers = request.headers().clone();
        headers.insert(AUTHORIZATION, bearer);

        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(headers);
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(error_from_response(status, body));
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body).map_err(|e| {
            let preview = body.chars().take(200).collect::<String>();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}
