// ── Thermostat handle ──
//
// Lifecycle management for one thermostat: owns the API client, the status
// snapshot and the connectivity tracker, runs the status poller and
// publishes typed events. Every operation outcome passes through
// `track`, which keeps the connectivity belief current.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{Mutex as AsyncMutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use toonly_api::transport::TransportConfig;
use toonly_api::{Agreement, Credentials, TemperatureState, ToonClient};

use crate::config::ThermostatConfig;
use crate::connectivity::{Connectivity, ConnectivityTracker};
use crate::error::CoreError;
use crate::event::ThermostatEvent;
use crate::snapshot::DeviceSnapshot;

const EVENT_CHANNEL_SIZE: usize = 256;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ThermostatInner>`. Construction does no I/O;
/// call [`start()`](Self::start) to bind the configured agreement and spawn
/// background tasks.
#[derive(Clone)]
pub struct Thermostat {
    inner: Arc<ThermostatInner>,
}

struct ThermostatInner {
    config: ThermostatConfig,
    client: ToonClient,
    snapshot: Mutex<DeviceSnapshot>,
    initialized: AtomicBool,
    connectivity: ConnectivityTracker,
    event_tx: broadcast::Sender<ThermostatEvent>,
    cancel: CancellationToken,
    task_handles: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl Drop for ThermostatInner {
    fn drop(&mut self) {
        // Last handle gone without `destroy()`: stop the background tasks.
        self.cancel.cancel();
    }
}

impl Thermostat {
    pub fn new(config: ThermostatConfig) -> Result<Self, CoreError> {
        let transport = TransportConfig {
            tls: config.tls.clone(),
            timeout: config.timeout,
        };
        let client = ToonClient::new(
            config.api_url.as_str(),
            config.oauth.clone(),
            config.credentials.clone(),
            &transport,
            config.concurrency,
        )?;
        Ok(Self::with_client(config, client))
    }

    /// Wrap an already constructed client.
    pub fn with_client(config: ThermostatConfig, client: ToonClient) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            inner: Arc::new(ThermostatInner {
                config,
                client,
                snapshot: Mutex::new(DeviceSnapshot::default()),
                initialized: AtomicBool::new(false),
                connectivity: ConnectivityTracker::new(event_tx.clone()),
                event_tx,
                cancel: CancellationToken::new(),
                task_handles: AsyncMutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &ThermostatConfig {
        &self.inner.config
    }

    pub fn client(&self) -> &ToonClient {
        &self.inner.client
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start background work.
    ///
    /// Spawns the token notification forwarder, binds the configured
    /// agreement (if any) and starts the poller when the configured
    /// interval is non-zero.
    pub async fn start(&self) -> Result<(), CoreError> {
        self.spawn(token_watch_task(
            self.inner.client.tokens().subscribe(),
            self.inner.event_tx.clone(),
            self.inner.cancel.clone(),
        ))
        .await;

        if let Some(agreement_id) = self.inner.config.agreement_id.clone() {
            self.bind(&agreement_id).await?;
        }

        let secs = self.inner.config.poll_interval_secs;
        if secs > 0 {
            self.start_polling(Duration::from_secs(secs)).await;
        }
        Ok(())
    }

    /// Fetch status every `every` until [`destroy()`](Self::destroy).
    pub async fn start_polling(&self, every: Duration) {
        info!(interval = ?every, "starting status poller");
        self.spawn(poll_task(
            Arc::downgrade(&self.inner),
            every,
            self.inner.cancel.clone(),
        ))
        .await;
    }

    /// Tear the handle down.
    ///
    /// Cancels background tasks, aborts queued requests and refuses new
    /// ones. Calls made afterwards fail with [`CoreError::Closed`].
    pub async fn destroy(&self) {
        self.inner.cancel.cancel();
        self.inner.client.close();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        debug!("thermostat destroyed");
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    async fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        self.inner.task_handles.lock().await.push(tokio::spawn(task));
    }

    // ── Authorization ────────────────────────────────────────────────

    /// URL the user visits to grant this client access.
    pub fn authorization_url(&self, state: Option<&str>) -> Url {
        self.inner.client.tokens().oauth().authorization_url(state)
    }

    /// Exchange an authorization code for a token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<Credentials, CoreError> {
        Ok(self.inner.client.tokens().exchange_code(code).await?)
    }

    /// Force a token refresh.
    pub async fn refresh_tokens(&self) -> Result<Credentials, CoreError> {
        Ok(self.inner.client.tokens().refresh().await?)
    }

    /// Replace the token pair with one restored by the caller.
    pub fn restore_credentials(&self, credentials: Credentials) {
        self.inner.client.tokens().restore(credentials);
    }

    // ── Operations ───────────────────────────────────────────────────

    pub async fn list_agreements(&self) -> Result<Vec<Agreement>, CoreError> {
        let result = self.inner.client.list_agreements().await;
        self.track(result)
    }

    /// Bind the agreement and seed the snapshot with one status fetch.
    ///
    /// A failing seed fetch is logged; the bind itself still succeeded.
    pub async fn bind(&self, agreement_id: &str) -> Result<(), CoreError> {
        let result = self.inner.client.bind(agreement_id).await;
        self.track(result)?;

        if let Err(e) = self.fetch_status().await {
            warn!(error = %e, "status fetch after bind failed");
        }
        Ok(())
    }

    /// Fetch status, update the snapshot and publish changes.
    pub async fn fetch_status(&self) -> Result<DeviceSnapshot, CoreError> {
        let result = self.inner.client.status().await;
        let status = self.track(result)?;

        let (changes, snapshot) = {
            let mut current = self.lock_snapshot();
            let changes = current.apply(&status);
            current.updated_at = Some(Utc::now());
            current.connectivity = self.inner.connectivity.current();
            (changes, current.clone())
        };

        if snapshot.is_populated() && !self.inner.initialized.swap(true, Ordering::SeqCst) {
            info!("thermostat initialized");
            let _ = self
                .inner
                .event_tx
                .send(ThermostatEvent::Initialized(snapshot.clone()));
        }
        for change in changes {
            debug!(field = %change.field, value = %change.current, "field changed");
            let _ = self.inner.event_tx.send(ThermostatEvent::FieldChanged(change));
        }
        Ok(snapshot)
    }

    /// Set the target temperature in °C. Returns the value that was set.
    pub async fn set_target_temperature(&self, celsius: f64) -> Result<f64, CoreError> {
        let result = self.inner.client.set_target_temperature(celsius).await;
        self.track(result)
    }

    pub async fn set_temperature_state(&self, state: TemperatureState) -> Result<(), CoreError> {
        let result = self.inner.client.set_temperature_state(state).await;
        self.track(result)
    }

    /// Enable or disable the weekly program.
    pub async fn set_program(&self, enabled: bool) -> Result<(), CoreError> {
        let result = self.inner.client.set_program(enabled).await;
        self.track(result)
    }

    /// Record the outcome of a device-facing call and translate its error.
    fn track<T>(&self, result: Result<T, toonly_api::Error>) -> Result<T, CoreError> {
        match &result {
            Ok(_) => {
                self.inner.connectivity.mark_online();
            }
            Err(e) if e.is_device_unreachable() => {
                self.inner.connectivity.mark_offline(&e.to_string());
            }
            Err(_) => {}
        }
        result.map_err(CoreError::from)
    }

    // ── State access ─────────────────────────────────────────────────

    /// The last known snapshot.
    pub fn snapshot(&self) -> DeviceSnapshot {
        let mut snapshot = self.lock_snapshot().clone();
        snapshot.connectivity = self.inner.connectivity.current();
        snapshot
    }

    pub fn is_offline(&self) -> bool {
        self.inner.connectivity.is_offline()
    }

    pub fn agreement_id(&self) -> Option<String> {
        self.inner.client.agreement_id()
    }

    fn lock_snapshot(&self) -> MutexGuard<'_, DeviceSnapshot> {
        self.inner
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Subscribe to the event broadcast.
    pub fn events(&self) -> broadcast::Receiver<ThermostatEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Events as a `Stream`. Lagged receivers skip the missed events.
    pub fn event_stream(&self) -> impl Stream<Item = ThermostatEvent> + use<> {
        BroadcastStream::new(self.events()).filter_map(Result::ok)
    }

    pub fn connectivity(&self) -> watch::Receiver<Connectivity> {
        self.inner.connectivity.subscribe()
    }

    /// Current credentials; changes whenever tokens are exchanged,
    /// refreshed or restored.
    pub fn credentials(&self) -> watch::Receiver<Option<Credentials>> {
        self.inner.client.tokens().subscribe()
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Periodically fetch status until cancelled or every handle is gone.
async fn poll_task(inner: Weak<ThermostatInner>, every: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let Some(inner) = inner.upgrade() else { break };
                let thermostat = Thermostat { inner };
                if let Err(e) = thermostat.fetch_status().await {
                    warn!(error = %e, "periodic status fetch failed");
                }
            }
        }
    }
    info!("status poller stopped");
}

/// Forward credential replacements as `TokensRefreshed` events.
async fn token_watch_task(
    mut credentials: watch::Receiver<Option<Credentials>>,
    events: broadcast::Sender<ThermostatEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            changed = credentials.changed() => {
                if changed.is_err() {
                    break;
                }
                let expires_at = credentials
                    .borrow_and_update()
                    .as_ref()
                    .and_then(|c| c.expires_at);
                let _ = events.send(ThermostatEvent::TokensRefreshed { expires_at });
            }
        }
    }
}
