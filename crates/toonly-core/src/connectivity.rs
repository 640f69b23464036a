// ── Connectivity tracking ──
//
// Online/offline belief about the thermostat, driven by operation outcomes.
// Events fire on edge crossings only; a same-state update is silent.

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

use crate::event::ThermostatEvent;

/// Reachability of the thermostat as seen through the cloud service.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, strum::Display, strum::IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Connectivity {
    /// No operation has completed yet.
    #[default]
    Unknown,
    Online,
    Offline,
}

/// Sole owner of the connectivity state.
pub(crate) struct ConnectivityTracker {
    state: watch::Sender<Connectivity>,
    events: broadcast::Sender<ThermostatEvent>,
}

impl ConnectivityTracker {
    pub(crate) fn new(events: broadcast::Sender<ThermostatEvent>) -> Self {
        let (state, _) = watch::channel(Connectivity::Unknown);
        Self { state, events }
    }

    /// Record a successful operation. Returns `true` on a transition.
    pub(crate) fn mark_online(&self) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == Connectivity::Online {
                return false;
            }
            *state = Connectivity::Online;
            true
        });
        if changed {
            info!("thermostat online");
            let _ = self.events.send(ThermostatEvent::Online);
        }
        changed
    }

    /// Record a communication failure. Returns `true` on a transition.
    pub(crate) fn mark_offline(&self, reason: &str) -> bool {
        let changed = self.state.send_if_modified(|state| {
            if *state == Connectivity::Offline {
                return false;
            }
            *state = Connectivity::Offline;
            true
        });
        if changed {
            warn!(reason, "thermostat offline");
            let _ = self.events.send(ThermostatEvent::Offline {
                reason: reason.to_owned(),
            });
        }
        changed
    }

    pub(crate) fn current(&self) -> Connectivity {
        *self.state.borrow()
    }

    pub(crate) fn is_offline(&self) -> bool {
        self.current() == Connectivity::Offline
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Connectivity> {
        self.state.subscribe()
    }
}
