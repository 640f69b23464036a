use chrono::{DateTime, Utc};

use crate::snapshot::{DeviceSnapshot, FieldChange};

/// Notifications published on [`Thermostat::events`](crate::Thermostat::events).
#[derive(Debug, Clone, PartialEq)]
pub enum ThermostatEvent {
    /// First successful status fetch of this handle's lifetime.
    Initialized(DeviceSnapshot),
    /// A known field took a different known value.
    FieldChanged(FieldChange),
    /// The thermostat became reachable.
    Online,
    /// The cloud service reported it cannot reach the thermostat.
    Offline { reason: String },
    /// The token pair was replaced. Read the new pair from
    /// [`Thermostat::credentials`](crate::Thermostat::credentials).
    TokensRefreshed { expires_at: Option<DateTime<Utc>> },
}
