// toonly-core: Thermostat state, polling and events between toonly-api and consumers.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod event;
pub mod snapshot;
pub mod thermostat;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::ThermostatConfig;
pub use connectivity::Connectivity;
pub use error::CoreError;
pub use event::ThermostatEvent;
pub use snapshot::{DeviceSnapshot, Field, FieldChange, FieldValue};
pub use thermostat::Thermostat;

// API types that appear in this crate's signatures.
pub use toonly_api::{Agreement, Credentials, OAuthConfig, TemperatureState, TlsMode};
