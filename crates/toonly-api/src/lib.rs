// toonly-api: Async Rust client for the Toon thermostat cloud API

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod queue;
pub mod recovery;
pub mod request;
pub mod session;
mod thermostat;
pub mod transport;

pub use auth::{Credentials, OAuthConfig, TokenManager};
pub use client::ToonClient;
pub use error::{Error, RefreshError};
pub use models::{Agreement, StatusResponse, TemperatureState};
pub use queue::{DEFAULT_CONCURRENCY, RequestQueue};
pub use recovery::FailureClass;
pub use request::{ApiRequest, Attempt};
pub use transport::{TlsMode, TransportConfig};
