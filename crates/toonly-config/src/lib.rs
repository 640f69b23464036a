//! Configuration for the toonly thermostat client.
//!
//! A flat TOML file layered with `TOONLY_*` environment variables, and
//! translation into `toonly_core::ThermostatConfig`. Tokens can be supplied
//! through the environment; nothing is ever written back to disk.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use toonly_core::{Credentials, OAuthConfig, ThermostatConfig, TlsMode};

pub const DEFAULT_API_URL: &str = "https://api.toon.eu/toon/v3/";
pub const DEFAULT_AUTHORIZE_URL: &str = "https://api.toon.eu/authorize";
pub const DEFAULT_TOKEN_URL: &str = "https://api.toon.eu/token";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:8808/callback";

const ENV_PREFIX: &str = "TOONLY_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("missing {field}: set it in {path} or via {env}")]
    Missing {
        field: &'static str,
        env: String,
        path: String,
    },

    #[error("failed to render config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Contents of `config.toml`. Every key can be overridden by the
/// upper-cased variable with the `TOONLY_` prefix (`TOONLY_CLIENT_ID`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub api_url: String,
    pub authorize_url: String,
    pub token_url: String,
    pub redirect_uri: String,
    pub client_id: Option<String>,
    /// OAuth client secret (plaintext; prefer `TOONLY_CLIENT_SECRET`).
    pub client_secret: Option<String>,
    /// Access token, usually from `TOONLY_ACCESS_TOKEN`.
    pub access_token: Option<String>,
    /// Refresh token, usually from `TOONLY_REFRESH_TOKEN`.
    pub refresh_token: Option<String>,
    /// Agreement bound at startup.
    pub agreement_id: Option<String>,
    /// Status poll interval in seconds. 0 disables polling.
    pub poll_interval: u64,
    /// Request timeout in seconds.
    pub timeout: u64,
    /// Maximum API calls in flight.
    pub concurrency: usize,
    /// Extra CA certificate (PEM) to trust.
    pub ca_cert: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.into(),
            authorize_url: DEFAULT_AUTHORIZE_URL.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
            redirect_uri: DEFAULT_REDIRECT_URI.into(),
            client_id: None,
            client_secret: None,
            access_token: None,
            refresh_token: None,
            agreement_id: None,
            poll_interval: 60,
            timeout: 30,
            concurrency: 1,
            ca_cert: None,
        }
    }
}

impl Config {
    /// Render as TOML with secrets masked.
    pub fn to_redacted_toml(&self) -> Result<String, ConfigError> {
        let mask = |v: &Option<String>| v.as_ref().map(|_| "********".to_owned());
        let redacted = Self {
            client_secret: mask(&self.client_secret),
            access_token: mask(&self.access_token),
            refresh_token: mask(&self.refresh_token),
            ..self.clone()
        };
        Ok(toml::to_string_pretty(&redacted)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("eu", "toonly", "toonly").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("toonly");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path` + environment. A missing file is not an
/// error; defaults and environment still apply.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX))
        .extract()?;
    Ok(config)
}

// ── Translation ─────────────────────────────────────────────────────

/// Validate `config` and build the runtime `ThermostatConfig`.
pub fn to_thermostat_config(config: &Config) -> Result<ThermostatConfig, ConfigError> {
    let client_id = required(config.client_id.as_deref(), "client_id")?;
    let client_secret = required(config.client_secret.as_deref(), "client_secret")?;

    if config.concurrency == 0 {
        return Err(ConfigError::Validation {
            field: "concurrency".into(),
            reason: "must be at least 1".into(),
        });
    }
    if config.timeout == 0 {
        return Err(ConfigError::Validation {
            field: "timeout".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let oauth = OAuthConfig {
        authorize_url: parse_url("authorize_url", &config.authorize_url)?,
        token_url: parse_url("token_url", &config.token_url)?,
        client_id: client_id.to_owned(),
        client_secret: SecretString::from(client_secret.to_owned()),
        redirect_uri: config.redirect_uri.clone(),
    };

    let mut thermostat = ThermostatConfig::new(parse_url("api_url", &config.api_url)?, oauth)
        .with_poll_interval(config.poll_interval);
    thermostat.timeout = Duration::from_secs(config.timeout);
    thermostat.concurrency = config.concurrency;
    if let Some(ref ca) = config.ca_cert {
        thermostat.tls = TlsMode::CustomCa(ca.clone());
    }
    if let Some(ref access) = config.access_token {
        thermostat.credentials = Some(Credentials::new(access.clone(), config.refresh_token.clone()));
    }
    if let Some(ref agreement) = config.agreement_id {
        thermostat.agreement_id = Some(agreement.clone());
    }
    Ok(thermostat)
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ConfigError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ConfigError::Missing {
            field,
            env: format!("{ENV_PREFIX}{}", field.to_ascii_uppercase()),
            path: config_path().display().to_string(),
        })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("{e}: {raw}"),
    })
}
