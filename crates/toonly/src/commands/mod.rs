//! Command handlers.
//!
//! Every command that talks to the service builds a fresh `Thermostat`
//! from config + flags, runs, and destroys it before returning.

pub mod auth;
pub mod config_cmd;
pub mod device;
pub mod watch;

use toonly_config::Config;
use toonly_core::Thermostat;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Load the config file named by `--config` (or the default one) and
/// apply flag overrides on top.
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = match global.config {
        Some(ref path) => toonly_config::load_config_from(path)?,
        None => toonly_config::load_config()?,
    };
    if let Some(ref agreement) = global.agreement {
        cfg.agreement_id = Some(agreement.clone());
    }
    if let Some(ref token) = global.access_token {
        cfg.access_token = Some(token.clone());
    }
    if let Some(ref token) = global.refresh_token {
        cfg.refresh_token = Some(token.clone());
    }
    Ok(cfg)
}

/// What a command needs before it can run.
struct Requirements {
    tokens: bool,
    agreement: bool,
}

impl Requirements {
    fn of(cmd: &Command) -> Self {
        match cmd {
            Command::AuthorizeUrl { .. } | Command::Authorize { .. } => Self {
                tokens: false,
                agreement: false,
            },
            Command::Refresh | Command::Agreements => Self {
                tokens: true,
                agreement: false,
            },
            _ => Self {
                tokens: true,
                agreement: true,
            },
        }
    }
}

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = load_config(global)?;
    let mut config = toonly_config::to_thermostat_config(&cfg)?;

    let needs = Requirements::of(&cmd);
    let prints_tokens = matches!(cmd, Command::Refresh);
    if needs.tokens && config.credentials.is_none() {
        return Err(CliError::NoCredentials);
    }
    let agreement = config.agreement_id.clone();
    if needs.agreement && agreement.is_none() {
        return Err(CliError::NoAgreement);
    }

    // One-shot commands never poll; `watch` sets its own interval.
    let poll_secs = match cmd {
        Command::Watch { interval } => interval.unwrap_or(cfg.poll_interval),
        _ => 0,
    };
    config.poll_interval_secs = poll_secs;

    let thermostat = Thermostat::new(config)?;
    let mut credentials = thermostat.credentials();

    let result = run_command(cmd, &thermostat, agreement.as_deref(), global).await;
    thermostat.destroy().await;

    // Tokens rotated by an automatic refresh must reach the user, since
    // the old refresh token may no longer be accepted.
    if needs.tokens && !prints_tokens && credentials.has_changed().unwrap_or(false) {
        if let Some(current) = credentials.borrow_and_update().as_ref() {
            auth::report_rotated(current);
        }
    }
    result
}

async fn run_command(
    cmd: Command,
    thermostat: &Thermostat,
    agreement: Option<&str>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::AuthorizeUrl { state } => auth::authorize_url(thermostat, state.as_deref(), global),
        Command::Authorize { code } => auth::authorize(thermostat, &code, global).await,
        Command::Refresh => auth::refresh(thermostat, global).await,
        Command::Agreements => device::agreements(thermostat, global).await,
        Command::Status => {
            bind(thermostat, agreement).await?;
            device::status(thermostat, global).await
        }
        Command::SetTemp { celsius } => {
            bind(thermostat, agreement).await?;
            device::set_temp(thermostat, celsius, global).await
        }
        Command::SetState { state } => {
            bind(thermostat, agreement).await?;
            device::set_state(thermostat, state.into(), global).await
        }
        Command::Program { mode } => {
            bind(thermostat, agreement).await?;
            device::program(thermostat, mode, global).await
        }
        Command::Watch { .. } => watch::handle(thermostat, global).await,
        Command::Config(_) | Command::Completions { .. } => Ok(()),
    }
}

async fn bind(thermostat: &Thermostat, agreement: Option<&str>) -> Result<(), CliError> {
    let id = agreement.ok_or(CliError::NoAgreement)?;
    Ok(thermostat.bind(id).await?)
}
