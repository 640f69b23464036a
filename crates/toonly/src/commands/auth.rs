//! Authorization commands: authorize-url, authorize, refresh.

use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use serde::Serialize;

use toonly_core::{Credentials, Thermostat};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct TokenOutput {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl From<&Credentials> for TokenOutput {
    fn from(c: &Credentials) -> Self {
        Self {
            access_token: c.access_token.expose_secret().to_owned(),
            refresh_token: c
                .refresh_token
                .as_ref()
                .map(|t| t.expose_secret().to_owned()),
            expires_at: c.expires_at,
        }
    }
}

/// Environment assignments a user can paste to keep using these tokens.
fn env_lines(tokens: &TokenOutput) -> Vec<(String, String)> {
    let mut lines = vec![("TOONLY_ACCESS_TOKEN".to_owned(), tokens.access_token.clone())];
    if let Some(ref refresh) = tokens.refresh_token {
        lines.push(("TOONLY_REFRESH_TOKEN".to_owned(), refresh.clone()));
    }
    if let Some(expires_at) = tokens.expires_at {
        lines.push(("# expires".to_owned(), expires_at.to_rfc3339()));
    }
    lines
}

pub fn authorize_url(
    thermostat: &Thermostat,
    state: Option<&str>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let url = thermostat.authorization_url(state);
    let rendered = match global.output {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            serde_json::json!({ "url": url.as_str() }).to_string()
        }
        _ => url.to_string(),
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}

pub async fn authorize(
    thermostat: &Thermostat,
    code: &str,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let credentials = thermostat.exchange_code(code).await?;
    print_tokens(&credentials, global)
}

pub async fn refresh(thermostat: &Thermostat, global: &GlobalOpts) -> Result<(), CliError> {
    let credentials = thermostat.refresh_tokens().await?;
    print_tokens(&credentials, global)
}

fn print_tokens(credentials: &Credentials, global: &GlobalOpts) -> Result<(), CliError> {
    let tokens = TokenOutput::from(credentials);
    let out = output::render_single(global.output, &tokens, env_lines)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Tell the user about tokens replaced behind the scenes.
pub fn report_rotated(credentials: &Credentials) {
    let tokens = TokenOutput::from(credentials);
    eprintln!("note: tokens were refreshed during this command; update your environment:");
    for (key, value) in env_lines(&tokens) {
        eprintln!("{key}={value}");
    }
}
