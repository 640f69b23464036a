//! `toonly watch`: poll the thermostat and print events until Ctrl-C.

use std::pin::pin;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_stream::StreamExt;
use tracing::debug;

use toonly_core::{Field, FieldValue, Thermostat, ThermostatEvent};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output::{self, Tone};

/// One printed event.
#[derive(Serialize)]
struct EventLine {
    at: DateTime<Utc>,
    event: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<Field>,
    #[serde(skip_serializing_if = "Option::is_none")]
    previous: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl EventLine {
    fn new(event: &'static str) -> Self {
        Self {
            at: Utc::now(),
            event,
            field: None,
            previous: None,
            current: None,
            detail: None,
        }
    }

    fn from_event(event: &ThermostatEvent) -> Self {
        match event {
            ThermostatEvent::Initialized(snapshot) => Self {
                detail: snapshot
                    .measure_temperature
                    .map(|t| format!("measured {t} °C")),
                ..Self::new("initialized")
            },
            ThermostatEvent::FieldChanged(change) => Self {
                field: Some(change.field),
                previous: Some(change.previous),
                current: Some(change.current),
                ..Self::new("changed")
            },
            ThermostatEvent::Online => Self::new("online"),
            ThermostatEvent::Offline { reason } => Self {
                detail: Some(reason.clone()),
                ..Self::new("offline")
            },
            ThermostatEvent::TokensRefreshed { expires_at } => Self {
                detail: expires_at.map(|at| format!("expires {}", at.to_rfc3339())),
                ..Self::new("tokens_refreshed")
            },
        }
    }

    fn render_text(&self, color: bool) -> String {
        let tone = match self.event {
            "online" | "initialized" => Tone::Good,
            "offline" => Tone::Bad,
            _ => Tone::Info,
        };
        let mut line = format!(
            "{} {}",
            self.at.format("%H:%M:%S"),
            output::paint(self.event, tone, color)
        );
        if let (Some(field), Some(previous), Some(current)) =
            (self.field, self.previous, self.current)
        {
            line.push_str(&format!(" {field}: {previous} -> {current}"));
        }
        if let Some(ref detail) = self.detail {
            line.push_str(&format!(" ({detail})"));
        }
        line
    }
}

pub async fn handle(thermostat: &Thermostat, global: &GlobalOpts) -> Result<(), CliError> {
    if thermostat.config().poll_interval_secs == 0 {
        return Err(CliError::Validation {
            field: "interval".into(),
            reason: "polling is disabled; pass --interval or set poll_interval".into(),
        });
    }

    let color = output::should_color(global.color);
    let mut events = pin!(thermostat.event_stream());
    let mut ctrl_c = pin!(tokio::signal::ctrl_c());

    thermostat.start().await?;

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                debug!("interrupted");
                break;
            }
            event = events.next() => {
                let Some(event) = event else { break };
                let line = EventLine::from_event(&event);
                let rendered = match global.output {
                    OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(&line)?,
                    OutputFormat::Table | OutputFormat::Plain => line.render_text(color),
                };
                output::print_output(&rendered, global.quiet);
            }
        }
    }
    Ok(())
}
