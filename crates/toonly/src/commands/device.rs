//! Thermostat commands: agreements, status, set-temp, set-state, program.

use serde::Serialize;
use tabled::Tabled;

use toonly_core::{Agreement, DeviceSnapshot, Field, TemperatureState, Thermostat};

use crate::cli::{GlobalOpts, Toggle};
use crate::error::CliError;
use crate::output;

// ── Agreements ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct AgreementRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Heating")]
    heating: String,
    #[tabled(rename = "Software")]
    software: String,
}

fn or_dash(value: Option<&String>) -> String {
    value.cloned().unwrap_or_else(|| "-".into())
}

impl From<&Agreement> for AgreementRow {
    fn from(a: &Agreement) -> Self {
        Self {
            id: a.agreement_id.clone(),
            name: or_dash(a.display_common_name.as_ref()),
            address: or_dash(a.display_address.as_ref()),
            heating: or_dash(a.heating_type.as_ref()),
            software: or_dash(a.display_software_version.as_ref()),
        }
    }
}

pub async fn agreements(thermostat: &Thermostat, global: &GlobalOpts) -> Result<(), CliError> {
    let agreements = thermostat.list_agreements().await?;
    let out = output::render_list(
        global.output,
        &agreements,
        |a: &Agreement| AgreementRow::from(a),
        |a| a.agreement_id.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Status ───────────────────────────────────────────────────────────

fn status_details(snapshot: &DeviceSnapshot) -> Vec<(String, String)> {
    let mut rows: Vec<(String, String)> = [
        Field::MeasureTemperature,
        Field::TargetTemperature,
        Field::TemperatureState,
        Field::ProgramEnabled,
        Field::MeterGas,
        Field::MeterPower,
    ]
    .into_iter()
    .map(|field| {
        let value = match (snapshot.get(field), field.unit()) {
            (Some(v), Some(unit)) => format!("{v} {unit}"),
            (Some(v), None) => v.to_string(),
            (None, _) => "-".into(),
        };
        (field.to_string(), value)
    })
    .collect();

    rows.push(("connectivity".into(), snapshot.connectivity.to_string()));
    if let Some(at) = snapshot.updated_at {
        rows.push(("updated_at".into(), at.to_rfc3339()));
    }
    rows
}

pub async fn status(thermostat: &Thermostat, global: &GlobalOpts) -> Result<(), CliError> {
    // Binding already seeds the snapshot; fetch only if that failed.
    let current = thermostat.snapshot();
    let snapshot = if current.has_readings() {
        current
    } else {
        thermostat.fetch_status().await?
    };

    let out = output::render_single(global.output, &snapshot, status_details)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Applied {
    field: Field,
    value: String,
}

fn print_applied(field: Field, value: String, global: &GlobalOpts) -> Result<(), CliError> {
    let applied = Applied { field, value };
    let out = output::render_single(global.output, &applied, |a| {
        vec![(a.field.to_string(), a.value.clone())]
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn set_temp(
    thermostat: &Thermostat,
    celsius: f64,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let value = thermostat.set_target_temperature(celsius).await?;
    print_applied(Field::TargetTemperature, format!("{value}"), global)
}

pub async fn set_state(
    thermostat: &Thermostat,
    state: TemperatureState,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    thermostat.set_temperature_state(state).await?;
    print_applied(Field::TemperatureState, state.to_string(), global)
}

pub async fn program(
    thermostat: &Thermostat,
    mode: Toggle,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let enabled = matches!(mode, Toggle::On);
    thermostat.set_program(enabled).await?;
    print_applied(
        Field::ProgramEnabled,
        if enabled { "on" } else { "off" }.into(),
        global,
    )
}
