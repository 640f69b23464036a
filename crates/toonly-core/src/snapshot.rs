// ── Device status snapshot ──
//
// Last known value of every tracked field. A field is `None` until it is
// first observed; after that it is only ever overwritten by a newer
// reading, never cleared.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::IntoEnumIterator;
use toonly_api::{StatusResponse, TemperatureState};

use crate::connectivity::Connectivity;

/// Fields tracked from the status endpoint.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum::IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Field {
    MeasureTemperature,
    TargetTemperature,
    MeterGas,
    MeterPower,
    TemperatureState,
    ProgramEnabled,
}

impl Field {
    /// Unit suffix for display, if the field has one.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            Self::MeasureTemperature | Self::TargetTemperature => Some("°C"),
            Self::MeterGas => Some("m³"),
            Self::MeterPower => Some("kWh"),
            Self::TemperatureState | Self::ProgramEnabled => None,
        }
    }

    /// Fields every thermostat reports.
    ///
    /// Meters need a smart meter, and there is no temperature state while a
    /// manual setpoint is active.
    pub fn is_always_reported(self) -> bool {
        matches!(
            self,
            Self::MeasureTemperature | Self::TargetTemperature | Self::ProgramEnabled
        )
    }

    /// This field's value in a status response, converted to domain units.
    fn read(self, status: &StatusResponse) -> Option<FieldValue> {
        match self {
            Self::MeasureTemperature => status.measure_temperature().map(FieldValue::Number),
            Self::TargetTemperature => status.target_temperature().map(FieldValue::Number),
            Self::MeterGas => status.meter_gas().map(FieldValue::Number),
            Self::MeterPower => status.meter_power().map(FieldValue::Number),
            Self::TemperatureState => status.temperature_state().map(FieldValue::State),
            Self::ProgramEnabled => status.program_enabled().map(FieldValue::Flag),
        }
    }
}

/// A single field value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    State(TemperatureState),
    Flag(bool),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::State(s) => write!(f, "{s}"),
            Self::Flag(true) => f.write_str("on"),
            Self::Flag(false) => f.write_str("off"),
        }
    }
}

/// A known field that took a different known value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldChange {
    pub field: Field,
    pub previous: FieldValue,
    pub current: FieldValue,
}

/// Point-in-time view of the thermostat.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    /// Measured room temperature in °C.
    pub measure_temperature: Option<f64>,
    /// Active setpoint in °C.
    pub target_temperature: Option<f64>,
    /// Gas meter in m³.
    pub meter_gas: Option<f64>,
    /// Electricity meter in kWh.
    pub meter_power: Option<f64>,
    pub temperature_state: Option<TemperatureState>,
    pub program_enabled: Option<bool>,
    pub connectivity: Connectivity,
    /// Time of the last successful status fetch.
    pub updated_at: Option<DateTime<Utc>>,
}

impl DeviceSnapshot {
    pub fn get(&self, field: Field) -> Option<FieldValue> {
        match field {
            Field::MeasureTemperature => self.measure_temperature.map(FieldValue::Number),
            Field::TargetTemperature => self.target_temperature.map(FieldValue::Number),
            Field::MeterGas => self.meter_gas.map(FieldValue::Number),
            Field::MeterPower => self.meter_power.map(FieldValue::Number),
            Field::TemperatureState => self.temperature_state.map(FieldValue::State),
            Field::ProgramEnabled => self.program_enabled.map(FieldValue::Flag),
        }
    }

    fn set(&mut self, field: Field, value: FieldValue) {
        match (field, value) {
            (Field::MeasureTemperature, FieldValue::Number(n)) => self.measure_temperature = Some(n),
            (Field::TargetTemperature, FieldValue::Number(n)) => self.target_temperature = Some(n),
            (Field::MeterGas, FieldValue::Number(n)) => self.meter_gas = Some(n),
            (Field::MeterPower, FieldValue::Number(n)) => self.meter_power = Some(n),
            (Field::TemperatureState, FieldValue::State(s)) => self.temperature_state = Some(s),
            (Field::ProgramEnabled, FieldValue::Flag(b)) => self.program_enabled = Some(b),
            // `Field::read` only produces the matching variant.
            _ => {}
        }
    }

    /// Returns `true` if at least one field has been observed.
    pub fn has_readings(&self) -> bool {
        Field::iter().any(|field| self.get(field).is_some())
    }

    /// Returns `true` once every always-reported field is known.
    pub fn is_populated(&self) -> bool {
        Field::iter()
            .filter(|field| field.is_always_reported())
            .all(|field| self.get(field).is_some())
    }

    /// Merge a status response, returning the known-to-different-known
    /// transitions. Absent readings leave the stored value as is.
    pub(crate) fn apply(&mut self, status: &StatusResponse) -> Vec<FieldChange> {
        let mut changes = Vec::new();
        for field in Field::iter() {
            let Some(current) = field.read(status) else {
                continue;
            };
            if let Some(previous) = self.get(field) {
                if previous != current {
                    changes.push(FieldChange {
                        field,
                        previous,
                        current,
                    });
                }
            }
            self.set(field, current);
        }
        changes
    }
}
