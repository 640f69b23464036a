// Thermostat API wire types
//
// Field names follow the upstream JSON (camelCase). Temperatures are sent
// and received in hundredths of a degree Celsius; meter readings in Wh and
// dm³. The accessor methods convert to °C, kWh and m³.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A thermostat agreement the account has access to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Agreement {
    pub agreement_id: String,
    #[serde(default)]
    pub display_common_name: Option<String>,
    #[serde(default)]
    pub display_address: Option<String>,
    #[serde(default)]
    pub display_hardware_version: Option<String>,
    #[serde(default)]
    pub display_software_version: Option<String>,
    #[serde(default)]
    pub heating_type: Option<String>,
}

/// Preset temperature program states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemperatureState {
    Comfort,
    Home,
    Sleep,
    Away,
}

impl TemperatureState {
    pub const ALL: [Self; 4] = [Self::Comfort, Self::Home, Self::Sleep, Self::Away];

    /// Numeric code used on the wire.
    pub fn code(self) -> i32 {
        match self {
            Self::Comfort => 0,
            Self::Home => 1,
            Self::Sleep => 2,
            Self::Away => 3,
        }
    }

    /// Decode the wire value. Negative codes mean "manual" (no preset active).
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.code() == code)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Comfort => "comfort",
            Self::Home => "home",
            Self::Sleep => "sleep",
            Self::Away => "away",
        }
    }
}

impl fmt::Display for TemperatureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Response of `GET status`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    #[serde(default)]
    pub thermostat_info: Option<ThermostatInfo>,
    #[serde(default)]
    pub power_usage: Option<PowerUsage>,
    #[serde(default)]
    pub gas_usage: Option<GasUsage>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatInfo {
    #[serde(default)]
    pub current_temp: Option<i32>,
    #[serde(default)]
    pub current_setpoint: Option<i32>,
    #[serde(default)]
    pub active_state: Option<i32>,
    #[serde(default)]
    pub program_state: Option<i32>,
    #[serde(default)]
    pub burner_info: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerUsage {
    /// Current draw in W.
    #[serde(default)]
    pub value: Option<f64>,
    /// Normal-tariff meter reading in Wh.
    #[serde(default)]
    pub meter_reading: Option<f64>,
    /// Low-tariff meter reading in Wh.
    #[serde(default)]
    pub meter_reading_low: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GasUsage {
    #[serde(default)]
    pub value: Option<f64>,
    /// Meter reading in dm³.
    #[serde(default)]
    pub meter_reading: Option<f64>,
}

impl StatusResponse {
    /// Measured room temperature in °C.
    pub fn measure_temperature(&self) -> Option<f64> {
        self.thermostat_info
            .as_ref()
            .and_then(|t| t.current_temp)
            .map(from_centi)
    }

    /// Active setpoint in °C.
    pub fn target_temperature(&self) -> Option<f64> {
        self.thermostat_info
            .as_ref()
            .and_then(|t| t.current_setpoint)
            .map(from_centi)
    }

    /// Active preset, `None` when unknown or in manual mode.
    pub fn temperature_state(&self) -> Option<TemperatureState> {
        self.thermostat_info
            .as_ref()
            .and_then(|t| t.active_state)
            .and_then(TemperatureState::from_code)
    }

    /// Whether the weekly program is running.
    pub fn program_enabled(&self) -> Option<bool> {
        self.thermostat_info
            .as_ref()
            .and_then(|t| t.program_state)
            .map(|s| s != 0)
    }

    /// Gas meter in m³.
    pub fn meter_gas(&self) -> Option<f64> {
        self.gas_usage
            .as_ref()
            .and_then(|g| g.meter_reading)
            .map(|dm3| dm3 / 1000.0)
    }

    /// Combined (normal + low tariff) electricity meter in kWh.
    pub fn meter_power(&self) -> Option<f64> {
        let usage = self.power_usage.as_ref()?;
        match (usage.meter_reading, usage.meter_reading_low) {
            (None, None) => None,
            (high, low) => Some((high.unwrap_or(0.0) + low.unwrap_or(0.0)) / 1000.0),
        }
    }
}

fn from_centi(value: i32) -> f64 {
    f64::from(value) / 100.0
}

/// Convert °C to the hundredths used on the wire.
///
/// Callers validate finiteness first; the value is rounded to the nearest
/// hundredth.
#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
pub(crate) fn to_centi(celsius: f64) -> i64 {
    (celsius * 100.0).round() as i64
}
