// Thermostat endpoints
//
// Typed operations on top of `ToonClient::send`. Local argument checks run
// before anything is queued, so a rejected argument never costs a request.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::info;

use crate::client::ToonClient;
use crate::error::Error;
use crate::models::{Agreement, StatusResponse, TemperatureState, to_centi};
use crate::request::ApiRequest;

const AGREEMENTS_PATH: &str = "agreements";
const STATUS_PATH: &str = "status";
const TEMPERATURE_PATH: &str = "temperature";
const TEMPERATURE_STATES_PATH: &str = "temperature/states";
const PROGRAM_PATH: &str = "temperature/program";

impl ToonClient {
    pub(crate) fn bind_request(agreement_id: &str) -> ApiRequest {
        ApiRequest::post(AGREEMENTS_PATH, json!({ "agreementId": agreement_id }))
    }

    /// List the agreements (thermostats) available to the account.
    pub async fn list_agreements(&self) -> Result<Vec<Agreement>, Error> {
        let value = self.send(&ApiRequest::get(AGREEMENTS_PATH)).await?;
        decode(value)
    }

    /// Select the agreement subsequent calls apply to.
    ///
    /// The id is remembered so the client can re-bind on its own after a
    /// server error.
    pub async fn bind(&self, agreement_id: &str) -> Result<(), Error> {
        if agreement_id.trim().is_empty() {
            return Err(Error::MissingArgument {
                name: "agreement_id",
            });
        }
        self.send(&Self::bind_request(agreement_id)).await?;
        self.session().remember(agreement_id);
        info!(agreement_id, "agreement bound");
        Ok(())
    }

    /// Fetch the current thermostat status.
    pub async fn status(&self) -> Result<StatusResponse, Error> {
        let value = self.send(&ApiRequest::get(STATUS_PATH)).await?;
        decode(value)
    }

    /// Set the target temperature in °C. Returns the value that was set.
    pub async fn set_target_temperature(&self, celsius: f64) -> Result<f64, Error> {
        if !celsius.is_finite() {
            return Err(Error::InvalidArgument {
                name: "temperature",
                reason: format!("{celsius} is not a finite number"),
            });
        }
        let body = json!({ "value": to_centi(celsius), "scale": "CELSIUS" });
        self.send(&ApiRequest::put(TEMPERATURE_PATH, body)).await?;
        Ok(celsius)
    }

    /// Activate one of the preset temperature states.
    pub async fn set_temperature_state(&self, state: TemperatureState) -> Result<(), Error> {
        let body = json!({ "temperatureState": state.code() });
        self.send(&ApiRequest::put(TEMPERATURE_STATES_PATH, body))
            .await?;
        Ok(())
    }

    /// Enable or disable the weekly temperature program.
    pub async fn set_program(&self, enabled: bool) -> Result<(), Error> {
        let body = json!({ "state": i32::from(enabled) });
        self.send(&ApiRequest::put(PROGRAM_PATH, body)).await?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, Error> {
    <T as serde::Deserialize>::deserialize(&value).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body: value.to_string(),
    })
}
