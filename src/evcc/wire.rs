//! Typed evcc response documents
//!
//! evcc answers either with the bare document or wrapped in
//! `{"result": ...}` depending on version; both are accepted.

use super::{ClientError, ClientResult};
use crate::core::{BatteryState, ForecastPoint, TariffPoint};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StateDoc {
    #[serde(default)]
    battery_soc: Option<f64>,
    #[serde(default)]
    battery_grid_charge_limit: Option<f64>,
    /// Older layouts nest the SoC under `site` or `battery`
    #[serde(default)]
    site: Option<Value>,
    #[serde(default)]
    battery: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RatesDoc {
    rates: Vec<RateDoc>,
}

#[derive(Debug, Deserialize)]
struct RateDoc {
    start: DateTime<Utc>,
    #[serde(default)]
    end: Option<DateTime<Utc>>,
    value: f64,
}

impl RateDoc {
    /// Slots without an end are hourly
    fn end(&self) -> DateTime<Utc> {
        self.end.unwrap_or(self.start + Duration::hours(1))
    }
}

fn parse_error(endpoint: &str, message: impl Into<String>) -> ClientError {
    ClientError::Parse {
        endpoint: endpoint.to_string(),
        message: message.into(),
    }
}

/// Decode `body`, unwrapping an optional `result` envelope
fn decode<T: DeserializeOwned>(endpoint: &str, body: &str) -> ClientResult<T> {
    let mut value: Value =
        serde_json::from_str(body).map_err(|e| parse_error(endpoint, e.to_string()))?;

    if let Some(inner) = value.get_mut("result").map(Value::take) {
        value = inner;
    }

    serde_json::from_value(value).map_err(|e| parse_error(endpoint, e.to_string()))
}

pub(super) fn parse_state(endpoint: &str, body: &str) -> ClientResult<BatteryState> {
    let doc: StateDoc = decode(endpoint, body)?;

    let nested = |parent: &Option<Value>, key: &str| parent.as_ref().and_then(|v| v.get(key)).and_then(Value::as_f64);

    let soc = doc
        .battery_soc
        .or_else(|| nested(&doc.site, "batterySoc"))
        .or_else(|| nested(&doc.battery, "soc"))
        .ok_or_else(|| parse_error(endpoint, "no battery SoC in state"))?;

    if !(0.0..=100.0).contains(&soc) {
        return Err(parse_error(endpoint, format!("battery SoC {} outside 0-100", soc)));
    }

    // null or absent both mean no limit
    let current_limit = doc.battery_grid_charge_limit.unwrap_or(0.0);
    if !current_limit.is_finite() {
        return Err(parse_error(endpoint, "grid charge limit is not a number"));
    }

    Ok(BatteryState::new(soc, current_limit))
}

fn parse_rates(endpoint: &str, body: &str) -> ClientResult<Vec<RateDoc>> {
    let doc: RatesDoc = decode(endpoint, body)?;
    for rate in &doc.rates {
        if rate.end() <= rate.start {
            return Err(parse_error(endpoint, format!("slot starting {} ends before it starts", rate.start)));
        }
        if !rate.value.is_finite() {
            return Err(parse_error(endpoint, format!("slot starting {} has no usable value", rate.start)));
        }
    }
    Ok(doc.rates)
}

pub(super) fn parse_tariff(endpoint: &str, body: &str) -> ClientResult<Vec<TariffPoint>> {
    Ok(parse_rates(endpoint, body)?
        .into_iter()
        .map(|rate| TariffPoint {
            start: rate.start,
            end: rate.end(),
            price: rate.value,
        })
        .collect())
}

/// Solar rates are average power in W per slot; convert to kWh
pub(super) fn parse_solar(endpoint: &str, body: &str) -> ClientResult<Vec<ForecastPoint>> {
    Ok(parse_rates(endpoint, body)?
        .into_iter()
        .map(|rate| {
            let end = rate.end();
            let slot_hours = (end - rate.start).num_seconds() as f64 / 3600.0;
            ForecastPoint {
                start: rate.start,
                end,
                energy: rate.value / 1000.0 * slot_hours,
            }
        })
        .collect())
}
