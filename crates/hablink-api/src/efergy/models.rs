// Efergy Engage wire models

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

fn de_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(d)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// `{"error": {"id": 400, "desc": "...", "more": "..."}}`
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApiError {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub more: String,
}

impl ApiError {
    /// The token was refused; only a new token helps.
    pub fn is_token_error(&self) -> bool {
        let desc = self.desc.to_ascii_lowercase();
        desc.contains("token") || self.id == Some(401)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub error: ApiError,
}

/// One sensor entry of `getCurrentValuesSummary`.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentValue {
    #[serde(default)]
    pub cid: String,
    /// List of `{ "<timestamp>": value }` maps, newest first.
    #[serde(default)]
    pub data: Vec<BTreeMap<String, Value>>,
    /// Seconds since the sensor last reported.
    #[serde(default)]
    pub age: i64,
}

impl CurrentValue {
    /// First reading of the entry, if numeric.
    pub fn latest(&self) -> Option<f64> {
        let first = self.data.first()?;
        first.values().next().and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}

/// Instant power as read from the `PWER` sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InstantReading {
    pub value: f64,
    pub age_secs: i64,
}

/// Response of `getEnergy`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EnergyResponse {
    #[serde(default, deserialize_with = "de_number")]
    pub sum: Option<f64>,
    #[serde(default)]
    pub units: Option<String>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// Consumption over one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyReading {
    pub sum: f64,
    pub units: String,
}

/// `month_tariff` of `getForecast`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Forecast {
    #[serde(default, deserialize_with = "de_number")]
    pub estimate: Option<f64>,
    #[serde(default, alias = "previousSum", deserialize_with = "de_number")]
    pub previous_sum: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ForecastResponse {
    #[serde(default)]
    pub month_tariff: Option<Forecast>,
    #[serde(default)]
    pub error: Option<ApiError>,
}

/// Reporting periods accepted by `getEnergy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum EnergyPeriod {
    Day,
    Week,
    Month,
    Year,
}
