// Efergy Engage cloud client
//
// Token-authenticated GET endpoints under `/mobile_proxy/`. Failures come
// back as HTTP 200 with an `{"error": {...}}` object, so every response is
// checked for that envelope before decoding.

pub mod models;

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

pub use models::{CurrentValue, EnergyPeriod, EnergyReading, Forecast, InstantReading};
use models::{ApiError, EnergyResponse, ErrorEnvelope, ForecastResponse};

/// Production cloud root.
pub const DEFAULT_BASE_URL: &str = "https://engage.efergy.com/";

/// Sensor id carrying instant power.
pub const POWER_SENSOR: &str = "PWER";

/// HTTP client for one Efergy Engage account.
pub struct EfergyClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
    /// Minutes east of UTC, as the web app sends it.
    utc_offset: i32,
    timeout: Duration,
}

impl EfergyClient {
    pub fn new(
        base_url: Url,
        token: SecretString,
        utc_offset: i32,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
            token,
            utc_offset,
            timeout: transport.timeout,
        })
    }

    /// Whether a non-blank token is configured.
    pub fn has_token(&self) -> bool {
        !self.token.expose_secret().trim().is_empty()
    }

    /// `{base}mobile_proxy/{endpoint}?token=...&{params}`
    fn url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url, Error> {
        let mut url = self.base_url.join(&format!("mobile_proxy/{endpoint}"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("token", self.token.expose_secret());
            for (key, value) in params {
                query.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn get_body(&self, url: Url) -> Result<String, Error> {
        debug!(endpoint = %url.path(), "GET");

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Authentication {
                message: "token rejected".into(),
            });
        }

        let body = resp
            .text()
            .await
            .map_err(|e| Error::from_send(e, self.timeout))?;
        trace!(body = %body, "efergy response");

        if !status.is_success() {
            return Err(Error::UnexpectedStatus {
                status: status.as_u16(),
                body,
            });
        }

        if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(&body) {
            return Err(api_error(&envelope.error));
        }

        Ok(body)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let body = self.get_body(url).await?;
        serde_json::from_str(&body).map_err(|e| Error::decode(&e, &body))
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// All sensors of the hub with their latest samples.
    pub async fn current_values(&self) -> Result<Vec<CurrentValue>, Error> {
        let url = self.url("getCurrentValuesSummary", &[])?;
        self.get_json(url).await
    }

    /// Instant power from the `PWER` sensor.
    ///
    /// Returns a `Deserialization` error when the hub reports no power sensor.
    pub async fn instant(&self) -> Result<InstantReading, Error> {
        let values = self.current_values().await?;
        values
            .iter()
            .filter(|v| v.cid == POWER_SENSOR)
            .find_map(|v| {
                v.latest().map(|value| InstantReading {
                    value,
                    age_secs: v.age,
                })
            })
            .ok_or_else(|| Error::Deserialization {
                message: "no PWER reading in current values".into(),
                body: String::new(),
            })
    }

    /// Consumption over `period`.
    pub async fn energy(&self, period: EnergyPeriod) -> Result<EnergyReading, Error> {
        let offset = self.utc_offset.to_string();
        let period_name = period.to_string();
        let url = self.url(
            "getEnergy",
            &[("period", period_name.as_str()), ("offset", offset.as_str())],
        )?;
        let resp: EnergyResponse = self.get_json(url).await?;
        if let Some(err) = resp.error {
            return Err(api_error(&err));
        }
        Ok(EnergyReading {
            sum: resp.sum.unwrap_or(-1.0),
            units: resp.units.unwrap_or_default(),
        })
    }

    /// Monthly cost forecast.
    pub async fn forecast(&self) -> Result<Forecast, Error> {
        let offset = self.utc_offset.to_string();
        let url = self.url(
            "getForecast",
            &[
                ("dataType", "cost"),
                ("period", "month"),
                ("offset", offset.as_str()),
            ],
        )?;
        let resp: ForecastResponse = self.get_json(url).await?;
        if let Some(err) = resp.error {
            return Err(api_error(&err));
        }
        resp.month_tariff.ok_or_else(|| Error::Deserialization {
            message: "forecast without month_tariff".into(),
            body: String::new(),
        })
    }
}

fn api_error(err: &ApiError) -> Error {
    if err.is_token_error() {
        Error::Authentication {
            message: format!("{} - {}", err.desc, err.more),
        }
    } else {
        Error::Vendor {
            code: err.id.unwrap_or_default(),
            message: format!("{} - {}", err.desc, err.more),
        }
    }
}
