//! Blocking HTTP client for the evcc REST API

use super::wire;
use super::{ChargeApi, ClientError, ClientResult};
use crate::core::{BatteryState, EvccConfig, ForecastPoint, TariffPoint};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde_json::json;
use std::time::Duration;

/// evcc client. Requests are sequential and never retried; the next
/// scheduled run is the retry.
pub struct EvccClient {
    base_url: String,
    password: Option<String>,
    client: Client,
}

impl EvccClient {
    /// Create a client for the configured evcc instance
    pub fn new(config: &EvccConfig) -> ClientResult<Self> {
        Self::with_base_url(
            config.base_url(),
            config.password().map(str::to_string),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Create a client against an explicit API base URL (e.g. `http://host:7070/api`)
    pub fn with_base_url(
        base_url: impl Into<String>,
        password: Option<String>,
        timeout: Duration,
    ) -> ClientResult<Self> {
        let base_url = base_url.into();
        // evcc hands out a session cookie on login
        let client = Client::builder()
            .timeout(timeout)
            .cookie_store(true)
            .build()
            .map_err(|e| ClientError::Network {
                endpoint: base_url.clone(),
                message: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            password: password.filter(|p| !p.is_empty()),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and return the body of a successful response
    fn get_body(&self, path: &str) -> ClientResult<String> {
        log::debug!("GET {}", path);
        let response = self
            .client
            .get(self.url(path))
            .send()
            .map_err(|e| transport_error(path, e))?;
        let response = check_status(path, response)?;
        response.text().map_err(|e| transport_error(path, e))
    }

    /// Like [`Self::get_body`], but a 404 means the source is not configured in evcc
    fn get_optional_source(&self, path: &str) -> ClientResult<String> {
        match self.get_body(path) {
            Err(ClientError::Http { status: 404, .. }) => Err(ClientError::Parse {
                endpoint: path.to_string(),
                message: "not configured in evcc".to_string(),
            }),
            other => other,
        }
    }
}

impl ChargeApi for EvccClient {
    fn authenticate(&self) -> ClientResult<()> {
        let Some(password) = &self.password else {
            return Ok(());
        };

        let path = "/auth/login";
        let response = self
            .client
            .post(self.url(path))
            .json(&json!({ "password": password }))
            .send()
            .map_err(|e| transport_error(path, e))?;
        check_status(path, response)?;

        log::info!("Authentication successful");
        Ok(())
    }

    fn get_state(&self) -> ClientResult<BatteryState> {
        let path = "/state";
        let state = wire::parse_state(path, &self.get_body(path)?)?;
        log::debug!("Battery SoC {}%, grid charge limit {:.4}", state.soc, state.current_limit);
        Ok(state)
    }

    fn get_tariff(&self) -> ClientResult<Vec<TariffPoint>> {
        let path = "/tariff/grid";
        let points = wire::parse_tariff(path, &self.get_optional_source(path)?)?;
        log::debug!("Received {} grid tariff slots", points.len());
        Ok(points)
    }

    fn get_solar_forecast(&self) -> ClientResult<Vec<ForecastPoint>> {
        let path = "/tariff/solar";
        let points = wire::parse_solar(path, &self.get_optional_source(path)?)?;
        log::debug!("Received {} solar forecast slots", points.len());
        Ok(points)
    }

    fn set_charging_limit(&self, price: f64) -> ClientResult<()> {
        let path = format!("/batterygridchargelimit/{}", price);
        let response = self
            .client
            .post(self.url(&path))
            .send()
            .map_err(|e| transport_error(&path, e))?;
        check_status(&path, response)?;
        Ok(())
    }

    fn clear_charging_limit(&self) -> ClientResult<()> {
        let path = "/batterygridchargelimit";
        let response = self
            .client
            .delete(self.url(path))
            .send()
            .map_err(|e| transport_error(path, e))?;
        check_status(path, response)?;
        Ok(())
    }
}

fn transport_error(endpoint: &str, err: reqwest::Error) -> ClientError {
    if err.is_timeout() {
        ClientError::Timeout(endpoint.to_string())
    } else if err.is_decode() {
        ClientError::Parse {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    } else {
        ClientError::Network {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        }
    }
}

fn check_status(endpoint: &str, response: Response) -> ClientResult<Response> {
    match response.status() {
        status if status.is_success() => Ok(response),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            log::error!("evcc rejected credentials on {}", endpoint);
            Err(ClientError::Auth(format!("{} returned {}", endpoint, response.status())))
        }
        status => Err(ClientError::Http {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
        }),
    }
}
