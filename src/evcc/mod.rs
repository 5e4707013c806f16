//! evcc energy-management API access
//!
//! Provides the [`ChargeApi`] abstraction used by the controller and the
//! blocking HTTP implementation that talks to an evcc instance:
//! - battery state and grid charge limit (`/state`)
//! - grid tariff and solar forecast (`/tariff/grid`, `/tariff/solar`)
//! - setting and clearing the limit (`/batterygridchargelimit`)

mod client;
mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use client::EvccClient;

use crate::core::{BatteryState, Error, ForecastPoint, TariffPoint};

/// Failure of a single evcc request
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ClientError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("network error on {endpoint}: {message}")]
    Network { endpoint: String, message: String },

    #[error("timeout on {0}")]
    Timeout(String),

    #[error("{endpoint} returned HTTP {status}")]
    Http { endpoint: String, status: u16 },

    #[error("unusable response from {endpoint}: {message}")]
    Parse { endpoint: String, message: String },
}

impl ClientError {
    /// Whether only this data source is lost, not the whole pass.
    ///
    /// evcc answered, so the connection and credentials are fine; the
    /// endpoint just had nothing usable.
    pub fn is_source_local(&self) -> bool {
        matches!(self, ClientError::Parse { .. } | ClientError::Http { .. })
    }
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Auth(msg) => Error::Auth(msg),
            ClientError::Timeout(endpoint) => Error::Timeout(endpoint),
            e @ ClientError::Network { .. } => Error::Network(e.to_string()),
            // evcc answered; same class as an unreadable body
            e @ (ClientError::Http { .. } | ClientError::Parse { .. }) => Error::Parse(e.to_string()),
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Operations the controller needs from the energy-management system
pub trait ChargeApi {
    /// Log in; a no-op when no password is configured
    fn authenticate(&self) -> ClientResult<()>;

    /// Current battery SoC and grid charge limit
    fn get_state(&self) -> ClientResult<BatteryState>;

    /// Published grid tariff slots, in order
    fn get_tariff(&self) -> ClientResult<Vec<TariffPoint>>;

    /// Solar generation forecast slots, in order
    fn get_solar_forecast(&self) -> ClientResult<Vec<ForecastPoint>>;

    /// Allow grid charging while the price is at or below `price`
    fn set_charging_limit(&self, price: f64) -> ClientResult<()>;

    /// Remove the grid charging limit
    fn clear_charging_limit(&self) -> ClientResult<()>;
}
