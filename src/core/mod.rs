//! Core module - Configuration, errors, and common types

mod config;
mod error;
mod types;

pub use config::{Config, EvccConfig, LoggingConfig, ThresholdConfig, Thresholds, CONFIG_PATH_ENV};
pub use error::{Error, Result};
pub use types::{BatteryState, Decision, ForecastPoint, NoActionReason, Rule, TariffPoint};
