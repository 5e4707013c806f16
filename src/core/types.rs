//! Common types used across the controller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Battery readings taken from evcc at the start of a pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    /// State of charge in percent (0-100)
    pub soc: f64,
    /// Active grid charge price ceiling; <= 0 means no limit is set
    pub current_limit: f64,
}

impl BatteryState {
    pub fn new(soc: f64, current_limit: f64) -> Self {
        Self { soc, current_limit }
    }

    /// Whether grid charging is currently enabled by a price limit
    pub fn has_limit(&self) -> bool {
        self.current_limit > 0.0
    }
}

/// One slot of the grid tariff schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TariffPoint {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Price per kWh
    pub price: f64,
}

/// One slot of the solar generation forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Expected generation in kWh over the slot
    pub energy: f64,
}

/// Why a pass decided not to touch the charging limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoActionReason {
    MissingData,
    ConditionsNotMet,
}

impl fmt::Display for NoActionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NoActionReason::MissingData => write!(f, "missing-data"),
            NoActionReason::ConditionsNotMet => write!(f, "conditions-not-met"),
        }
    }
}

/// Outcome of the decision table for a single pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Decision {
    /// Allow grid charging up to `at_price`
    EnableCharging { at_price: f64 },
    /// Remove the grid charging limit
    DisableCharging,
    NoAction { reason: NoActionReason },
}

impl Decision {
    pub fn no_action(reason: NoActionReason) -> Self {
        Decision::NoAction { reason }
    }

    /// Whether carrying out this decision can change remote state
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Decision::NoAction { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::EnableCharging { at_price } => write!(f, "EnableCharging({:.4})", at_price),
            Decision::DisableCharging => write!(f, "DisableCharging"),
            Decision::NoAction { reason } => write!(f, "NoAction({})", reason),
        }
    }
}

/// The row of the decision table that produced a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    /// Battery state could not be read
    StateMissing,
    /// Battery above the high threshold while a limit is active
    BatteryCharged,
    /// Tariff or enabled forecast could not be read
    InputsMissing,
    /// Low battery, weak solar outlook and a wide enough price spread
    CheapGridWindow,
    /// Nothing matched
    Fallthrough,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_limit() {
        assert!(BatteryState::new(50.0, 0.25).has_limit());
        assert!(!BatteryState::new(50.0, 0.0).has_limit());
        assert!(!BatteryState::new(50.0, -1.0).has_limit());
    }

    #[test]
    fn test_decision_serialization() {
        let json = serde_json::to_value(Decision::no_action(NoActionReason::MissingData)).unwrap();
        assert_eq!(json["action"], "no_action");
        assert_eq!(json["reason"], "missing-data");

        let json = serde_json::to_value(Decision::EnableCharging { at_price: 0.12 }).unwrap();
        assert_eq!(json["action"], "enable_charging");
        assert_eq!(json["at_price"], 0.12);
    }

    #[test]
    fn test_decision_display() {
        assert_eq!(Decision::DisableCharging.to_string(), "DisableCharging");
        assert_eq!(
            Decision::no_action(NoActionReason::ConditionsNotMet).to_string(),
            "NoAction(conditions-not-met)"
        );
        assert_eq!(
            Decision::EnableCharging { at_price: 0.1 }.to_string(),
            "EnableCharging(0.1000)"
        );
    }
}
