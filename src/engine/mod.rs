//! Grid charging decision table
//!
//! Pure functions only: the same inputs always give the same decision, and
//! nothing is remembered between passes. Rows, first match wins:
//!
//! | rule              | condition                                                        | decision            |
//! |-------------------|------------------------------------------------------------------|---------------------|
//! | `StateMissing`    | battery state unreadable                                         | NoAction(missing)   |
//! | `BatteryCharged`  | limit active and SoC > high                                      | DisableCharging     |
//! | `InputsMissing`   | tariff unreadable, or forecast enabled but unreadable            | NoAction(missing)   |
//! | `CheapGridWindow` | no limit, SoC < low, solar < min, spread > min spread            | EnableCharging(min) |
//! | `Fallthrough`     | anything else                                                    | NoAction(not met)   |
//!
//! The enable price is the window minimum rounded up to [`LIMIT_PRICE_STEP`],
//! and never below one step: evcc reads a limit of zero or less as "no limit".

pub mod guard;

pub use guard::{apply, Actuation};

use crate::core::{BatteryState, Decision, NoActionReason, Rule, Thresholds};
use crate::forecast::ForecastWindow;
use crate::pricing::TariffWindow;
use serde::Serialize;

/// Resolution of the charge limit sent to evcc
pub const LIMIT_PRICE_STEP: f64 = 0.0001;

const LIMIT_STEPS_PER_UNIT: f64 = 10_000.0;

/// A decision together with the rule that produced it
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub rule: Rule,
}

impl Evaluation {
    fn new(decision: Decision, rule: Rule) -> Self {
        Self { decision, rule }
    }
}

/// Run the decision table
pub fn decide(
    state: Option<&BatteryState>,
    tariff: Option<&TariffWindow>,
    forecast: &ForecastWindow,
    thresholds: &Thresholds,
) -> Decision {
    evaluate(state, tariff, forecast, thresholds).decision
}

/// Run the decision table and report which row fired
pub fn evaluate(
    state: Option<&BatteryState>,
    tariff: Option<&TariffWindow>,
    forecast: &ForecastWindow,
    thresholds: &Thresholds,
) -> Evaluation {
    let Some(state) = state else {
        return Evaluation::new(Decision::no_action(NoActionReason::MissingData), Rule::StateMissing);
    };

    // Needs nothing but the battery, so a tariff outage cannot block it
    if state.has_limit() && state.soc > thresholds.high_soc {
        return Evaluation::new(Decision::DisableCharging, Rule::BatteryCharged);
    }

    let solar_is_weak = forecast.below(thresholds.min_solar_forecast);
    let (Some(tariff), Some(solar_is_weak)) = (tariff, solar_is_weak) else {
        return Evaluation::new(Decision::no_action(NoActionReason::MissingData), Rule::InputsMissing);
    };

    let price_ok = !thresholds.require_price_below_max || tariff.current_below_max();

    if !state.has_limit()
        && state.soc < thresholds.low_soc
        && solar_is_weak
        && tariff.spread > thresholds.min_price_spread
        && price_ok
    {
        return Evaluation::new(
            Decision::EnableCharging { at_price: limit_price(tariff.min) },
            Rule::CheapGridWindow,
        );
    }

    Evaluation::new(Decision::no_action(NoActionReason::ConditionsNotMet), Rule::Fallthrough)
}

/// Round `price` up to the next step, keeping it positive
fn limit_price(price: f64) -> f64 {
    // Tolerance keeps exact steps such as 0.08 from rounding up a step
    let steps = (price * LIMIT_STEPS_PER_UNIT - 1e-6).ceil();
    (steps / LIMIT_STEPS_PER_UNIT).max(LIMIT_PRICE_STEP)
}
