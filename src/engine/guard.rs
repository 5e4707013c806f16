//! Actuation guard
//!
//! Turns a decision into at most one write against evcc. The freshly read
//! battery state is the only record of what earlier passes did, so a
//! decision that matches it is dropped instead of written again.

use crate::core::{BatteryState, Decision, Error, Result};
use crate::evcc::ChargeApi;
use serde::Serialize;

/// What the guard did with a decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Actuation {
    /// Decision was NoAction
    Idle,
    /// Remote state already matches the decision
    AlreadyApplied,
    /// Write skipped because this is a dry run
    DryRun,
    /// Limit set to `price`
    LimitSet { price: f64 },
    /// Limit removed
    LimitCleared,
}

impl Actuation {
    /// Whether a state-changing request was sent
    pub fn wrote(&self) -> bool {
        matches!(self, Actuation::LimitSet { .. } | Actuation::LimitCleared)
    }
}

/// Whether carrying out `decision` would leave the remote state unchanged
pub fn is_noop(decision: &Decision, state: &BatteryState) -> bool {
    match decision {
        Decision::EnableCharging { at_price } => state.has_limit() && state.current_limit >= *at_price,
        Decision::DisableCharging => !state.has_limit(),
        Decision::NoAction { .. } => true,
    }
}

/// Carry out `decision` against `api`, issuing at most one write
pub fn apply<A: ChargeApi + ?Sized>(
    api: &A,
    decision: &Decision,
    state: &BatteryState,
    dry_run: bool,
) -> Result<Actuation> {
    if !decision.is_actionable() {
        return Ok(Actuation::Idle);
    }

    if is_noop(decision, state) {
        log::debug!(
            "{} matches current limit {:.4}, nothing to write",
            decision,
            state.current_limit
        );
        return Ok(Actuation::AlreadyApplied);
    }

    if dry_run {
        log::info!("Dry run: would apply {}", decision);
        return Ok(Actuation::DryRun);
    }

    match *decision {
        Decision::EnableCharging { at_price } => {
            api.set_charging_limit(at_price)
                .map_err(|e| Error::Actuation(e.to_string()))?;
            log::info!("Set battery grid charge limit to {:.4}", at_price);
            Ok(Actuation::LimitSet { price: at_price })
        }
        Decision::DisableCharging => {
            api.clear_charging_limit()
                .map_err(|e| Error::Actuation(e.to_string()))?;
            log::info!("Removed battery grid charge limit");
            Ok(Actuation::LimitCleared)
        }
        Decision::NoAction { .. } => Ok(Actuation::Idle),
    }
}
