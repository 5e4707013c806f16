//! evcc charge controller - Main entry point
//!
//! Runs a single control pass: reads battery state, grid tariff and solar
//! forecast from evcc and enables or disables grid charging of the home
//! battery. Meant to be started periodically (e.g. every five minutes from
//! cron).
//!
//! Exit codes: 0 pass completed, 1 fatal error, 2 pass completed with an
//! unreadable data source.

use evcc_charge_controller_lib::app;
use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(app::run(false))
}
