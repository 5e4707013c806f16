//! evcc charge controller - Dry run
//!
//! Performs the same pass as the main binary, reading everything from evcc
//! and journaling the decision, but never changes the grid charge limit.

use evcc_charge_controller_lib::app;
use std::process::ExitCode;

fn main() -> ExitCode {
    ExitCode::from(app::run(true))
}
