//! evcc charge controller library
//!
//! This module exposes the control pass and its building blocks for use
//! by the binaries and in tests.

pub mod app;
pub mod controller;
pub mod core;
pub mod engine;
pub mod evcc;
pub mod forecast;
pub mod journal;
pub mod pricing;
