//! In-memory [`ChargeApi`] for controller and guard tests

use super::{ChargeApi, ClientError, ClientResult};
use crate::core::{BatteryState, ForecastPoint, TariffPoint};
use std::cell::Cell;

/// Fake evcc that applies writes to its own state and counts them
pub(crate) struct FakeApi {
    state: Cell<BatteryState>,
    tariff: Vec<TariffPoint>,
    solar: Vec<ForecastPoint>,
    auth_error: Option<ClientError>,
    state_error: Option<ClientError>,
    tariff_error: Option<ClientError>,
    solar_error: Option<ClientError>,
    fail_writes: bool,
    writes: Cell<usize>,
    solar_reads: Cell<usize>,
}

impl FakeApi {
    pub(crate) fn new(state: BatteryState) -> Self {
        Self {
            state: Cell::new(state),
            tariff: Vec::new(),
            solar: Vec::new(),
            auth_error: None,
            state_error: None,
            tariff_error: None,
            solar_error: None,
            fail_writes: false,
            writes: Cell::new(0),
            solar_reads: Cell::new(0),
        }
    }

    pub(crate) fn with_tariff(mut self, tariff: Vec<TariffPoint>) -> Self {
        self.tariff = tariff;
        self
    }

    pub(crate) fn with_solar(mut self, solar: Vec<ForecastPoint>) -> Self {
        self.solar = solar;
        self
    }

    pub(crate) fn failing_auth(mut self, err: ClientError) -> Self {
        self.auth_error = Some(err);
        self
    }

    pub(crate) fn failing_state(mut self, err: ClientError) -> Self {
        self.state_error = Some(err);
        self
    }

    pub(crate) fn failing_tariff(mut self, err: ClientError) -> Self {
        self.tariff_error = Some(err);
        self
    }

    pub(crate) fn failing_solar(mut self, err: ClientError) -> Self {
        self.solar_error = Some(err);
        self
    }

    pub(crate) fn failing_writes(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub(crate) fn state(&self) -> BatteryState {
        self.state.get()
    }

    pub(crate) fn writes(&self) -> usize {
        self.writes.get()
    }

    pub(crate) fn solar_reads(&self) -> usize {
        self.solar_reads.get()
    }

    fn write(&self, limit: f64) -> ClientResult<()> {
        if self.fail_writes {
            return Err(ClientError::Http {
                endpoint: "/batterygridchargelimit".to_string(),
                status: 500,
            });
        }
        self.writes.set(self.writes.get() + 1);
        let mut state = self.state.get();
        state.current_limit = limit;
        self.state.set(state);
        Ok(())
    }
}

fn fail_or<T>(err: &Option<ClientError>, ok: impl FnOnce() -> T) -> ClientResult<T> {
    match err {
        Some(e) => Err(e.clone()),
        None => Ok(ok()),
    }
}

impl ChargeApi for FakeApi {
    fn authenticate(&self) -> ClientResult<()> {
        fail_or(&self.auth_error, || ())
    }

    fn get_state(&self) -> ClientResult<BatteryState> {
        fail_or(&self.state_error, || self.state.get())
    }

    fn get_tariff(&self) -> ClientResult<Vec<TariffPoint>> {
        fail_or(&self.tariff_error, || self.tariff.clone())
    }

    fn get_solar_forecast(&self) -> ClientResult<Vec<ForecastPoint>> {
        self.solar_reads.set(self.solar_reads.get() + 1);
        fail_or(&self.solar_error, || self.solar.clone())
    }

    fn set_charging_limit(&self, price: f64) -> ClientResult<()> {
        self.write(price)
    }

    fn clear_charging_limit(&self) -> ClientResult<()> {
        self.write(0.0)
    }
}
