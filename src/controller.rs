//! One control pass: fetch, reduce, decide, guard, act
//!
//! The controller owns no state between runs. Everything it needs is read
//! from evcc at the start of the pass and the whole pass is summarised in a
//! [`PassReport`], which is also the journal line.

use crate::core::{BatteryState, Error, Rule, Thresholds};
use crate::engine::{self, Actuation, Evaluation};
use crate::evcc::{ChargeApi, ClientError};
use crate::forecast::ForecastWindow;
use crate::pricing::TariffWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Independently fetched data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    State,
    Tariff,
    Forecast,
}

/// Raw values the decision was based on
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassInputs {
    pub state: Option<BatteryState>,
    pub tariff: Option<TariffWindow>,
    pub forecast: ForecastWindow,
    pub thresholds: Thresholds,
}

/// Serializable error summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassError {
    pub kind: String,
    pub message: String,
}

impl From<&Error> for PassError {
    fn from(err: &Error) -> Self {
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

/// How a pass ended, for the process exit code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    /// All sources read, decision carried out
    Completed,
    /// Decision carried out, but some source was unreadable
    Degraded,
    /// Pass aborted
    Failed,
}

impl PassStatus {
    pub fn exit_code(&self) -> u8 {
        match self {
            PassStatus::Completed => 0,
            PassStatus::Failed => 1,
            PassStatus::Degraded => 2,
        }
    }
}

/// Everything that happened in one pass
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassReport {
    pub timestamp: DateTime<Utc>,
    pub dry_run: bool,
    #[serde(flatten)]
    pub evaluation: Option<Evaluation>,
    pub actuation: Option<Actuation>,
    pub inputs: Option<PassInputs>,
    pub degraded: Vec<Source>,
    pub error: Option<PassError>,
}

impl PassReport {
    fn new(timestamp: DateTime<Utc>, dry_run: bool) -> Self {
        Self {
            timestamp,
            dry_run,
            evaluation: None,
            actuation: None,
            inputs: None,
            degraded: Vec::new(),
            error: None,
        }
    }

    /// Report for a run that failed before the pass could start
    pub fn failed(timestamp: DateTime<Utc>, err: &Error) -> Self {
        let mut report = Self::new(timestamp, false);
        report.error = Some(err.into());
        report
    }

    fn fail(mut self, err: Error) -> Self {
        log::error!("Pass aborted: {}", err);
        self.error = Some((&err).into());
        self
    }

    pub fn status(&self) -> PassStatus {
        if self.error.is_some() {
            PassStatus::Failed
        } else if !self.degraded.is_empty() {
            PassStatus::Degraded
        } else {
            PassStatus::Completed
        }
    }

    /// One-line human summary for the log
    pub fn summary(&self) -> String {
        match (&self.evaluation, &self.error) {
            (_, Some(err)) => format!("pass failed ({}): {}", err.kind, err.message),
            (Some(evaluation), None) => {
                let rule = serde_json::to_value(evaluation.rule)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_else(|| format!("{:?}", evaluation.rule));
                format!("{} via {}", evaluation.decision, rule)
            }
            (None, None) => "pass produced no decision".to_string(),
        }
    }
}

/// Runs single control passes against an energy-management API
pub struct Controller<'a, A: ChargeApi + ?Sized> {
    api: &'a A,
    thresholds: Thresholds,
    dry_run: bool,
}

impl<'a, A: ChargeApi + ?Sized> Controller<'a, A> {
    pub fn new(api: &'a A, thresholds: Thresholds) -> Self {
        Self {
            api,
            thresholds,
            dry_run: false,
        }
    }

    /// Evaluate without sending any write
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Execute one pass as of `now`
    pub fn run_pass(&self, now: DateTime<Utc>) -> PassReport {
        let mut report = PassReport::new(now, self.dry_run);

        if let Err(e) = self.api.authenticate() {
            return report.fail(e.into());
        }

        let state = match self.fetch(Source::State, self.api.get_state(), &mut report.degraded) {
            Ok(state) => state,
            Err(e) => return report.fail(e),
        };

        let tariff = match self.fetch(Source::Tariff, self.api.get_tariff(), &mut report.degraded) {
            Ok(points) => points.and_then(|points| {
                let window = TariffWindow::reduce(&points, now, self.thresholds.price_hours);
                if window.is_none() {
                    log::warn!(
                        "No grid tariff slots for the next {} hours",
                        self.thresholds.price_hours
                    );
                }
                window
            }),
            Err(e) => return report.fail(e),
        };

        let forecast = if self.thresholds.forecast_enabled() {
            match self.fetch(Source::Forecast, self.api.get_solar_forecast(), &mut report.degraded) {
                Ok(Some(points)) => ForecastWindow::reduce(&points, now, self.thresholds.forecast_hours),
                Ok(None) => ForecastWindow::Unavailable,
                Err(e) => return report.fail(e),
            }
        } else {
            log::debug!("Solar forecast check disabled");
            ForecastWindow::Disabled
        };

        let evaluation = engine::evaluate(state.as_ref(), tariff.as_ref(), &forecast, &self.thresholds);
        log_inputs(state.as_ref(), tariff.as_ref(), &forecast, &evaluation);

        report.evaluation = Some(evaluation);
        report.inputs = Some(PassInputs {
            state,
            tariff,
            forecast,
            thresholds: self.thresholds,
        });

        // Only the state gates actuation; every write re-checks it
        let actuation = match state {
            Some(state) => engine::apply(self.api, &evaluation.decision, &state, self.dry_run),
            None => Ok(Actuation::Idle),
        };

        match actuation {
            Ok(actuation) => {
                report.actuation = Some(actuation);
                report
            }
            Err(e) => report.fail(e),
        }
    }

    /// Split a fetch result into data, a degraded source, or a fatal error
    fn fetch<T>(
        &self,
        source: Source,
        result: Result<T, ClientError>,
        degraded: &mut Vec<Source>,
    ) -> Result<Option<T>, Error> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_source_local() => {
                log::warn!("{:?} unavailable this pass: {}", source, e);
                degraded.push(source);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn log_inputs(
    state: Option<&BatteryState>,
    tariff: Option<&TariffWindow>,
    forecast: &ForecastWindow,
    evaluation: &Evaluation,
) {
    if let Some(state) = state {
        log::debug!("SoC={}%, charge limit={:.4}", state.soc, state.current_limit);
    }
    if let Some(tariff) = tariff {
        log::debug!(
            "Tariff: current={:.4}, min={:.4}, max={:.4}, spread={:.4} over {} slots",
            tariff.current,
            tariff.min,
            tariff.max,
            tariff.spread,
            tariff.slots
        );
    }
    if let Some(kwh) = forecast.kwh() {
        log::debug!("Solar forecast: {:.1} kWh", kwh);
    }
    if evaluation.rule != Rule::Fallthrough {
        log::info!("Decision {} ({:?})", evaluation.decision, evaluation.rule);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Decision, ForecastPoint, NoActionReason, TariffPoint};
    use crate::evcc::testing::FakeApi;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 3, 0, 0).unwrap()
    }

    fn thresholds() -> Thresholds {
        Thresholds {
            low_soc: 30.0,
            high_soc: 85.0,
            min_solar_forecast: 10.0,
            forecast_hours: 24.0,
            min_price_spread: 0.10,
            price_hours: 12.0,
            require_price_below_max: false,
        }
    }

    fn tariff(prices: &[f64]) -> Vec<TariffPoint> {
        prices
            .iter()
            .enumerate()
            .map(|(i, price)| TariffPoint {
                start: now() + Duration::hours(i as i64),
                end: now() + Duration::hours(i as i64 + 1),
                price: *price,
            })
            .collect()
    }

    fn solar(kwh_per_hour: &[f64]) -> Vec<ForecastPoint> {
        kwh_per_hour
            .iter()
            .enumerate()
            .map(|(i, energy)| ForecastPoint {
                start: now() + Duration::hours(i as i64),
                end: now() + Duration::hours(i as i64 + 1),
                energy: *energy,
            })
            .collect()
    }

    fn parse_failure(endpoint: &str) -> ClientError {
        ClientError::Parse {
            endpoint: endpoint.to_string(),
            message: "bad json".to_string(),
        }
    }

    #[test]
    fn test_enables_charging_at_window_minimum() {
        let api = FakeApi::new(BatteryState::new(20.0, 0.0))
            .with_tariff(tariff(&[0.22, 0.08, 0.30, 0.25]))
            .with_solar(solar(&[1.0, 2.0, 2.0]));

        let report = Controller::new(&api, thresholds()).run_pass(now());

        let evaluation = report.evaluation.unwrap();
        assert_eq!(evaluation.decision, Decision::EnableCharging { at_price: 0.08 });
        assert_eq!(report.actuation, Some(Actuation::LimitSet { price: 0.08 }));
        assert_eq!(report.status(), PassStatus::Completed);
        assert_eq!(api.writes(), 1);
    }

    #[test]
    fn test_repeated_passes_write_once() {
        let api = FakeApi::new(BatteryState::new(20.0, 0.0))
            .with_tariff(tariff(&[0.22, 0.08, 0.30]))
            .with_solar(solar(&[0.5]));
        let controller = Controller::new(&api, thresholds());

        for _ in 0..3 {
            let report = controller.run_pass(now());
            assert_eq!(report.status(), PassStatus::Completed);
        }
        assert_eq!(api.writes(), 1);
    }

    #[test]
    fn test_negative_price_window_writes_once() {
        let mut config = thresholds();
        config.forecast_hours = 0.0;
        let api = FakeApi::new(BatteryState::new(20.0, 0.0)).with_tariff(tariff(&[-0.05, 0.30]));
        let controller = Controller::new(&api, config);

        let report = controller.run_pass(now());
        assert_eq!(
            report.actuation,
            Some(Actuation::LimitSet { price: engine::LIMIT_PRICE_STEP })
        );
        assert!(api.state().has_limit());

        for _ in 0..2 {
            let report = controller.run_pass(now());
            assert_eq!(report.actuation, Some(Actuation::Idle));
        }
        assert_eq!(api.writes(), 1);
    }

    #[test]
    fn test_disables_when_charged() {
        let api = FakeApi::new(BatteryState::new(90.0, 0.12)).with_tariff(tariff(&[0.2]));
        let controller = Controller::new(&api, thresholds());

        let report = controller.run_pass(now());
        assert_eq!(report.actuation, Some(Actuation::LimitCleared));

        // Limit is gone now, so the next pass has nothing to do
        let report = controller.run_pass(now());
        assert_eq!(
            report.evaluation.map(|e| e.decision),
            Some(Decision::no_action(NoActionReason::ConditionsNotMet))
        );
        assert_eq!(api.writes(), 1);
    }

    #[test]
    fn test_tariff_parse_error_is_missing_data() {
        let api = FakeApi::new(BatteryState::new(20.0, 0.0))
            .failing_tariff(parse_failure("/tariff/grid"))
            .with_solar(solar(&[0.0]));

        let report = Controller::new(&api, thresholds()).run_pass(now());

        assert_eq!(
            report.evaluation.map(|e| e.decision),
            Some(Decision::no_action(NoActionReason::MissingData))
        );
        assert_eq!(report.degraded, vec![Source::Tariff]);
        assert_eq!(report.status(), PassStatus::Degraded);
        assert_ne!(report.status().exit_code(), 0);
        assert_eq!(api.writes(), 0);
    }

    #[test]
    fn test_tariff_outage_does_not_block_disable() {
        let api = FakeApi::new(BatteryState::new(95.0, 0.2))
            .failing_tariff(ClientError::Http {
                endpoint: "/tariff/grid".to_string(),
                status: 502,
            })
            .failing_solar(parse_failure("/tariff/solar"));

        let report = Controller::new(&api, thresholds()).run_pass(now());

        assert_eq!(report.actuation, Some(Actuation::LimitCleared));
        assert_eq!(report.degraded, vec![Source::Tariff, Source::Forecast]);
        assert_eq!(report.status(), PassStatus::Degraded);
    }

    #[test]
    fn test_unreadable_state_never_acts() {
        let api = FakeApi::new(BatteryState::new(95.0, 0.2))
            .failing_state(parse_failure("/state"))
            .with_tariff(tariff(&[0.1, 0.5]));

        let report = Controller::new(&api, thresholds()).run_pass(now());

        let evaluation = report.evaluation.unwrap();
        assert_eq!(evaluation.rule, Rule::StateMissing);
        assert_eq!(report.actuation, Some(Actuation::Idle));
        assert_eq!(api.writes(), 0);
    }

    #[test]
    fn test_network_failure_aborts_pass() {
        let api = FakeApi::new(BatteryState::new(20.0, 0.0)).failing_state(ClientError::Network {
            endpoint: "/state".to_string(),
            message: "connection refused".to_string(),
        });

        let report = Controller::new(&api, thresholds()).run_pass(now());

        assert_eq!(report.status(), PassStatus::Failed);
        assert_eq!(report.error.as_ref().map(|e| e.kind.as_str()), Some("network"));
        assert!(report.evaluation.is_none());
        assert_eq!(api.writes(), 0);
    }

    #[test]
    fn test_timeout_aborts_pass() {
        let api = FakeApi::new(BatteryState::new(20.0, 0.0))
            .with_tariff(tariff(&[0.1, 0.5]))
            .failing_solar(ClientError::Timeout("/tariff/solar".to_string()));

        let report = Controller::new(&api, thresholds()).run_pass(now());
        assert_eq!(report.error.map(|e| e.kind), Some("timeout".to_string()));
        assert_eq!(api.writes(), 0);
    }

    #[test]
    fn test_auth_failure_aborts_before_reads() {
        let api = FakeApi::new(BatteryState::new(20.0, 0.0))
            .failing_auth(ClientError::Auth("401".to_string()));

        let report = Controller::new(&api, thresholds()).run_pass(now());

        assert_eq!(report.status(), PassStatus::Failed);
        assert_eq!(report.error.map(|e| e.kind), Some("auth".to_string()));
        assert_eq!(api.solar_reads(), 0);
    }

    #[test]
    fn test_failed_write_fails_pass() {
        let api = FakeApi::new(BatteryState::new(95.0, 0.2))
            .with_tariff(tariff(&[0.2]))
            .failing_writes();

        let report = Controller::new(&api, thresholds()).run_pass(now());

        assert_eq!(report.status(), PassStatus::Failed);
        assert_eq!(report.error.as_ref().map(|e| e.kind.as_str()), Some("actuation"));
        assert_eq!(report.evaluation.map(|e| e.decision), Some(Decision::DisableCharging));
        assert!(api.state().has_limit());
    }

    #[test]
    fn test_forecast_disabled_skips_fetch() {
        let mut config = thresholds();
        config.forecast_hours = 0.0;
        let api = FakeApi::new(BatteryState::new(20.0, 0.0))
            .with_tariff(tariff(&[0.3, 0.1]))
            .with_solar(solar(&[40.0]));

        let report = Controller::new(&api, config).run_pass(now());

        assert_eq!(api.solar_reads(), 0);
        assert_eq!(report.actuation, Some(Actuation::LimitSet { price: 0.1 }));
        assert_eq!(report.inputs.map(|i| i.forecast), Some(ForecastWindow::Disabled));
    }

    #[test]
    fn test_strong_solar_blocks_enable() {
        let api = FakeApi::new(BatteryState::new(20.0, 0.0))
            .with_tariff(tariff(&[0.3, 0.1]))
            .with_solar(solar(&[4.0, 4.0, 4.0]));

        let report = Controller::new(&api, thresholds()).run_pass(now());
        assert_eq!(report.actuation, Some(Actuation::Idle));
        assert_eq!(api.writes(), 0);
    }

    #[test]
    fn test_dry_run_never_writes() {
        let api = FakeApi::new(BatteryState::new(20.0, 0.0))
            .with_tariff(tariff(&[0.3, 0.1]))
            .with_solar(solar(&[0.0]));

        let report = Controller::new(&api, thresholds()).dry_run(true).run_pass(now());

        assert!(report.dry_run);
        assert_eq!(report.actuation, Some(Actuation::DryRun));
        assert_eq!(api.writes(), 0);
    }

    #[test]
    fn test_report_serializes_to_one_line() {
        let api = FakeApi::new(BatteryState::new(20.0, 0.0))
            .with_tariff(tariff(&[0.3, 0.1]))
            .with_solar(solar(&[0.0]));

        let report = Controller::new(&api, thresholds()).run_pass(now());
        let line = serde_json::to_string(&report).unwrap();
        assert!(!line.contains('\n'));

        let json: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(json["decision"]["action"], "enable_charging");
        assert_eq!(json["rule"], "cheap_grid_window");
        assert_eq!(json["actuation"]["outcome"], "limit_set");
        assert_eq!(json["inputs"]["state"]["soc"], 20.0);
        assert_eq!(json["inputs"]["tariff"]["min"], 0.1);
        assert_eq!(report.summary(), "EnableCharging(0.1000) via cheap_grid_window");
    }
}
