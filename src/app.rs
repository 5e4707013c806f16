//! Process-level wiring shared by the binaries
//!
//! Loads and validates the configuration, sets up logging, runs exactly one
//! pass and journals it. Periodic execution belongs to an external scheduler.

use crate::controller::{Controller, PassReport, PassStatus};
use crate::core::{Config, Error, LoggingConfig, Result, Thresholds};
use crate::evcc::{ChargeApi, EvccClient};
use crate::journal::Journal;
use anyhow::Context;
use chrono::{DateTime, Utc};

/// Run one pass and return the process exit code
pub fn run(dry_run: bool) -> u8 {
    let loaded = Config::load();

    let level = loaded
        .as_ref()
        .map(|config| config.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    log::debug!("evcc charge controller v{}", env!("CARGO_PKG_VERSION"));

    let config = match loaded {
        Ok(config) => config,
        Err(e) => return run_with::<EvccClient>(&LoggingConfig::default(), Err(e), Utc::now(), dry_run),
    };

    let setup = config.validate().and_then(|thresholds| {
        let client = EvccClient::new(&config.evcc)?;
        Ok((client, thresholds))
    });

    run_with(&config.logging, setup, Utc::now(), dry_run)
}

/// Run one pass against `api`, or journal the error that prevented it.
///
/// Returns the exit code; a journal that cannot be written makes it at
/// least 1.
pub(crate) fn run_with<A: ChargeApi>(
    logging: &LoggingConfig,
    setup: Result<(A, Thresholds)>,
    now: DateTime<Utc>,
    dry_run: bool,
) -> u8 {
    let (api, thresholds) = match setup {
        Ok(setup) => setup,
        Err(e) => {
            log::error!("{}", e);
            record(logging, &PassReport::failed(now, &e));
            return PassStatus::Failed.exit_code();
        }
    };

    let report = Controller::new(&api, thresholds)
        .dry_run(dry_run)
        .run_pass(now);

    match report.status() {
        PassStatus::Completed => log::info!("{}", report.summary()),
        PassStatus::Degraded => log::warn!("{} (degraded: {:?})", report.summary(), report.degraded),
        PassStatus::Failed => log::error!("{}", report.summary()),
    }

    let code = report.status().exit_code();
    if record(logging, &report) {
        code
    } else {
        code.max(PassStatus::Failed.exit_code())
    }
}

/// Append to the journal; returns false if that failed
fn record(logging: &LoggingConfig, report: &PassReport) -> bool {
    match append(logging, report) {
        Ok(()) => true,
        Err(e) => {
            log::error!("Failed to write decision journal: {:#}", e);
            false
        }
    }
}

fn append(logging: &LoggingConfig, report: &PassReport) -> anyhow::Result<()> {
    let path = logging.journal_path()?;
    let journal = Journal::open(&path)
        .with_context(|| format!("opening journal {}", path.display()))?;
    journal
        .append(report)
        .with_context(|| format!("appending to {}", journal.path().display()))?;
    Ok(())
}
