//! Solar forecast window reduction

use crate::core::ForecastPoint;
use crate::pricing::{hours, overlaps};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Expected solar generation over the configured horizon
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ForecastWindow {
    /// Forecast check switched off (`solar_forecast_hours = 0`)
    Disabled,
    /// Forecast could not be read this pass
    Unavailable,
    /// Sum of expected generation in kWh
    Sum { kwh: f64 },
}

impl ForecastWindow {
    /// Sum the energy of every slot overlapping `[now, now + horizon_hours)`.
    ///
    /// A zero horizon disables the check instead of producing a zero sum.
    pub fn reduce(points: &[ForecastPoint], now: DateTime<Utc>, horizon_hours: f64) -> Self {
        let Some(span) = hours(horizon_hours) else {
            return ForecastWindow::Disabled;
        };
        let Some(window_end) = now.checked_add_signed(span) else {
            return ForecastWindow::Unavailable;
        };

        let kwh = points
            .iter()
            .filter(|p| overlaps(p.start, p.end, now, window_end))
            .map(|p| p.energy)
            .filter(|e| e.is_finite())
            .sum();

        ForecastWindow::Sum { kwh }
    }

    /// Whether the outlook is weak enough to justify grid charging.
    ///
    /// `None` means the answer is unknown.
    pub fn below(&self, min_kwh: f64) -> Option<bool> {
        match self {
            ForecastWindow::Disabled => Some(true),
            ForecastWindow::Unavailable => None,
            ForecastWindow::Sum { kwh } => Some(*kwh < min_kwh),
        }
    }

    pub fn kwh(&self) -> Option<f64> {
        match self {
            ForecastWindow::Sum { kwh } => Some(*kwh),
            _ => None,
        }
    }
}
