//! Tariff window reduction
//!
//! Reduces the dynamic grid tariff published by evcc to the figures the
//! decision table needs for the upcoming horizon:
//! - cheapest and most expensive slot price
//! - spread between the two
//! - price of the slot that is running right now

use crate::core::TariffPoint;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Price statistics over `[now, now + horizon)`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TariffWindow {
    pub min: f64,
    pub max: f64,
    /// max - min
    pub spread: f64,
    /// Price of the slot containing `now`, or of the first slot in range
    pub current: f64,
    /// Number of tariff slots considered
    pub slots: usize,
}

impl TariffWindow {
    /// Reduce `points` to a window starting at `now`.
    ///
    /// Returns `None` when no slot overlaps the horizon. An empty window is
    /// reported as missing rather than as a zero spread.
    pub fn reduce(points: &[TariffPoint], now: DateTime<Utc>, horizon_hours: f64) -> Option<Self> {
        let window_end = now.checked_add_signed(hours(horizon_hours)?)?;

        let mut in_range = points
            .iter()
            .filter(|p| overlaps(p.start, p.end, now, window_end))
            .filter(|p| p.price.is_finite())
            .peekable();

        let first = in_range.peek()?.price;
        let mut window = Self {
            min: first,
            max: first,
            spread: 0.0,
            current: first,
            slots: 0,
        };

        let mut running = None;
        for point in in_range {
            window.min = window.min.min(point.price);
            window.max = window.max.max(point.price);
            window.slots += 1;
            if running.is_none() && point.start <= now && now < point.end {
                running = Some(point.price);
            }
        }

        window.spread = window.max - window.min;
        if let Some(price) = running {
            window.current = price;
        }

        Some(window)
    }

    /// Whether the running slot is cheaper than the window maximum
    pub fn current_below_max(&self) -> bool {
        self.current < self.max
    }
}

/// Half-open interval overlap test
pub(crate) fn overlaps(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
) -> bool {
    start < window_end && end > window_start
}

/// Convert a positive fractional hour count to a duration
pub(crate) fn hours(value: f64) -> Option<Duration> {
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Duration::try_seconds((value * 3600.0).round() as i64)
}
