use chrono::{DateTime, Local, TimeDelta};

use crate::session::SessionState;
use crate::util::{format_hms, format_one_decimal, per_minute, percent};

/// Values derived from a session at a point in time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub success: u64,
    pub fail: u64,
    pub total: u64,
    pub success_rate: f64,
    pub elapsed: TimeDelta,
    pub items_per_minute: f64,
}

impl Metrics {
    /// Computes metrics for `state`, measuring a running session up to `now`
    pub fn compute(state: &SessionState, now: DateTime<Local>) -> Self {
        let end = state.ended_at.unwrap_or(now);
        Self::from_parts(state.success, state.fail, state.started_at, end)
    }

    /// Shared by the live path and record recomputation so both round the
    /// same way.
    pub fn from_parts(
        success: u64,
        fail: u64,
        started_at: Option<DateTime<Local>>,
        end: DateTime<Local>,
    ) -> Self {
        let total = success + fail;
        let elapsed = match started_at {
            Some(start) if end > start => end - start,
            _ => TimeDelta::zero(),
        };

        Self {
            success,
            fail,
            total,
            success_rate: percent(success, total),
            elapsed,
            items_per_minute: per_minute(total, elapsed_secs(elapsed)),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        elapsed_secs(self.elapsed)
    }

    pub fn success_rate_text(&self) -> String {
        format_one_decimal(self.success_rate)
    }

    pub fn items_per_minute_text(&self) -> String {
        format_one_decimal(self.items_per_minute)
    }

    pub fn duration_text(&self) -> String {
        format_hms(self.elapsed_secs())
    }
}

fn elapsed_secs(elapsed: TimeDelta) -> f64 {
    elapsed.num_milliseconds() as f64 / 1000.0
}
