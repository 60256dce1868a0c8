use chrono::{DateTime, Local, TimeDelta};
use std::time::Duration;

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Cooperative periodic timer. It never runs on its own: the event loop asks
/// how long to wait and then polls it on the same thread that owns the
/// session, so ticks cannot race with commands.
#[derive(Debug, Clone)]
pub struct Ticker {
    interval: Duration,
    next_due: Option<DateTime<Local>>,
    fired: u64,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_due: None,
            fired: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_active(&self) -> bool {
        self.next_due.is_some()
    }

    /// Arms the ticker. Does nothing if it is already active.
    pub fn start(&mut self, now: DateTime<Local>) -> bool {
        if self.is_active() {
            return false;
        }
        self.next_due = Some(now + self.step());
        true
    }

    /// Disarms the ticker; a tick that was due but not yet polled is dropped.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Returns true when a tick is due at `now` and re-arms one interval
    /// later. Several missed intervals collapse into a single tick.
    pub fn poll(&mut self, now: DateTime<Local>) -> bool {
        match self.next_due {
            Some(due) if now >= due => {
                self.next_due = Some(now + self.step());
                self.fired += 1;
                true
            }
            _ => false,
        }
    }

    /// Time left until the next tick, `None` when inactive
    pub fn time_until_due(&self, now: DateTime<Local>) -> Option<Duration> {
        let due = self.next_due?;
        Some((due - now).to_std().unwrap_or(Duration::ZERO))
    }

    pub fn fired(&self) -> u64 {
        self.fired
    }

    fn step(&self) -> TimeDelta {
        TimeDelta::from_std(self.interval).unwrap_or(TimeDelta::seconds(1))
    }
}

impl Default for Ticker {
    fn default() -> Self {
        Self::new(TICK_INTERVAL)
    }
}
