//! Health-drain timing for a game in play.
//!
//! The host owns the clock. It calls [`Game::tick`](super::Game::tick) no
//! earlier than [`HealthDrainTicker::next_tick_at`]; the ticker works out
//! how many drain periods have elapsed since the last drain.

use chrono::{DateTime, TimeDelta, Utc};

use crate::config::HealthDrain;

#[derive(Debug, Clone)]
pub struct HealthDrainTicker {
    drain: HealthDrain,
    interval: TimeDelta,
    started_at: DateTime<Utc>,
    last_drain_at: DateTime<Utc>,
    next_tick_at: DateTime<Utc>,
}

impl HealthDrainTicker {
    /// Start timing at `now`. The first tick is due immediately.
    pub fn start(now: DateTime<Utc>, drain: HealthDrain, interval: TimeDelta) -> Self {
        Self {
            drain,
            interval,
            started_at: now,
            last_drain_at: now,
            next_tick_at: now,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn next_tick_at(&self) -> DateTime<Utc> {
        self.next_tick_at
    }

    pub fn time_playing(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.started_at
    }

    /// Record a tick at `now` and return how many drains are due.
    ///
    /// Drains land on fixed period boundaries counted from the start, so a
    /// late tick catches up instead of shifting later drains.
    pub fn tick(&mut self, now: DateTime<Utc>) -> u32 {
        self.next_tick_at = now + self.interval;
        if !self.drain.is_enabled() {
            return 0;
        }

        let period = self.drain.period();
        let mut due = 0;
        while now >= self.last_drain_at + period {
            self.last_drain_at += period;
            due += 1;
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ticker(drain: HealthDrain) -> (HealthDrainTicker, DateTime<Utc>) {
        let start = Utc::now();
        (
            HealthDrainTicker::start(start, drain, TimeDelta::milliseconds(16)),
            start,
        )
    }

    #[test]
    fn test_drains_once_per_period() {
        let (mut ticker, start) = ticker(HealthDrain::default());

        assert_eq!(ticker.tick(start), 0);
        assert_eq!(ticker.tick(start + TimeDelta::milliseconds(2999)), 0);
        assert_eq!(ticker.tick(start + TimeDelta::seconds(3)), 1);
        assert_eq!(ticker.tick(start + TimeDelta::milliseconds(3500)), 0);
        assert_eq!(ticker.tick(start + TimeDelta::seconds(6)), 1);
    }

    #[test]
    fn test_late_tick_catches_up() {
        let (mut ticker, start) = ticker(HealthDrain::default());
        assert_eq!(ticker.tick(start + TimeDelta::seconds(10)), 3);
        // Next boundary is still 12s, not 13s.
        assert_eq!(ticker.tick(start + TimeDelta::seconds(12)), 1);
    }

    #[test]
    fn test_disabled_drain() {
        let drain = HealthDrain {
            amount: 0,
            period_secs: 3,
        };
        let (mut ticker, start) = ticker(drain);
        assert_eq!(ticker.tick(start + TimeDelta::seconds(30)), 0);
    }

    #[test]
    fn test_next_tick_at() {
        let (mut ticker, start) = ticker(HealthDrain::default());
        assert_eq!(ticker.next_tick_at(), start);
        ticker.tick(start + TimeDelta::seconds(1));
        assert_eq!(
            ticker.next_tick_at(),
            start + TimeDelta::seconds(1) + TimeDelta::milliseconds(16)
        );
        assert_eq!(
            ticker.time_playing(start + TimeDelta::seconds(5)),
            TimeDelta::seconds(5)
        );
    }
}
