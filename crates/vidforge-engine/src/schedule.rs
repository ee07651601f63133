//! Declarative poll interval schedule.

use std::time::Duration;

/// Increasing poll intervals, independent of the I/O that uses them.
///
/// Early polls are frequent so short renders feel responsive; later polls
/// back off to the steady interval to stay friendly with provider rate
/// limits. The last entry repeats forever.
#[derive(Debug, Clone)]
pub struct PollSchedule {
    intervals: Vec<Duration>,
}

impl Default for PollSchedule {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(6),
            Duration::from_secs(10),
            Duration::from_secs(15),
        ])
    }
}

impl PollSchedule {
    /// Build a schedule from explicit intervals. An empty list falls back
    /// to a flat 8-second cadence.
    pub fn new(intervals: Vec<Duration>) -> Self {
        let intervals = if intervals.is_empty() {
            vec![Duration::from_secs(8)]
        } else {
            intervals
        };
        Self { intervals }
    }

    /// Interval to sleep after poll number `attempt` (0-based).
    pub fn interval_for(&self, attempt: usize) -> Duration {
        let idx = attempt.min(self.intervals.len() - 1);
        self.intervals[idx]
    }

    /// The steady-state interval.
    pub fn steady(&self) -> Duration {
        *self.intervals.last().expect("schedule is never empty")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule_ramps_up() {
        let schedule = PollSchedule::default();
        assert_eq!(schedule.interval_for(0), Duration::from_secs(6));
        assert_eq!(schedule.interval_for(1), Duration::from_secs(10));
        assert_eq!(schedule.interval_for(2), Duration::from_secs(15));
        // Steady state from here on.
        assert_eq!(schedule.interval_for(3), Duration::from_secs(15));
        assert_eq!(schedule.interval_for(100), Duration::from_secs(15));
    }

    #[test]
    fn test_empty_schedule_gets_fallback() {
        let schedule = PollSchedule::new(Vec::new());
        assert_eq!(schedule.steady(), Duration::from_secs(8));
    }
}
