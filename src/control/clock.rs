use chrono::{DateTime, Duration, Utc};

/// A control clock that ticks a fixed number of cycles a fixed interval apart.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use sewer_mbc::control::clock::Clock;
///
/// let start = Utc.with_ymd_and_hms(2019, 1, 15, 10, 0, 0).unwrap();
/// let mut clock = Clock::new(3, start, 600.0);
/// let mut minutes = Vec::new();
///
/// clock.run(|_, t| minutes.push((t - start).num_minutes()));
/// assert_eq!(minutes, vec![0, 10, 20]);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    /// Next cycle index
    current: usize,
    /// Total cycles to run
    total: usize,
    start: DateTime<Utc>,
    interval: Duration,
}

impl Clock {
    /// Creates a clock of `total` cycles starting at `start`.
    ///
    /// Sub-millisecond parts of `interval_s` are dropped.
    pub fn new(total: usize, start: DateTime<Utc>, interval_s: f64) -> Self {
        Self {
            current: 0,
            total,
            start,
            interval: Duration::milliseconds((interval_s * 1000.0) as i64),
        }
    }

    /// Advances the clock by one cycle.
    ///
    /// # Returns
    ///
    /// * `Some((cycle, time))` - The cycle index and its wall-clock time
    /// * `None` - If the clock has run all its cycles, or the cycle time
    ///   falls outside the representable date range
    pub fn tick(&mut self) -> Option<(usize, DateTime<Utc>)> {
        if self.current >= self.total {
            return None;
        }
        let cycle = self.current;
        let Some(t) = self.time_of(cycle) else {
            self.current = self.total;
            return None;
        };
        self.current += 1;
        Some((cycle, t))
    }

    fn time_of(&self, cycle: usize) -> Option<DateTime<Utc>> {
        let ms = i64::try_from(cycle)
            .ok()
            .and_then(|c| self.interval.num_milliseconds().checked_mul(c))?;
        self.start.checked_add_signed(Duration::try_milliseconds(ms)?)
    }

    /// Runs `f` for each remaining cycle.
    pub fn run(&mut self, mut f: impl FnMut(usize, DateTime<Utc>)) {
        while let Some((cycle, t)) = self.tick() {
            f(cycle, t);
        }
    }

    pub fn remaining(&self) -> usize {
        self.total - self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2019, 1, 15, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_tick() {
        let mut clock = Clock::new(2, start(), 600.0);
        assert_eq!(clock.tick(), Some((0, start())));
        assert_eq!(clock.tick(), Some((1, start() + Duration::minutes(10))));
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.remaining(), 0);
    }

    #[test]
    fn cycle_index_beyond_i32_keeps_its_offset() {
        let clock = Clock::new(usize::MAX, start(), 1.0);
        let t = clock.time_of(3_000_000_000).unwrap();
        assert_eq!((t - start()).num_seconds(), 3_000_000_000);
    }

    #[test]
    fn stops_when_time_leaves_date_range() {
        // ~158k years per cycle; the third cycle is past chrono's range
        let mut clock = Clock::new(3, start(), 5.0e12);
        assert_eq!(clock.tick().map(|(c, _)| c), Some(0));
        assert_eq!(clock.tick().map(|(c, _)| c), Some(1));
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.remaining(), 0);
    }

    #[test]
    fn test_empty_clock() {
        let mut clock = Clock::new(0, start(), 600.0);
        assert_eq!(clock.tick(), None);

        let mut was_called = false;
        clock.run(|_, _| was_called = true);
        assert!(!was_called);
    }
}
