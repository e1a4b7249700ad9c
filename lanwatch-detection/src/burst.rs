//! ## lanwatch-detection::burst
//! Sliding one-second packet counter.

use std::collections::VecDeque;

use chrono::{DateTime, TimeDelta, Utc};

/// Timestamps of the packets seen in the trailing window.
///
/// Only `threshold + 1` entries are ever retained: that is enough to decide
/// whether the count exceeds the threshold.
#[derive(Debug)]
pub struct BurstWindow {
    timestamps: VecDeque<DateTime<Utc>>,
    window: TimeDelta,
    retain: usize,
}

impl BurstWindow {
    pub fn new(threshold: usize) -> Self {
        Self::with_window(threshold, TimeDelta::seconds(1))
    }

    pub fn with_window(threshold: usize, window: TimeDelta) -> Self {
        let retain = threshold.saturating_add(1);
        Self {
            timestamps: VecDeque::with_capacity(retain.min(4096)),
            window,
            retain,
        }
    }

    /// Records one packet and returns the number of packets in the window,
    /// saturated at `threshold + 1`.
    pub fn record(&mut self, now: DateTime<Utc>) -> usize {
        while let Some(oldest) = self.timestamps.front() {
            if now - *oldest >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
        self.timestamps.push_back(now);
        if self.timestamps.len() > self.retain {
            self.timestamps.pop_front();
        }
        self.timestamps.len()
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_millis(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn counts_within_trailing_second() {
        let mut window = BurstWindow::new(10);
        for i in 0..5 {
            assert_eq!(window.record(at_millis(i * 100)), (i + 1) as usize);
        }
        // 0ms and 100ms fall out of the window ending at 1100ms.
        assert_eq!(window.record(at_millis(1100)), 4);
        assert_eq!(window.record(at_millis(5000)), 1);
    }

    #[test]
    fn retains_at_most_threshold_plus_one() {
        let mut window = BurstWindow::new(3);
        let counts: Vec<usize> = (0..10).map(|i| window.record(at_millis(i))).collect();
        assert_eq!(counts, vec![1, 2, 3, 4, 4, 4, 4, 4, 4, 4]);
        assert_eq!(window.len(), 4);
    }
}
