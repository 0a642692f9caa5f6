//! Fixed-interval, fixed-repeat-count trigger (spec §3 `SimpleTrigger`).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for "repeat forever" (mirrors the distilled spec's `-1`).
pub const REPEAT_INDEFINITELY: i32 = -1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleTrigger {
    /// `-1` (`REPEAT_INDEFINITELY`) or a non-negative repeat count.
    pub repeat_count: i32,
    pub repeat_interval_ms: i64,
    times_triggered: u32,
}

impl SimpleTrigger {
    pub fn new(repeat_count: i32, repeat_interval_ms: i64) -> Self {
        Self {
            repeat_count,
            repeat_interval_ms,
            times_triggered: 0,
        }
    }

    pub fn repeat_forever(repeat_interval_ms: i64) -> Self {
        Self::new(REPEAT_INDEFINITELY, repeat_interval_ms)
    }

    pub fn times_triggered(&self) -> u32 {
        self.times_triggered
    }

    pub fn repeat_count_is_infinite(&self) -> bool {
        self.repeat_count == REPEAT_INDEFINITELY
    }

    pub(super) fn record_fire(&mut self) {
        self.times_triggered += 1;
    }

    pub fn compute_first_fire_time(&self, start_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Some(start_time)
    }

    /// `nextFireTime(n) = startTime + n·interval`, expressed incrementally as
    /// `previousFireTime + interval`, clipped by the repeat count.
    pub fn next_fire_time(&self, previous_fire_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if !self.repeat_count_is_infinite() && self.times_triggered > self.repeat_count as u32 {
            return None;
        }
        Some(previous_fire_time + Duration::milliseconds(self.repeat_interval_ms))
    }

    pub fn may_fire_again(&self) -> bool {
        self.repeat_count_is_infinite() || self.times_triggered <= self.repeat_count as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infinite_repeat_advances_by_fixed_interval() {
        let start = Utc::now();
        let mut trigger = SimpleTrigger::repeat_forever(1_000);
        assert_eq!(trigger.compute_first_fire_time(start), Some(start));
        trigger.record_fire();
        let next = trigger.next_fire_time(start).expect("infinite repeat always has a next fire");
        assert_eq!(next, start + Duration::milliseconds(1_000));
        assert!(trigger.may_fire_again());
    }

    #[test]
    fn finite_repeat_stops_after_count_exhausted() {
        let start = Utc::now();
        let mut trigger = SimpleTrigger::new(1, 1_000);
        trigger.record_fire();
        assert!(trigger.next_fire_time(start).is_some());
        trigger.record_fire();
        assert!(trigger.next_fire_time(start).is_none());
        assert!(!trigger.may_fire_again());
    }
}
