//! Excludes a fixed set of days-of-month (1-31) in every month.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};

use super::{start_of_next_day, BaseCalendar, Calendar};

#[derive(Debug, Clone, Default)]
pub struct MonthlyCalendar {
    excluded_days: HashSet<u32>,
    base: Option<BaseCalendar>,
}

impl MonthlyCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_day(mut self, day_of_month: u32) -> Self {
        self.excluded_days.insert(day_of_month);
        self
    }

    pub fn with_base(mut self, base: BaseCalendar) -> Self {
        self.base = Some(base);
        self
    }
}

impl Calendar for MonthlyCalendar {
    fn time_included_self(&self, instant: DateTime<Utc>) -> bool {
        !self.excluded_days.contains(&instant.day())
    }

    fn next_included_self(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let mut candidate = after;
        for _ in 0..31 {
            if self.time_included_self(candidate) {
                return candidate;
            }
            candidate = start_of_next_day(candidate);
        }
        candidate
    }

    fn base(&self) -> Option<&dyn Calendar> {
        self.base.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn excludes_day_in_every_month() {
        let cal = MonthlyCalendar::new().exclude_day(1);
        assert!(!cal.is_time_included(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()));
        assert!(!cal.is_time_included(Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap()));
        assert!(cal.is_time_included(Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()));
    }
}
