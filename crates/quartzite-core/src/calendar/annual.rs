//! Excludes the same (month, day) every year — e.g. recurring public holidays.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc};

use super::{start_of_next_day, BaseCalendar, Calendar};

#[derive(Debug, Clone, Default)]
pub struct AnnualCalendar {
    /// `(month, day)` pairs excluded in every year.
    excluded_days: HashSet<(u32, u32)>,
    base: Option<BaseCalendar>,
}

impl AnnualCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_day(mut self, month: u32, day: u32) -> Self {
        self.excluded_days.insert((month, day));
        self
    }

    pub fn with_base(mut self, base: BaseCalendar) -> Self {
        self.base = Some(base);
        self
    }

    pub fn is_day_excluded(&self, month: u32, day: u32) -> bool {
        self.excluded_days.contains(&(month, day))
    }
}

impl Calendar for AnnualCalendar {
    fn time_included_self(&self, instant: DateTime<Utc>) -> bool {
        !self.excluded_days.contains(&(instant.month(), instant.day()))
    }

    fn next_included_self(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let mut candidate = after;
        for _ in 0..366 {
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
