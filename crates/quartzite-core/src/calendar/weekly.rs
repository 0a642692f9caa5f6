//! Excludes a fixed set of weekdays (e.g. Saturday and Sunday) every week.

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Utc, Weekday};

use super::{start_of_next_day, BaseCalendar, Calendar};

#[derive(Debug, Clone)]
pub struct WeeklyCalendar {
    excluded_days: HashSet<Weekday>,
    base: Option<BaseCalendar>,
}

impl Default for WeeklyCalendar {
    fn default() -> Self {
        Self {
            excluded_days: [Weekday::Sat, Weekday::Sun].into_iter().collect(),
            base: None,
        }
    }
}

impl WeeklyCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_no_excluded_days() -> Self {
        Self {
            excluded_days: HashSet::new(),
            base: None,
        }
    }

    pub fn exclude_day(mut self, day: Weekday) -> Self {
        self.excluded_days.insert(day);
        self
    }

    pub fn with_base(mut self, base: BaseCalendar) -> Self {
        self.base = Some(base);
        self
    }
}

impl Calendar for WeeklyCalendar {
    fn time_included_self(&self, instant: DateTime<Utc>) -> bool {
        !self.excluded_days.contains(&instant.weekday())
    }

    fn next_included_self(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let mut candidate = after;
        for _ in 0..7 {
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
