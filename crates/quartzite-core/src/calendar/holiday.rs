//! Excludes specific calendar dates (not recurring — contrast with
//! [`super::AnnualCalendar`]).

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};

use super::{start_of_next_day, BaseCalendar, Calendar};

#[derive(Debug, Clone, Default)]
pub struct HolidayCalendar {
    excluded_dates: HashSet<NaiveDate>,
    base: Option<BaseCalendar>,
}

impl HolidayCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_excluded_date(mut self, date: NaiveDate) -> Self {
        self.excluded_dates.insert(date);
        self
    }

    pub fn with_base(mut self, base: BaseCalendar) -> Self {
        self.base = Some(base);
        self
    }

    pub fn excluded_dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.excluded_dates.iter()
    }
}

impl Calendar for HolidayCalendar {
    fn time_included_self(&self, instant: DateTime<Utc>) -> bool {
        !self.excluded_dates.contains(&instant.date_naive())
    }

    fn next_included_self(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let mut candidate = after;
        // No fixed upper bound on how many consecutive dates may be
        // excluded; 10 years of daily holidays would still terminate well
        // under this cap.
        for _ in 0..3_650 {
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
