//! Time-exclusion predicates composable with triggers (spec §3 `Calendar`).

mod annual;
mod cron_calendar;
mod daily;
mod holiday;
mod monthly;
mod weekly;

pub use annual::AnnualCalendar;
pub use cron_calendar::CronCalendar;
pub use daily::DailyCalendar;
pub use holiday::HolidayCalendar;
pub use monthly::MonthlyCalendar;
pub use weekly::WeeklyCalendar;

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

/// Shared, cheaply-cloneable handle to a chained base calendar.
pub type BaseCalendar = Arc<dyn Calendar>;

/// A predicate on instants, optionally chained to a base calendar by
/// intersection (spec §3: "a time is included iff the entire chain accepts
/// it").
///
/// Implementors provide the *local* logic (`time_included_self` /
/// `next_included_self`, both ignoring any base calendar); the trait's
/// default methods do the fixed-point iteration needed to honor a chain.
pub trait Calendar: Send + Sync {
    /// Whether `instant` is included by this calendar's own rule, ignoring
    /// any base calendar.
    fn time_included_self(&self, instant: DateTime<Utc>) -> bool;

    /// The next instant `>= after` that this calendar's own rule includes,
    /// ignoring any base calendar. Implementations may return a time that a
    /// base calendar then rejects; [`Calendar::get_next_included_time`]
    /// re-drives the search in that case.
    fn next_included_self(&self, after: DateTime<Utc>) -> DateTime<Utc>;

    /// The calendar this one is chained to, if any.
    fn base(&self) -> Option<&dyn Calendar>;

    /// Whether `instant` is included by the whole chain.
    fn is_time_included(&self, instant: DateTime<Utc>) -> bool {
        self.time_included_self(instant)
            && self.base().map(|b| b.is_time_included(instant)).unwrap_or(true)
    }

    /// The next instant `>= after` included by the whole chain.
    fn get_next_included_time(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let mut candidate = self.next_included_self(after);
        // Bounded: a well-formed calendar chain converges quickly (each
        // exclusion spans at most a handful of days); this guards against a
        // pathological calendar looping forever.
        for _ in 0..10_000 {
            if self.is_time_included(candidate) {
                return candidate;
            }
            candidate = self.next_included_self(candidate + Duration::milliseconds(1));
            if let Some(base) = self.base() {
                let base_next = base.get_next_included_time(candidate);
                if base_next > candidate {
                    candidate = self.next_included_self(base_next);
                }
            }
        }
        candidate
    }
}

/// Start of the calendar day *after* `instant`'s day, in UTC.
pub(crate) fn start_of_next_day(instant: DateTime<Utc>) -> DateTime<Utc> {
    use chrono::{NaiveTime, TimeZone};
    let next_date = instant.date_naive() + Duration::days(1);
    Utc.from_utc_datetime(&next_date.and_time(NaiveTime::MIN))
}
