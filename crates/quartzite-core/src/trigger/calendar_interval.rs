//! Whole-calendar-unit interval trigger (spec §3 `CalendarIntervalTrigger`),
//! DST-aware in the trigger's own time zone.

use chrono::{DateTime, Duration, LocalResult, Months, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntervalUnit {
    Millisecond,
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Year,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarIntervalTrigger {
    pub interval: i64,
    pub unit: IntervalUnit,
    pub time_zone: Tz,
    /// When true, day/week advancement keeps the same local hour-of-day even
    /// if a DST transition makes the elapsed real time more or less than the
    /// nominal duration. Month/Year advancement always does this, since they
    /// have no fixed real-time duration to begin with.
    pub preserve_hour_of_day_across_daylight_savings: bool,
    /// When the advanced local time falls in a DST spring-forward gap: if
    /// true, skip forward a further full day instead of shifting the hour.
    pub skip_day_if_hour_does_not_exist: bool,
}

impl CalendarIntervalTrigger {
    pub fn new(interval: i64, unit: IntervalUnit) -> Self {
        Self {
            interval,
            unit,
            time_zone: Tz::UTC,
            preserve_hour_of_day_across_daylight_savings: false,
            skip_day_if_hour_does_not_exist: false,
        }
    }

    pub fn with_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn preserve_hour_of_day(mut self, preserve: bool) -> Self {
        self.preserve_hour_of_day_across_daylight_savings = preserve;
        self
    }

    pub fn skip_day_if_hour_does_not_exist(mut self, skip: bool) -> Self {
        self.skip_day_if_hour_does_not_exist = skip;
        self
    }

    pub fn compute_first_fire_time(&self, start_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        Some(start_time)
    }

    pub fn next_fire_time(&self, previous_fire_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let wall_clock_arithmetic = matches!(self.unit, IntervalUnit::Month | IntervalUnit::Year)
            || (self.preserve_hour_of_day_across_daylight_savings
                && matches!(self.unit, IntervalUnit::Day | IntervalUnit::Week));

        if wall_clock_arithmetic {
            let local_naive = previous_fire_time.with_timezone(&self.time_zone).naive_local();
            let advanced = self.advance_naive(local_naive);
            Some(self.localize(advanced))
        } else {
            self.fixed_duration().map(|d| previous_fire_time + d)
        }
    }

    pub fn may_fire_again(&self) -> bool {
        true
    }

    fn fixed_duration(&self) -> Option<Duration> {
        match self.unit {
            IntervalUnit::Millisecond => Some(Duration::milliseconds(self.interval)),
            IntervalUnit::Second => Some(Duration::seconds(self.interval)),
            IntervalUnit::Minute => Some(Duration::minutes(self.interval)),
            IntervalUnit::Hour => Some(Duration::hours(self.interval)),
            IntervalUnit::Day => Some(Duration::days(self.interval)),
            IntervalUnit::Week => Some(Duration::weeks(self.interval)),
            IntervalUnit::Month | IntervalUnit::Year => None,
        }
    }

    fn advance_naive(&self, naive: NaiveDateTime) -> NaiveDateTime {
        match self.unit {
            IntervalUnit::Day => naive + Duration::days(self.interval),
            IntervalUnit::Week => naive + Duration::weeks(self.interval),
            IntervalUnit::Month => {
                let months = self.interval.unsigned_abs() as u32;
                if self.interval >= 0 {
                    naive.checked_add_months(Months::new(months)).unwrap_or(naive)
                } else {
                    naive.checked_sub_months(Months::new(months)).unwrap_or(naive)
                }
            }
            IntervalUnit::Year => {
                let months = (self.interval.unsigned_abs() as u32).saturating_mul(12);
                if self.interval >= 0 {
                    naive.checked_add_months(Months::new(months)).unwrap_or(naive)
                } else {
                    naive.checked_sub_months(Months::new(months)).unwrap_or(naive)
                }
            }
            _ => naive,
        }
    }

    /// Resolve a naive local wall-clock time against `self.time_zone`,
    /// handling both DST spring-forward gaps and fall-back ambiguity.
    fn localize(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self.time_zone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            // Fall-back overlap: take the earlier of the two instants.
            LocalResult::Ambiguous(earliest, _latest) => earliest.with_timezone(&Utc),
            LocalResult::None => {
                if self.skip_day_if_hour_does_not_exist {
                    self.localize(naive + Duration::days(1))
                } else {
                    let mut candidate = naive;
                    for _ in 0..24 {
                        candidate += Duration::hours(1);
                        if let LocalResult::Single(dt) = self.time_zone.from_local_datetime(&candidate) {
                            return dt.with_timezone(&Utc);
                        }
                    }
                    self.time_zone.from_utc_datetime(&naive).with_timezone(&Utc)
                }
            }
        }
    }
}
