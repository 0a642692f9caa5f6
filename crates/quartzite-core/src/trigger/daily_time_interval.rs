//! Per-day time-of-day window trigger (spec §3 `DailyTimeIntervalTrigger`).

use std::collections::HashSet;

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use super::calendar_interval::IntervalUnit;

fn all_days() -> HashSet<Weekday> {
    [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ]
    .into_iter()
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyTimeIntervalTrigger {
    pub start_time_of_day: NaiveTime,
    pub end_time_of_day: NaiveTime,
    pub days_of_week: HashSet<Weekday>,
    pub interval: i64,
    pub unit: IntervalUnit,
    pub time_zone: Tz,
}

impl DailyTimeIntervalTrigger {
    pub fn new(start_time_of_day: NaiveTime, end_time_of_day: NaiveTime, interval: i64, unit: IntervalUnit) -> Self {
        Self {
            start_time_of_day,
            end_time_of_day,
            days_of_week: all_days(),
            interval,
            unit,
            time_zone: Tz::UTC,
        }
    }

    pub fn with_time_zone(mut self, time_zone: Tz) -> Self {
        self.time_zone = time_zone;
        self
    }

    pub fn with_days_of_week(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.days_of_week = days.into_iter().collect();
        self
    }

    fn window_start_for(&self, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.start_time_of_day)
    }

    fn next_window_day(&self, from: NaiveDate, inclusive: bool) -> NaiveDate {
        let mut candidate = if inclusive { from } else { from + Duration::days(1) };
        for _ in 0..8 {
            if self.days_of_week.contains(&candidate.weekday()) {
                return candidate;
            }
            candidate += Duration::days(1);
        }
        candidate
    }

    fn step_duration(&self) -> Duration {
        match self.unit {
            IntervalUnit::Second => Duration::seconds(self.interval),
            IntervalUnit::Minute => Duration::minutes(self.interval),
            IntervalUnit::Hour => Duration::hours(self.interval),
            _ => Duration::seconds(self.interval),
        }
    }

    pub fn compute_first_fire_time(&self, start_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local = start_time.with_timezone(&self.time_zone).naive_local();
        let date = local.date();
        let within_today = self.days_of_week.contains(&date.weekday()) && local.time() <= self.end_time_of_day;
        let naive = if within_today {
            if local.time() < self.start_time_of_day {
                self.window_start_for(date)
            } else {
                local
            }
        } else {
            let next_day = self.next_window_day(date, false);
            self.window_start_for(next_day)
        };
        Some(self.localize(naive))
    }

    pub fn next_fire_time(&self, previous_fire_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let local_prev = previous_fire_time.with_timezone(&self.time_zone).naive_local();
        let candidate = local_prev + self.step_duration();
        if candidate.time() <= self.end_time_of_day && self.days_of_week.contains(&candidate.date().weekday()) {
            return Some(self.localize(candidate));
        }
        let next_day = self.next_window_day(candidate.date(), false);
        Some(self.localize(self.window_start_for(next_day)))
    }

    pub fn may_fire_again(&self) -> bool {
        true
    }

    fn localize(&self, naive: NaiveDateTime) -> DateTime<Utc> {
        match self.time_zone.from_local_datetime(&naive) {
            LocalResult::Single(dt) => dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _latest) => earliest.with_timezone(&Utc),
            LocalResult::None => {
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
